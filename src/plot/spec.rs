//! The run-level description: where the data is, where the artifacts
//! go, which sensors to prepare and which plots to draw.
//!
//! A spec is built from a JSON document (`SpecDoc`), optionally with
//! scalar values given separately (`SpecOverrides`, e.g. from the
//! command line) taking precedence. The lists (`plots`, `sensors`)
//! only ever come from the document. Validation happens when the
//! `Spec` is built, before any data is read.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Deserialize;

use crate::align::{FillPolicy, Window};
use crate::config_file::load_config_file;
use crate::error::ConfigurationError;
use crate::phase::BenchType;
use crate::plot::{Plot, PlotDoc};
use crate::sensor::{SensorDescriptor, SensorKind, DEFAULT_SENSORS};
use crate::times::TraceClock;

pub const DEFAULT_WIDTH: u32 = 12;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpecDoc {
    pub plot_dir: Option<PathBuf>,
    pub results_dir: Option<PathBuf>,
    pub name: Option<String>,
    pub bench_type: Option<String>,
    pub config_yaml: Option<PathBuf>,
    pub info_json: Option<PathBuf>,
    #[serde(default)]
    pub plots: Vec<PlotDoc>,
    pub sensors: Option<Vec<String>>,
    /// Fill policy per sensor identity, replacing the default of the
    /// sensor kind.
    #[serde(default)]
    pub fill: BTreeMap<String, String>,
    pub offset: Option<u64>,
    pub trim_end: Option<u64>,
    pub width: Option<u32>,
    pub trace_clock: Option<TraceClock>,
}

impl SpecDoc {
    pub fn load(path: &Path) -> Result<Self> {
        load_config_file(path)
    }
}

/// Scalar settings that take precedence over the document.
#[derive(Debug, Clone, Default)]
pub struct SpecOverrides {
    pub plot_dir: Option<PathBuf>,
    pub results_dir: Option<PathBuf>,
    pub name: Option<String>,
    pub bench_type: Option<String>,
    pub config_yaml: Option<PathBuf>,
    pub info_json: Option<PathBuf>,
    pub offset: Option<u64>,
    pub trim_end: Option<u64>,
    pub width: Option<u32>,
}

impl SpecDoc {
    pub fn merge(mut self, overrides: SpecOverrides) -> Self {
        let SpecOverrides {
            plot_dir,
            results_dir,
            name,
            bench_type,
            config_yaml,
            info_json,
            offset,
            trim_end,
            width,
        } = overrides;
        fn set<T>(field: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *field = value;
            }
        }
        set(&mut self.plot_dir, plot_dir);
        set(&mut self.results_dir, results_dir);
        set(&mut self.name, name);
        set(&mut self.bench_type, bench_type);
        set(&mut self.config_yaml, config_yaml);
        set(&mut self.info_json, info_json);
        set(&mut self.offset, offset);
        set(&mut self.trim_end, trim_end);
        set(&mut self.width, width);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spec {
    pub plot_dir: PathBuf,
    pub results_dir: PathBuf,
    pub name: String,
    pub bench_type: BenchType,
    pub config_yaml: Option<PathBuf>,
    pub info_json: Option<PathBuf>,
    pub plots: Vec<Plot>,
    pub sensors: Vec<SensorDescriptor>,
    /// First tick of the evaluated window; 0 disables windowing.
    pub offset: u64,
    /// Ticks cut from the end of the run.
    pub trim_end: u64,
    pub width: u32,
    pub trace_clock: TraceClock,
}

impl TryFrom<SpecDoc> for Spec {
    type Error = ConfigurationError;

    fn try_from(doc: SpecDoc) -> Result<Self, Self::Error> {
        let non_empty_path = |p: &Option<PathBuf>| p.as_ref().is_some_and(|p| !p.as_os_str().is_empty());
        let mut missing = Vec::new();
        if !non_empty_path(&doc.plot_dir) {
            missing.push("plot_dir");
        }
        if !non_empty_path(&doc.results_dir) {
            missing.push("results_dir");
        }
        if !doc.name.as_ref().is_some_and(|n| !n.is_empty()) {
            missing.push("name");
        }
        let (Some(plot_dir), Some(results_dir), Some(name)) =
            (doc.plot_dir, doc.results_dir, doc.name)
        else {
            return Err(ConfigurationError::MissingSpecFields(missing));
        };
        if !missing.is_empty() {
            return Err(ConfigurationError::MissingSpecFields(missing));
        }

        let mut fill = BTreeMap::new();
        for (identity, policy) in &doc.fill {
            fill.insert(identity.as_str(), policy.parse::<FillPolicy>()?);
        }
        let sensors = match &doc.sensors {
            Some(sensors) => sensors.iter().map(String::as_str).collect::<Vec<_>>(),
            None => DEFAULT_SENSORS.to_vec(),
        }
        .into_iter()
        .map(|identity| {
            let descriptor = SensorDescriptor::new(identity);
            match fill.get(identity) {
                Some(policy) => descriptor.with_fill(*policy),
                None => descriptor,
            }
        })
        .collect();

        Ok(Spec {
            plot_dir,
            results_dir,
            name,
            bench_type: doc
                .bench_type
                .as_deref()
                .map(BenchType::from_tag)
                .unwrap_or(BenchType::Other(String::new())),
            config_yaml: doc.config_yaml,
            info_json: doc.info_json,
            plots: doc
                .plots
                .into_iter()
                .map(Plot::try_from)
                .collect::<Result<_, _>>()?,
            sensors,
            offset: doc.offset.unwrap_or(0),
            trim_end: doc.trim_end.unwrap_or(0),
            width: doc.width.unwrap_or(DEFAULT_WIDTH),
            trace_clock: doc.trace_clock.unwrap_or_default(),
        })
    }
}

impl Spec {
    /// Load the document at `path` (if any), apply `overrides`,
    /// validate.
    pub fn load(path: Option<&Path>, overrides: SpecOverrides) -> Result<Self> {
        let doc = match path {
            Some(path) => SpecDoc::load(path)?,
            None => SpecDoc::default(),
        };
        Ok(doc.merge(overrides).try_into()?)
    }

    /// The evaluated window, given the number of samples of the
    /// primary power sensor.
    pub fn window(&self, primary_rows: usize) -> Window {
        Window::new(
            self.offset,
            Some((primary_rows as u64).saturating_sub(self.trim_end)),
        )
    }

    pub fn primary_sensor(&self) -> Option<&SensorDescriptor> {
        self.sensors
            .iter()
            .find(|s| s.kind == SensorKind::PrimaryPower)
    }

    pub fn stats_path(&self) -> PathBuf {
        self.plot_dir.join(format!("{}-stats.json", self.name))
    }

    pub fn trace_path(&self) -> PathBuf {
        self.plot_dir.join("plot_data").join(format!("{}.csv", self.name))
    }
}
