//! The sensors of a run, identified by their file name, and the
//! derived columns computed for each of them after alignment.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use strum_macros::EnumString;

use crate::align::{align, FillPolicy, Window};
use crate::csv_input::read_sensor_csv;
use crate::run_config::RunConfig;
use crate::series::Series;
use crate::smooth::smooth;

pub const BYTES_PER_MIB: f64 = 1024. * 1024.;

/// Column holding the power reading of both power sensors.
pub const POWER_COLUMN: &str = "Total";
pub const POWER_SMOOTHED_COLUMN: &str = "total_smoothed";

pub const DEFAULT_SENSORS: &[&str] = &["powersensor3.csv", "rapl.csv", "sysinfo.csv", "diskstat.csv"];

#[derive(Debug, Clone, PartialEq, Eq, EnumString)]
pub enum SensorKind {
    /// Per-core frequency and load.
    #[strum(serialize = "sysinfo.csv")]
    CpuTopology,
    /// SSD power, the reference for the run length.
    #[strum(serialize = "powersensor3.csv")]
    PrimaryPower,
    /// CPU and DRAM power (RAPL), occasionally glitching.
    #[strum(serialize = "rapl.csv")]
    SecondaryPower,
    /// Bytes read and written per sampling interval.
    #[strum(serialize = "diskstat.csv")]
    DiskStat,
    #[strum(serialize = "netio-http.csv")]
    NetIo,
    #[strum(default)]
    Unrecognized(String),
}

impl SensorKind {
    /// Parsing never fails, unknown names become `Unrecognized`.
    pub fn from_identity(identity: &str) -> Self {
        identity
            .parse()
            .unwrap_or_else(|_| SensorKind::Unrecognized(identity.into()))
    }

    pub fn identity(&self) -> &str {
        match self {
            SensorKind::CpuTopology => "sysinfo.csv",
            SensorKind::PrimaryPower => "powersensor3.csv",
            SensorKind::SecondaryPower => "rapl.csv",
            SensorKind::DiskStat => "diskstat.csv",
            SensorKind::NetIo => "netio-http.csv",
            SensorKind::Unrecognized(identity) => identity,
        }
    }

    pub fn default_fill(&self) -> FillPolicy {
        match self {
            SensorKind::DiskStat => FillPolicy::DecayedHold { limit: 10 },
            SensorKind::NetIo => FillPolicy::DecayedHold { limit: 500 },
            SensorKind::CpuTopology
            | SensorKind::PrimaryPower
            | SensorKind::SecondaryPower
            | SensorKind::Unrecognized(_) => FillPolicy::CarryForward,
        }
    }
}

/// How one sensor's file is turned into a prepared series.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorDescriptor {
    pub kind: SensorKind,
    pub fill: FillPolicy,
}

impl SensorDescriptor {
    pub fn new(identity: &str) -> Self {
        let kind = SensorKind::from_identity(identity);
        let fill = kind.default_fill();
        Self { kind, fill }
    }

    pub fn with_fill(mut self, fill: FillPolicy) -> Self {
        self.fill = fill;
        self
    }

    pub fn identity(&self) -> &str {
        self.kind.identity()
    }

    /// Read the sensor file from `results_dir`, align and prepare it.
    pub fn load(&self, results_dir: &Path, window: &Window, config: &RunConfig) -> Result<Series> {
        let raw = read_sensor_csv(&results_dir.join(self.identity()))?;
        log::debug!(
            "sensor {}: {} samples, fill {}",
            self.identity(),
            raw.len(),
            self.fill
        );
        let aligned = align(&raw, window, self.fill)
            .with_context(|| anyhow!("aligning sensor {}", self.identity()))?;
        Ok(self.prepare(aligned, config))
    }

    /// Add the derived columns of this kind of sensor.
    pub fn prepare(&self, mut series: Series, config: &RunConfig) -> Series {
        match &self.kind {
            SensorKind::CpuTopology => add_domain_columns(&mut series, config),
            SensorKind::PrimaryPower => add_smoothed(&mut series, POWER_COLUMN, POWER_SMOOTHED_COLUMN),
            SensorKind::SecondaryPower => {
                let max = config.cpu_max_power_watts;
                if let Some(power) = series.column(POWER_COLUMN) {
                    let valid: Vec<bool> = power.iter().map(|p| *p >= 0. && *p < max).collect();
                    series.retain_rows(|i| valid[i]);
                }
                add_smoothed(&mut series, POWER_COLUMN, POWER_SMOOTHED_COLUMN)
            }
            SensorKind::DiskStat => {
                for name in ["read", "write"] {
                    if let Some(values) = series.column_mut(name) {
                        for v in values.iter_mut() {
                            *v /= BYTES_PER_MIB;
                        }
                    }
                }
                let total: Option<Vec<f64>> = match (series.column("read"), series.column("write")) {
                    (Some(read), Some(write)) => Some(read.iter().zip(write).map(|(r, w)| r + w).collect()),
                    _ => None,
                };
                if let Some(total) = total {
                    series.set_column("total", total);
                }
                add_smoothed(&mut series, "read", "read_smoothed");
                add_smoothed(&mut series, "write", "write_smoothed");
                add_smoothed(&mut series, "total", "total_smoothed");
            }
            SensorKind::NetIo | SensorKind::Unrecognized(_) => (),
        }
        series
    }
}

fn add_smoothed(series: &mut Series, from: &str, to: &str) {
    if let Some(values) = series.column(from) {
        let smoothed = smooth(values);
        series.set_column(to, smoothed);
    } else {
        log::warn!("no column {from:?} to smooth");
    }
}

pub fn domain_freq_column(domain: u32) -> String {
    format!("average_freq_node{domain}")
}

pub fn domain_load_column(domain: u32) -> String {
    format!("average_load_node{domain}")
}

/// Per domain: the highest core frequency and the mean core load of
/// every tick. NaN cells are skipped, a tick without any value gives
/// NaN.
fn add_domain_columns(series: &mut Series, config: &RunConfig) {
    for (domain, cores) in config.cpu_topology.domains() {
        let columns_of = |suffix: &str| -> Vec<Vec<f64>> {
            cores
                .clone()
                .filter_map(|core| series.column(&format!("cpu-{core}-{suffix}")))
                .map(<[f64]>::to_vec)
                .collect()
        };
        let freq = columns_of("freq");
        let load = columns_of("load");
        let len = series.len();
        let freq = (0..len)
            .map(|i| {
                freq.iter()
                    .map(|c| c[i])
                    .filter(|v| !v.is_nan())
                    .fold(f64::NAN, f64::max)
            })
            .collect();
        let load = (0..len)
            .map(|i| {
                let (sum, n) = load
                    .iter()
                    .map(|c| c[i])
                    .filter(|v| !v.is_nan())
                    .fold((0., 0), |(sum, n), v| (sum + v, n + 1));
                if n == 0 {
                    f64::NAN
                } else {
                    sum / n as f64
                }
            })
            .collect();
        series.set_column(&domain_freq_column(domain), freq);
        series.set_column(&domain_load_column(domain), load);
    }
}
