//! Evaluation of many runs on a fixed-size thread pool. Runs share
//! nothing; a failing or panicking run is recorded and does not
//! affect the others.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use itertools::{Either, Itertools};
use rayon::prelude::*;
use serde::Serialize;

use crate::plot::render::PlotRenderer;
use crate::plot::spec::{Spec, SpecOverrides};
use crate::run::process_run;
use crate::stats::StatsDocument;

#[derive(Debug, Default, Serialize)]
pub struct BatchReport {
    /// Keyed by run name, or by spec path where several specs share
    /// a name.
    pub successes: BTreeMap<String, StatsDocument>,
    /// Keyed like `successes` (by spec path if the spec did not
    /// load), to the error with its causes.
    pub failures: BTreeMap<String, String>,
}

struct Evaluation {
    path: String,
    name: Option<String>,
    outcome: Result<StatsDocument, String>,
}

impl Evaluation {
    fn key(&self, name_counts: &HashMap<String, usize>) -> String {
        match &self.name {
            Some(name) if name_counts.get(name) == Some(&1) => name.clone(),
            _ => self.path.clone(),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic payload"
    }
}

fn evaluate(path: &Path, renderer: &(dyn PlotRenderer + Sync)) -> Evaluation {
    let path_str = path.to_string_lossy().into_owned();
    let spec = match Spec::load(Some(path), SpecOverrides::default())
        .with_context(|| anyhow!("loading spec {path:?}"))
    {
        Ok(spec) => spec,
        Err(e) => {
            log::warn!("{e:#}");
            return Evaluation {
                path: path_str,
                name: None,
                outcome: Err(format!("{e:#}")),
            };
        }
    };
    let outcome = match catch_unwind(AssertUnwindSafe(|| process_run(&spec, renderer))) {
        Ok(Ok(stats)) => Ok(stats),
        Ok(Err(e)) => Err(format!("{e:#}")),
        Err(payload) => Err(format!("panicked: {}", panic_message(&*payload))),
    };
    if let Err(e) = &outcome {
        log::warn!("run {} failed: {e}", spec.name);
    }
    Evaluation {
        path: path_str,
        name: Some(spec.name),
        outcome,
    }
}

/// Evaluate the runs described by the spec files at `paths` on
/// `jobs` threads (0 picks the number of CPUs).
pub fn run_batch(
    paths: &[PathBuf],
    jobs: usize,
    renderer: &(dyn PlotRenderer + Sync),
) -> Result<BatchReport> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .context("creating thread pool")?;
    let evaluations: Vec<Evaluation> = pool.install(|| {
        paths
            .par_iter()
            .map(|path| evaluate(path, renderer))
            .collect()
    });

    let name_counts = evaluations.iter().filter_map(|e| e.name.clone()).counts();
    for (name, count) in &name_counts {
        if *count > 1 {
            log::warn!("{count} specs share the run name {name:?}, reporting them by spec path");
        }
    }

    let (successes, failures) = evaluations.into_iter().partition_map(|e| {
        let key = e.key(&name_counts);
        match e.outcome {
            Ok(stats) => Either::Left((key, stats)),
            Err(error) => Either::Right((key, error)),
        }
    });
    Ok(BatchReport {
        successes,
        failures,
    })
}
