//! Data written by the benchmarks themselves: fio's result document
//! and bandwidth logs.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde_json::Value;

use crate::align::{align, FillPolicy, Window};
use crate::config_file::try_load_config_file;
use crate::csv_input::read_fio_bw_log;
use crate::error::ConfigurationError;
use crate::series::{Column, RawSamples, Series};
use crate::smooth::smooth;
use crate::times::{parse_duration_ms, MILLIS_PER_SECOND};

pub const MARKERS_FILE: &str = "markers.csv";
pub const FIO_RESULTS_FILE: &str = "results.json";
pub const BW_DATASET: &str = "bw";

const KIB_PER_MIB: f64 = 1024.;

/// The ramp time of the first job, or of the global options, in ms;
/// 0 if neither is given.
pub fn fio_ramp_time_ms(results: &Value) -> Result<u64, ConfigurationError> {
    let job = results["jobs"][0]["job options"]["ramp_time"].as_str();
    let global = results["global options"]["ramp_time"].as_str();
    match job.or(global) {
        Some(s) => parse_duration_ms(s),
        None => Ok(0),
    }
}

/// How far the benchmark's own time lags behind the window start,
/// in seconds: the ramp time not already cut off by the window.
pub fn fio_time_offset(ramp_time_ms: u64, window_offset: u64) -> f64 {
    ramp_time_ms.saturating_sub(window_offset) as f64 / MILLIS_PER_SECOND
}

/// The time offset of a fio run, from its result document if present.
pub fn read_fio_time_offset(results_dir: &Path, window_offset: u64) -> Result<f64> {
    let path = results_dir.join(FIO_RESULTS_FILE);
    let Some(results) = try_load_config_file::<Value>(&path)? else {
        log::warn!("no {FIO_RESULTS_FILE} in {results_dir:?}, assuming no ramp time");
        return Ok(0.);
    };
    let ramp = fio_ramp_time_ms(&results).with_context(|| anyhow!("in {path:?}"))?;
    Ok(fio_time_offset(ramp, window_offset))
}

/// `log_bw.*.log` files of the run, sorted by name.
pub fn fio_bw_logs(results_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(results_dir)
        .with_context(|| anyhow!("listing directory {results_dir:?}"))?
    {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with("log_bw.") && name.ends_with(".log") {
            paths.push(entry.path());
        }
    }
    paths.sort();
    Ok(paths)
}

/// Total bandwidth of all jobs in MiB/s. The logs are combined row by
/// row, the timestamps of the first log are used.
pub fn combine_bw_logs(logs: &[Vec<(i64, f64)>]) -> RawSamples {
    let Some(first) = logs.first() else {
        return RawSamples::default();
    };
    let bw: Vec<f64> = (0..first.len())
        .map(|i| {
            logs.iter()
                .filter_map(|log| log.get(i))
                .map(|(_, bw)| bw / KIB_PER_MIB)
                .sum::<f64>()
        })
        .collect();
    RawSamples {
        time: first.iter().map(|(t, _)| *t).collect(),
        columns: vec![Column::new("bw", bw)],
    }
}

/// The `bw` dataset with fields `time`, `bw` and `smoothed`; `None`
/// if the run has no bandwidth logs.
pub fn fio_bandwidth(results_dir: &Path, window: &Window) -> Result<Option<Series>> {
    let paths = fio_bw_logs(results_dir)?;
    if paths.is_empty() {
        return Ok(None);
    }
    let logs = paths
        .iter()
        .map(|path| read_fio_bw_log(path))
        .collect::<Result<Vec<_>>>()?;
    let mut series = align(&combine_bw_logs(&logs), window, FillPolicy::CarryForward)
        .with_context(|| anyhow!("aligning fio bandwidth logs in {results_dir:?}"))?;
    if let Some(bw) = series.column("bw") {
        let smoothed = smooth(bw);
        series.set_column("smoothed", smoothed);
    }
    Ok(Some(series))
}
