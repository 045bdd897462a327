//! Function-call traces: records from the tracer, rebasing of its
//! clock onto the sensor tick grid, and the per-category event-count
//! series derived from them.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use strum::IntoEnumIterator;
use strum_macros::{EnumIter, IntoStaticStr};

use crate::align::{align, FillPolicy, Window};
use crate::error::DataError;
use crate::series::{Column, RawSamples, Series};
use crate::times::TraceClock;

/// Name of the sidecar file holding the clock correction in ticks.
pub const TRACE_OFFSET_FILE: &str = "trace_offset";

/// How long a traced call stays visible, in ticks.
pub const TRACE_FILL: FillPolicy = FillPolicy::DecayedHold { limit: 1000 };

pub const READ_FUNCTION: &str = "read+76";
pub const WRITE_FUNCTION: &str = "__write+79";

/// One row of a trace file. Missing flag columns read as false.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TraceRecord {
    #[serde(default)]
    pub function: String,
    /// In the tracer's clock, see `TraceClock`.
    pub time: i64,
    pub count: f64,
    #[serde(default)]
    pub is_nvme_call: bool,
    #[serde(default)]
    pub has_fs_pagewrite: bool,
    #[serde(default)]
    pub requeued_io: bool,
    #[serde(default)]
    pub vfs_read: bool,
    #[serde(default)]
    pub vfs_write: bool,
    #[serde(default)]
    pub vfs_fsync: bool,
}

/// The clock correction between tracer and sensors for a run; 0 if
/// the sidecar file does not exist.
pub fn read_trace_offset(results_dir: &Path) -> Result<i64> {
    let path = results_dir.join(TRACE_OFFSET_FILE);
    if !path.exists() {
        return Ok(0);
    }
    (|| -> Result<i64> {
        let s = std::fs::read_to_string(&path)?;
        let first_line = s.lines().next().unwrap_or("").trim();
        Ok(first_line.parse()?)
    })()
    .with_context(|| anyhow!("reading trace offset file {path:?}"))
}

/// Maps tracer timestamps onto sensor ticks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceOffsetCorrector {
    pub clock: TraceClock,
    /// Added after rebasing, in ticks.
    pub correction: i64,
}

impl TraceOffsetCorrector {
    pub fn new(clock: TraceClock, correction: i64) -> Self {
        Self { clock, correction }
    }

    /// Like `new`, with the correction read from the run's sidecar.
    pub fn for_run(clock: TraceClock, results_dir: &Path) -> Result<Self> {
        Ok(Self::new(clock, read_trace_offset(results_dir)?))
    }

    /// Tick of `time` when the trace starts at `origin`. Halfway
    /// values round to even. Saturates at the bounds of `i64`.
    pub fn tick(&self, time: i64, origin: i64) -> i64 {
        let elapsed = time.saturating_sub(origin) as f64 / self.clock.increments_per_tick();
        (elapsed.round_ties_even() as i64).saturating_add(self.correction)
    }

    /// Ticks of all `times` for a trace starting at `origin`.
    pub fn rebase(&self, times: impl IntoIterator<Item = i64>, origin: i64) -> Vec<i64> {
        times.into_iter().map(|t| self.tick(t, origin)).collect()
    }
}

/// Sum `count` over records sharing a timestamp, keep the other
/// fields of the first record. Ordered by time.
pub fn group_by_time<'r>(records: impl IntoIterator<Item = &'r TraceRecord>) -> Vec<TraceRecord> {
    let mut groups: BTreeMap<i64, TraceRecord> = BTreeMap::new();
    for record in records {
        groups
            .entry(record.time)
            .and_modify(|group| group.count += record.count)
            .or_insert_with(|| record.clone());
    }
    groups.into_values().collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, IntoStaticStr)]
pub enum TraceCategory {
    #[strum(serialize = "trace-read")]
    Read,
    #[strum(serialize = "trace-write")]
    Write,
    #[strum(serialize = "trace-writepage")]
    WritePage,
    #[strum(serialize = "trace-requeue")]
    Requeue,
    #[strum(serialize = "trace-fsync")]
    Fsync,
}

impl TraceCategory {
    /// The name of the benchmark-data dataset.
    pub fn dataset_name(self) -> &'static str {
        self.into()
    }

    /// Grouped records of this category. Reads and writes are
    /// identified by their syscall wrapper when the trace has one,
    /// by the VFS flag otherwise.
    pub fn select(self, records: &[TraceRecord]) -> Vec<TraceRecord> {
        let by_function = |function: &str| -> Option<Vec<TraceRecord>> {
            if records.iter().any(|r| r.function == function) {
                let mut grouped = group_by_time(records);
                grouped.retain(|r| r.function == function);
                Some(grouped)
            } else {
                None
            }
        };
        let by_flag = |flag: fn(&TraceRecord) -> bool, nvme_only: bool| {
            let mut grouped = group_by_time(records.iter().filter(|r| flag(r)));
            if nvme_only {
                grouped.retain(|r| r.is_nvme_call);
            }
            grouped
        };
        match self {
            TraceCategory::Read => {
                by_function(READ_FUNCTION).unwrap_or_else(|| by_flag(|r| r.vfs_read, true))
            }
            TraceCategory::Write => {
                by_function(WRITE_FUNCTION).unwrap_or_else(|| by_flag(|r| r.vfs_write, true))
            }
            TraceCategory::WritePage => by_flag(|r| r.has_fs_pagewrite, false),
            TraceCategory::Requeue => by_flag(|r| r.requeued_io, true),
            TraceCategory::Fsync => by_flag(|r| r.vfs_fsync, true),
        }
    }
}

/// Aligned `time`/`count` series for every category that has events
/// in the window. All categories share the trace's overall start as
/// origin.
pub fn trace_datasets(
    records: &[TraceRecord],
    corrector: &TraceOffsetCorrector,
    window: &Window,
) -> Result<Vec<(TraceCategory, Series)>, DataError> {
    let Some(origin) = records.iter().map(|r| r.time).min() else {
        return Ok(Vec::new());
    };
    let mut datasets = Vec::new();
    for category in TraceCategory::iter() {
        let selected = category.select(records);
        if selected.is_empty() {
            continue;
        }
        let raw = RawSamples {
            time: corrector.rebase(selected.iter().map(|r| r.time), origin),
            columns: vec![Column::new(
                "count",
                selected.iter().map(|r| r.count).collect(),
            )],
        };
        let series = align(&raw, window, TRACE_FILL)?;
        if series.is_empty() {
            log::debug!("trace category {} is empty after windowing", category.dataset_name());
            continue;
        }
        datasets.push((category, series));
    }
    Ok(datasets)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(function: &str, time: i64, count: f64) -> TraceRecord {
        TraceRecord {
            function: function.into(),
            time,
            count,
            is_nvme_call: true,
            has_fs_pagewrite: false,
            requeued_io: false,
            vfs_read: false,
            vfs_write: false,
            vfs_fsync: false,
        }
    }

    #[test]
    fn t_read_trace_offset() -> Result<()> {
        let dir = tempfile::tempdir()?;
        assert_eq!(read_trace_offset(dir.path())?, 0);
        std::fs::write(dir.path().join(TRACE_OFFSET_FILE), "50\n")?;
        assert_eq!(read_trace_offset(dir.path())?, 50);
        std::fs::write(dir.path().join(TRACE_OFFSET_FILE), "fifty\n")?;
        assert!(read_trace_offset(dir.path()).is_err());
        Ok(())
    }

    #[test]
    fn t_rebase() {
        let corrector = TraceOffsetCorrector::new(TraceClock::Microseconds, 50);
        assert_eq!(
            corrector.rebase([2_000_000, 2_001_000, 2_002_500, 2_003_500], 2_000_000),
            [50, 51, 52, 54]
        );
        let corrector = TraceOffsetCorrector::new(TraceClock::Nanoseconds, 0);
        assert_eq!(corrector.rebase([7_000_000, 9_000_000], 5_000_000), [2, 4]);
        assert!(corrector.rebase([], 0).is_empty());
        assert_eq!(corrector.tick(i64::MAX, i64::MIN), i64::MAX / 1_000_000 + 1);
    }

    #[test]
    fn t_group_by_time() {
        let records = [record("a", 5, 1.), record("b", 3, 2.), record("c", 5, 4.)];
        let grouped = group_by_time(&records);
        assert_eq!(grouped.len(), 2);
        assert_eq!((grouped[0].time, grouped[0].count), (3, 2.));
        assert_eq!((grouped[1].time, grouped[1].count, grouped[1].function.as_str()), (5, 5., "a"));
    }

    #[test]
    fn t_select_by_function_or_flag() {
        let mut vfs = record("vfs", 10, 1.);
        vfs.vfs_read = true;
        let mut foreign = vfs.clone();
        foreign.time = 11;
        foreign.is_nvme_call = false;

        let records = vec![vfs.clone(), foreign.clone()];
        let read = TraceCategory::Read.select(&records);
        assert_eq!(read, [vfs.clone()]);

        let records = vec![vfs, foreign, record(READ_FUNCTION, 20, 3.)];
        let read = TraceCategory::Read.select(&records);
        assert_eq!(read.len(), 1);
        assert_eq!(read[0].time, 20);
        assert!(TraceCategory::Write.select(&records).is_empty());
    }

    #[test]
    fn t_trace_datasets() -> Result<()> {
        let corrector = TraceOffsetCorrector::new(TraceClock::Microseconds, 50);
        let records = [
            record(READ_FUNCTION, 2_000_000, 1.),
            record(READ_FUNCTION, 2_000_000, 2.),
            record(WRITE_FUNCTION, 2_010_000, 4.),
        ];
        let datasets = trace_datasets(&records, &corrector, &Window::default())?;
        let names: Vec<_> = datasets.iter().map(|(c, _)| c.dataset_name()).collect();
        assert_eq!(names, ["trace-read", "trace-write"]);
        let read = &datasets[0].1;
        assert_eq!(read.len(), 51);
        assert_eq!(read.column("count").expect("count")[50], 3.);
        assert_eq!(read.column("count").expect("count")[49], 0.);
        let write = &datasets[1].1;
        assert_eq!(write.len(), 61);
        assert_eq!(write.column("count").expect("count")[60], 4.);
        Ok(())
    }

    #[test]
    fn t_trace_beyond_run_length_is_an_error() {
        let corrector = TraceOffsetCorrector::new(TraceClock::Microseconds, 0);
        let records = [record(READ_FUNCTION, 0, 1.), record(READ_FUNCTION, i64::MAX, 1.)];
        assert!(matches!(
            trace_datasets(&records, &corrector, &Window::default()),
            Err(DataError::TimestampOutOfRange { .. })
        ));
    }
}
