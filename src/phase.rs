//! Lifecycle markers of a benchmark run and the phases they delimit.
//! Which phases a run has depends on the benchmark type only; the
//! markers just provide the boundaries.

use std::ops::Range;

use itertools::Itertools;
use strum_macros::EnumString;

use crate::error::DataError;
use crate::series::Series;
use crate::times::MILLIS_PER_SECOND;

/// The phase spanning the whole series, always reported.
pub const TOTAL: &str = "total";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub name: String,
    /// Milliseconds since the start of the recording.
    pub time: i64,
}

impl Marker {
    pub fn new(name: String, time: i64) -> Self {
        Self { name, time }
    }

    /// Position in an aligned series (seconds) whose window started
    /// at tick `offset`.
    pub fn series_time(&self, offset: u64) -> f64 {
        (self.time - offset as i64) as f64 / MILLIS_PER_SECOND
    }
}

/// Markers must be ordered by time, ties allowed.
pub fn check_marker_order(markers: &[Marker]) -> Result<(), DataError> {
    for (previous, next) in markers.iter().tuple_windows() {
        if next.time < previous.time {
            return Err(DataError::UnorderedMarkers {
                previous: previous.name.clone(),
                previous_time: previous.time,
                name: next.name.clone(),
                time: next.time,
            });
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, EnumString)]
pub enum BenchType {
    #[strum(serialize = "filebench")]
    Filebench,
    #[strum(serialize = "ycsb")]
    Ycsb,
    #[strum(serialize = "fio")]
    Fio,
    #[strum(serialize = "mlperf")]
    Mlperf,
    #[strum(serialize = "tpcc", serialize = "tpcc-postgres")]
    Tpcc,
    #[strum(serialize = "h5bench")]
    H5bench,
    #[strum(serialize = "cmd")]
    Cmd,
    #[strum(default)]
    Other(String),
}

impl BenchType {
    pub fn from_tag(tag: &str) -> Self {
        tag.parse()
            .unwrap_or_else(|_| BenchType::Other(tag.into()))
    }

    /// Names of the phases between consecutive boundaries, the first
    /// starting with the series and the last ending with it. Empty
    /// for types that are only evaluated as a whole.
    pub fn phase_names(&self) -> &'static [&'static str] {
        match self {
            BenchType::Filebench => &["fileset", "benchmark", "post_benchmark"],
            BenchType::Ycsb => &["benchmark", "unmount"],
            BenchType::Fio
            | BenchType::Mlperf
            | BenchType::Tpcc
            | BenchType::H5bench
            | BenchType::Cmd
            | BenchType::Other(_) => &[],
        }
    }

    pub fn markers_required(&self) -> usize {
        self.phase_names().len().saturating_sub(1)
    }
}

/// A half-open interval `[start, end)` of series time in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct Phase {
    pub name: &'static str,
    pub start: f64,
    pub end: f64,
}

impl Phase {
    pub fn total() -> Self {
        Phase {
            name: TOTAL,
            start: f64::NEG_INFINITY,
            end: f64::INFINITY,
        }
    }

    pub fn rows(&self, series: &Series) -> Range<usize> {
        series.time_range(self.start, self.end)
    }

    /// Length in seconds, with the open ends bounded by the run,
    /// which spans `[0, run_end)`.
    pub fn duration(&self, run_end: f64) -> f64 {
        let start = self.start.max(0.);
        let end = self.end.min(run_end);
        (end - start).max(0.)
    }
}

/// The phases of a run: those of the benchmark type followed by
/// `total`, or `total` alone if the type has no phases or fewer
/// markers were recorded than it needs. Surplus markers are ignored.
pub fn segment(
    bench_type: &BenchType,
    markers: Option<&[Marker]>,
    offset: u64,
) -> Result<Vec<Phase>, DataError> {
    let markers = markers.unwrap_or(&[]);
    check_marker_order(markers)?;
    let names = bench_type.phase_names();
    let required = bench_type.markers_required();
    if names.is_empty() || markers.len() < required {
        if !names.is_empty() {
            log::info!(
                "{} markers present but {bench_type:?} needs {required}, evaluating as a whole",
                markers.len()
            );
        }
        return Ok(vec![Phase::total()]);
    }
    let boundaries: Vec<f64> = std::iter::once(f64::NEG_INFINITY)
        .chain(markers[..required].iter().map(|m| m.series_time(offset)))
        .chain(std::iter::once(f64::INFINITY))
        .collect();
    let mut phases: Vec<Phase> = names
        .iter()
        .copied()
        .zip(boundaries.windows(2))
        .map(|(name, bounds)| Phase {
            name,
            start: bounds[0],
            end: bounds[1],
        })
        .collect();
    phases.push(Phase::total());
    Ok(phases)
}
