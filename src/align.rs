//! Alignment of sparse, millisecond-keyed sensor samples onto a dense
//! tick grid: drop colliding timestamps, reindex `0..=max`, optionally
//! cut out the run window, convert to seconds, fill the gaps.

use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{ConfigurationError, DataError};
use crate::series::{Column, RawSamples, Series};
use crate::times::tick_to_seconds;

/// Latest accepted timestamp, one day of ticks.
pub const MAX_TICK: i64 = 24 * 60 * 60 * 1000;

/// Grace period of `spread` without an explicit limit.
pub const DEFAULT_DECAY_LIMIT: usize = 1000;

/// How ticks without a sample get their value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillPolicy {
    /// Last seen value; leading gaps stay NaN.
    CarryForward,
    ZeroFill,
    /// Keep emitting the last nonzero value for up to `limit` ticks
    /// after it was last seen, zero afterwards.
    DecayedHold { limit: usize },
}

lazy_static! {
    static ref SPREAD: Regex = Regex::new(r"^spread(\d*)$").expect("valid regex");
    static ref DECAYED_HOLD: Regex = Regex::new(r"^decayed-hold\((\d+)\)$").expect("valid regex");
}

impl FromStr for FillPolicy {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ffill" | "carry-forward" => return Ok(FillPolicy::CarryForward),
            "0s" | "zero-fill" => return Ok(FillPolicy::ZeroFill),
            _ => (),
        }
        let digits = if let Some(caps) = SPREAD.captures(s) {
            caps.get(1).map(|m| m.as_str()).unwrap_or("")
        } else if let Some(caps) = DECAYED_HOLD.captures(s) {
            caps.get(1).map(|m| m.as_str()).unwrap_or("")
        } else {
            return Err(ConfigurationError::UnknownFillPolicy(s.into()));
        };
        let limit = if digits.is_empty() {
            DEFAULT_DECAY_LIMIT
        } else {
            digits
                .parse()
                .map_err(|_| ConfigurationError::InvalidDecayLimit(s.into()))?
        };
        Ok(FillPolicy::DecayedHold { limit })
    }
}

impl Display for FillPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FillPolicy::CarryForward => f.write_str("carry-forward"),
            FillPolicy::ZeroFill => f.write_str("zero-fill"),
            FillPolicy::DecayedHold { limit } => write!(f, "decayed-hold({limit})"),
        }
    }
}

/// The part of a run that is evaluated, in ticks. Only applied when
/// `offset > 0`; `trim` is the exclusive end (absolute tick).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Window {
    pub offset: u64,
    pub trim: Option<u64>,
}

impl Window {
    pub fn new(offset: u64, trim: Option<u64>) -> Self {
        Self { offset, trim }
    }

    pub fn is_active(&self) -> bool {
        self.offset > 0
    }

    /// Whether the absolute tick survives windowing.
    pub fn contains(&self, tick: i64) -> bool {
        if !self.is_active() {
            return true;
        }
        let offset = self.offset as i64;
        tick >= offset && self.trim.map_or(true, |trim| tick < trim as i64)
    }
}

/// Remove all rows whose timestamp occurs more than once. Colliding
/// timestamps are treated as corrupt, none of the copies is kept.
pub fn dedup_timestamps(raw: &RawSamples) -> RawSamples {
    let mut counts: HashMap<i64, usize> = HashMap::new();
    for t in &raw.time {
        *counts.entry(*t).or_default() += 1;
    }
    let keep: Vec<bool> = raw.time.iter().map(|t| counts[t] == 1).collect();
    select_rows(raw, |i| keep[i])
}

/// Dense table over ticks `0..=max(time)`, NaN where no sample
/// exists. Expects unique timestamps; negative ones are dropped.
/// Timestamps beyond `MAX_TICK` are rejected instead of allocating a
/// grid reaching up to them.
pub fn reindex_dense(raw: &RawSamples) -> Result<RawSamples, DataError> {
    let max = match raw.time.iter().copied().max() {
        Some(max) if max >= 0 => max,
        _ => {
            return Ok(RawSamples {
                time: Vec::new(),
                columns: empty_columns(raw),
            })
        }
    };
    let out_of_range = || DataError::TimestampOutOfRange {
        time: max,
        limit: MAX_TICK,
    };
    if max > MAX_TICK {
        return Err(out_of_range());
    }
    let len = usize::try_from(max.checked_add(1).ok_or_else(out_of_range)?)
        .map_err(|_| out_of_range())?;
    let mut columns: Vec<Column> = raw
        .columns
        .iter()
        .map(|c| Column {
            name: c.name.clone(),
            values: vec![f64::NAN; len],
        })
        .collect();
    for (row, t) in raw.time.iter().enumerate() {
        if *t < 0 {
            continue;
        }
        for (dense, sparse) in columns.iter_mut().zip(&raw.columns) {
            dense.values[*t as usize] = sparse.values[row];
        }
    }
    Ok(RawSamples {
        time: (0..=max).collect(),
        columns,
    })
}

/// Restrict a dense table to the window and re-zero it so that the
/// first retained tick is 0. Inactive windows return the input.
pub fn apply_window(dense: RawSamples, window: &Window) -> RawSamples {
    if !window.is_active() {
        return dense;
    }
    let mut windowed = select_rows(&dense, |i| window.contains(dense.time[i]));
    if let Some(first) = windowed.time.first().copied() {
        for t in &mut windowed.time {
            *t -= first;
        }
    }
    windowed
}

/// Fill the NaN cells of `values` in place.
pub fn fill(values: &mut [f64], policy: FillPolicy) {
    match policy {
        FillPolicy::CarryForward => {
            let mut last = f64::NAN;
            for v in values.iter_mut() {
                if v.is_nan() {
                    *v = last;
                } else {
                    last = *v;
                }
            }
        }
        FillPolicy::ZeroFill => {
            for v in values.iter_mut().filter(|v| v.is_nan()) {
                *v = 0.;
            }
        }
        FillPolicy::DecayedHold { limit } => {
            let mut current = None;
            let mut remaining = 0;
            for v in values.iter_mut() {
                if !v.is_nan() && *v != 0. {
                    current = Some(*v);
                    remaining = limit;
                } else if let (Some(held), true) = (current, remaining > 0) {
                    *v = held;
                    remaining -= 1;
                } else {
                    *v = 0.;
                }
            }
        }
    }
}

/// The complete alignment of one signal.
pub fn align(raw: &RawSamples, window: &Window, policy: FillPolicy) -> Result<Series, DataError> {
    let dense = apply_window(reindex_dense(&dedup_timestamps(raw))?, window);
    let time = dense.time.iter().copied().map(tick_to_seconds).collect();
    let mut columns = dense.columns;
    for column in &mut columns {
        fill(&mut column.values, policy);
    }
    Ok(Series::new(time, columns))
}

/// For callers that cannot continue with an empty window.
pub fn require_non_empty<'s>(series: &'s Series, window: &Window) -> Result<&'s Series, DataError> {
    if series.is_empty() {
        Err(DataError::EmptyWindow {
            offset: window.offset,
            trim: window.trim,
        })
    } else {
        Ok(series)
    }
}

fn empty_columns(raw: &RawSamples) -> Vec<Column> {
    raw.columns
        .iter()
        .map(|c| Column {
            name: c.name.clone(),
            values: Vec::new(),
        })
        .collect()
}

fn select_rows(raw: &RawSamples, keep: impl Fn(usize) -> bool) -> RawSamples {
    let rows: Vec<usize> = (0..raw.time.len()).filter(|i| keep(*i)).collect();
    RawSamples {
        time: rows.iter().map(|i| raw.time[*i]).collect(),
        columns: raw
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                values: rows.iter().map(|i| c.values[*i]).collect(),
            })
            .collect(),
    }
}
