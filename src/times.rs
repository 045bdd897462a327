//! Time units used across the pipeline: the millisecond tick grid of
//! the sensors, seconds after unit conversion, and the clock of the
//! function-call tracer. Also parsing of human-readable durations as
//! found in benchmark result documents.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use crate::error::ConfigurationError;

pub const MILLIS_PER_SECOND: f64 = 1000.;

/// Tick (milliseconds) to seconds.
#[inline]
pub fn tick_to_seconds(tick: i64) -> f64 {
    tick as f64 / MILLIS_PER_SECOND
}

/// Seconds back to the tick they were converted from. Rounded, since
/// the conversion via `f64` is not exact for all ticks.
#[inline]
pub fn seconds_to_tick(seconds: f64) -> i64 {
    (seconds * MILLIS_PER_SECOND).round() as i64
}

/// The resolution of the timestamps written by the function-call
/// tracer, which runs on its own clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceClock {
    #[default]
    #[serde(alias = "us")]
    Microseconds,
    #[serde(alias = "ns")]
    Nanoseconds,
}

impl TraceClock {
    /// How many clock increments make up one tick (millisecond).
    pub fn increments_per_tick(self) -> f64 {
        match self {
            TraceClock::Microseconds => 1e3,
            TraceClock::Nanoseconds => 1e6,
        }
    }

    pub fn unit_short(self) -> &'static str {
        match self {
            TraceClock::Microseconds => "us",
            TraceClock::Nanoseconds => "ns",
        }
    }
}

lazy_static! {
    static ref DURATION: Regex = Regex::new(r"^(\d+)([smh])$").expect("valid regex");
}

/// Parse durations like "15s", "2m" or "1h" (the format fio uses for
/// `ramp_time` and `runtime`) into milliseconds.
pub fn parse_duration_ms(s: &str) -> Result<u64, ConfigurationError> {
    let invalid = || ConfigurationError::InvalidRampTime(s.into());
    let caps = DURATION.captures(s.trim()).ok_or_else(invalid)?;
    let value: u64 = caps[1].parse().map_err(|_| invalid())?;
    let factor: u64 = match &caps[2] {
        "s" => 1000,
        "m" => 60 * 1000,
        "h" => 60 * 60 * 1000,
        _ => unreachable!("regex only admits s, m, h"),
    };
    value.checked_mul(factor).ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_parse_duration_ms() {
        assert_eq!(parse_duration_ms("15s"), Ok(15_000));
        assert_eq!(parse_duration_ms("2m"), Ok(120_000));
        assert_eq!(parse_duration_ms("1h"), Ok(3_600_000));
        assert_eq!(parse_duration_ms(" 0s "), Ok(0));
    }

    #[test]
    fn t_parse_duration_ms_invalid() {
        for s in ["", "15", "s", "1.5s", "15ms", "-3s", "3d"] {
            assert_eq!(
                parse_duration_ms(s),
                Err(ConfigurationError::InvalidRampTime(s.into())),
                "{s:?}"
            );
        }
    }

    #[test]
    fn t_ticks_and_seconds() {
        assert_eq!(tick_to_seconds(1500), 1.5);
        for tick in [0, 1, 299, 300, 999, 123_456_789] {
            assert_eq!(seconds_to_tick(tick_to_seconds(tick)), tick);
        }
    }
}
