//! Error taxonomy of the evaluation pipeline. Configuration problems
//! are detected when specs and descriptors are constructed, data
//! problems while resolving or slicing prepared series. File IO and
//! decoding errors are not represented here, they travel as
//! `anyhow::Error` with the path attached.

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("unknown fill policy {0:?}, expecting one of ffill|carry-forward|0s|zero-fill|spread|spread<N>|decayed-hold(<N>)")]
    UnknownFillPolicy(String),
    #[error("invalid decay limit in fill policy {0:?}")]
    InvalidDecayLimit(String),
    #[error("must specify either a spec document or all of {}", .0.join(", "))]
    MissingSpecFields(Vec<&'static str>),
    #[error("unknown axis kind {0:?}, expecting \"sensor\" or \"benchmark-data\"")]
    UnknownAxisKind(String),
    #[error("invalid ramp time {0:?}, expecting <integer><s|m|h>")]
    InvalidRampTime(String),
    #[error("plot {plot:?} has no y axis")]
    EmptyYAxis { plot: String },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DataError {
    #[error("window [{offset}, {trim:?}) left no samples")]
    EmptyWindow { offset: u64, trim: Option<u64> },
    #[error("no {kind} dataset named {name:?}")]
    MissingDataset { kind: &'static str, name: String },
    #[error("dataset {dataset:?} has no field {field:?}")]
    MissingField { dataset: String, field: String },
    #[error("cannot pair {x_len} x values with {y_len} y values for {label:?}")]
    LengthMismatch {
        label: String,
        x_len: usize,
        y_len: usize,
    },
    #[error("markers are not ordered by time: {previous:?} at {previous_time} before {name:?} at {time}")]
    UnorderedMarkers {
        previous: String,
        previous_time: i64,
        name: String,
        time: i64,
    },
    #[error("missing the 'time' column")]
    MissingTimeColumn,
    #[error("timestamp {time} ms is beyond the supported run length of {limit} ms")]
    TimestampOutOfRange { time: i64, limit: i64 },
}
