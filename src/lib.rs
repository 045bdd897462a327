pub mod align;
pub mod batch;
pub mod bench_data;
pub mod config_file;
pub mod csv_input;
pub mod dataset;
pub mod error;
pub mod phase;
pub mod plot;
pub mod run;
pub mod run_config;
pub mod sensor;
pub mod series;
pub mod smooth;
pub mod stats;
pub mod times;
pub mod trace;
pub mod utillib;
