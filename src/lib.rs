//! Kitchen QC feature crate.
//!
//! Hourly quality-control features from cooking-machine sensor readings:
//! - date-range filtering of raw readings
//! - batch and fault-interval correlation with faulty-row exclusion
//! - hourly resampling per (machine, arepa type) series
//! - `;`/`,` CSV loading and atomic CSV output

mod aggregate;
mod correlate;
mod loader;
mod observability;
mod output;
mod pipeline;
mod range;
mod tables;

pub use aggregate::{aggregate, SeriesFilter};
pub use correlate::{correlate, CorrelationReport, JoinMode};
pub use loader::{
    load_batches, load_fault_intervals, load_readings, LoadError, BATCH_REGISTRY_FILE,
    COOKING_METRICS_FILE, FAULTY_INTERVALS_FILE,
};
pub use observability::{
    init_logging, log_run_outcome, log_run_start, logging_config_from_env,
    logging_config_from_lookup, LogFormat, LoggingConfig, LoggingInitError, LOG_FORMAT_VAR,
    LOG_LEVEL_VAR, LOG_TARGET_VAR,
};
pub use output::{
    output_dir, output_file_name, render_features_csv, write_features, OutputError,
    OUTPUT_HEADERS,
};
pub use pipeline::{
    build_features, load_source_tables, run_pipeline, FeatureBuildReport, PipelineConfig,
    PipelineError, RunOutcome, SourceTables,
};
pub use range::{filter_readings, FeatureRequest};
pub use tables::{
    floor_to_hour, format_timestamp, parse_cli_timestamp, parse_timestamp, Batch, CleanReading,
    FaultInterval, HourlyFeature, Reading, PATH_TIMESTAMP_FORMAT, TIMESTAMP_FORMAT,
};
