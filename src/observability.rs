//! Logging configuration and subscriber setup for the feature binaries.

use std::env;

use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::pipeline::{PipelineConfig, RunOutcome};
use crate::range::FeatureRequest;
use crate::tables::format_timestamp;

pub const LOG_LEVEL_VAR: &str = "KQC_LOG_LEVEL";
pub const LOG_FORMAT_VAR: &str = "KQC_LOG_FORMAT";
pub const LOG_TARGET_VAR: &str = "KQC_LOG_TARGET";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
            include_target: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoggingInitError {
    #[error("logging already initialized: {0}")]
    AlreadyInitialized(#[from] tracing::subscriber::SetGlobalDefaultError),
}

pub fn logging_config_from_env() -> LoggingConfig {
    logging_config_from_lookup(|key| env::var(key).ok())
}

/// Builds a [`LoggingConfig`] from any key lookup; unknown or blank values keep the defaults.
pub fn logging_config_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> LoggingConfig {
    let mut config = LoggingConfig::default();

    if let Some(level) = lookup(LOG_LEVEL_VAR) {
        let trimmed = level.trim();
        if !trimmed.is_empty() {
            config.level = trimmed.to_string();
        }
    }
    if let Some(format) = lookup(LOG_FORMAT_VAR).as_deref().and_then(parse_log_format) {
        config.format = format;
    }
    if let Some(include_target) = lookup(LOG_TARGET_VAR).as_deref().and_then(parse_bool) {
        config.include_target = include_target;
    }

    config
}

/// Installs the global subscriber. Events go to stderr so stdout stays free for callers.
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingInitError> {
    let env_filter =
        EnvFilter::try_new(config.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(config.include_target)
        .with_ansi(!matches!(config.format, LogFormat::Json));

    match config.format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
        LogFormat::Pretty => tracing::subscriber::set_global_default(builder.pretty().finish())?,
        LogFormat::Compact => {
            tracing::subscriber::set_global_default(builder.compact().finish())?
        }
    }

    Ok(())
}

pub fn log_run_start(logging: &LoggingConfig, cfg: &PipelineConfig, req: &FeatureRequest) {
    info!(
        component = "build_features",
        event = "run.start",
        log_level = %logging.level,
        log_format = ?logging.format,
        kitchen_id = %cfg.kitchen_id,
        phase_id = %cfg.phase_id,
        machine_filter = cfg.machine_filter.as_deref().unwrap_or("*"),
        arepa_filter = cfg.arepa_filter.as_deref().unwrap_or("*"),
        source_root = %cfg.source_root.display(),
        output_root = %cfg.output_root.display(),
        join_mode = cfg.join_mode.as_str(),
        start = %format_timestamp(req.start),
        end = %format_timestamp(req.end)
    );
}

pub fn log_run_outcome(outcome: &RunOutcome) {
    match outcome {
        RunOutcome::Empty { report } => info!(
            component = "build_features",
            event = "run.finish.empty",
            input_rows = report.input_rows,
            in_range_rows = report.in_range_rows,
            "No features available for the specified date range"
        ),
        RunOutcome::Written { path, rows, report } => info!(
            component = "build_features",
            event = "run.finish.written",
            path = %path.display(),
            rows = rows.len(),
            input_rows = report.input_rows,
            faulty_groups = report.correlation.faulty_groups
        ),
    }
}

fn parse_log_format(raw: &str) -> Option<LogFormat> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "json" => Some(LogFormat::Json),
        "pretty" => Some(LogFormat::Pretty),
        "compact" => Some(LogFormat::Compact),
        _ => None,
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
