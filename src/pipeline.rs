//! Feature pipeline entry points: range filter, fault correlation, hourly aggregation.

use std::path::PathBuf;

use thiserror::Error;
use tracing::info;

use crate::aggregate::{aggregate, SeriesFilter};
use crate::correlate::{correlate, CorrelationReport, JoinMode};
use crate::loader::{
    load_batches, load_fault_intervals, load_readings, LoadError, BATCH_REGISTRY_FILE,
    COOKING_METRICS_FILE, FAULTY_INTERVALS_FILE,
};
use crate::output::{output_dir, output_file_name, write_features, OutputError};
use crate::range::{filter_readings, FeatureRequest};
use crate::tables::{format_timestamp, Batch, FaultInterval, HourlyFeature, Reading};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub kitchen_id: String,
    pub phase_id: String,
    pub machine_filter: Option<String>,
    pub arepa_filter: Option<String>,
    pub source_root: PathBuf,
    pub output_root: PathBuf,
    pub join_mode: JoinMode,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            kitchen_id: "k1".to_string(),
            phase_id: "phase1".to_string(),
            machine_filter: Some("m1".to_string()),
            arepa_filter: Some("a1".to_string()),
            source_root: PathBuf::from("source"),
            output_root: PathBuf::from("outputs"),
            join_mode: JoinMode::Inner,
        }
    }
}

impl PipelineConfig {
    pub fn series_filter(&self) -> SeriesFilter {
        SeriesFilter {
            machine_id: self.machine_filter.clone(),
            arepa_type: self.arepa_filter.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureBuildReport {
    pub input_rows: u64,
    pub in_range_rows: u64,
    pub correlation: CorrelationReport,
    pub output_rows: u64,
}

/// The three source tables of one invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceTables {
    pub readings: Vec<Reading>,
    pub batches: Vec<Batch>,
    pub intervals: Vec<FaultInterval>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Empty {
        report: FeatureBuildReport,
    },
    Written {
        path: PathBuf,
        rows: Vec<HourlyFeature>,
        report: FeatureBuildReport,
    },
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("input unavailable: {table} dataset not found at {}", path.display())]
    InputUnavailable { table: &'static str, path: PathBuf },
    #[error("failed to load {table}: {source}")]
    Load {
        table: &'static str,
        #[source]
        source: LoadError,
    },
    #[error("failed to write features: {0}")]
    Output(#[from] OutputError),
}

pub fn build_features(
    tables: &SourceTables,
    req: &FeatureRequest,
    cfg: &PipelineConfig,
) -> (Vec<HourlyFeature>, FeatureBuildReport) {
    let mut report = FeatureBuildReport {
        input_rows: tables.readings.len() as u64,
        ..FeatureBuildReport::default()
    };

    info!(
        component = "features",
        event = "features.build.start",
        start = %format_timestamp(req.start),
        end = %format_timestamp(req.end),
        input_rows = report.input_rows,
        join_mode = cfg.join_mode.as_str()
    );

    let in_range = filter_readings(&tables.readings, req);
    report.in_range_rows = in_range.len() as u64;
    if in_range.is_empty() {
        return (Vec::new(), report);
    }

    let (clean, correlation) = correlate(
        &in_range,
        &tables.batches,
        &tables.intervals,
        cfg.join_mode,
    );
    report.correlation = correlation;

    let features = aggregate(&clean, &cfg.series_filter());
    report.output_rows = features.len() as u64;

    info!(
        component = "features",
        event = "features.build.finish",
        input_rows = report.input_rows,
        in_range_rows = report.in_range_rows,
        clean_rows = report.correlation.clean_groups,
        output_rows = report.output_rows
    );

    (features, report)
}

pub fn load_source_tables(cfg: &PipelineConfig) -> Result<SourceTables, PipelineError> {
    let readings_path = cfg.source_root.join(COOKING_METRICS_FILE);
    let batches_path = cfg.source_root.join(BATCH_REGISTRY_FILE);
    let intervals_path = cfg.source_root.join(FAULTY_INTERVALS_FILE);

    Ok(SourceTables {
        readings: load_readings(&readings_path)
            .map_err(|err| table_error("cooking_metrics", err))?,
        batches: load_batches(&batches_path).map_err(|err| table_error("batch_registry", err))?,
        intervals: load_fault_intervals(&intervals_path)
            .map_err(|err| table_error("faulty_intervals", err))?,
    })
}

pub fn run_pipeline(
    cfg: &PipelineConfig,
    req: &FeatureRequest,
) -> Result<RunOutcome, PipelineError> {
    let tables = load_source_tables(cfg)?;
    let (rows, report) = build_features(&tables, req, cfg);

    if rows.is_empty() {
        info!(
            component = "pipeline",
            event = "pipeline.run.empty",
            in_range_rows = report.in_range_rows,
            clean_rows = report.correlation.clean_groups,
            "no output written"
        );
        return Ok(RunOutcome::Empty { report });
    }

    let path = output_dir(&cfg.output_root, &cfg.phase_id, req)
        .join(output_file_name(&cfg.kitchen_id, &cfg.series_filter()));
    write_features(&path, &rows)?;

    Ok(RunOutcome::Written { path, rows, report })
}

fn table_error(table: &'static str, err: LoadError) -> PipelineError {
    match err {
        LoadError::NotFound { path } => PipelineError::InputUnavailable { table, path },
        source => PipelineError::Load { table, source },
    }
}
