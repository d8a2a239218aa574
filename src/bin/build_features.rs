use std::path::PathBuf;

use chrono::NaiveDateTime;
use clap::Parser;
use kitchen_qc::{
    init_logging, log_run_outcome, log_run_start, logging_config_from_env, parse_cli_timestamp,
    run_pipeline, FeatureRequest, JoinMode, PipelineConfig,
};

#[derive(Debug, Parser)]
#[command(name = "build_features")]
#[command(about = "Build hourly cooking-machine QC features for a date range", long_about = None)]
struct Cli {
    /// Range start, inclusive (YYYY-MM-DDTHH:MM:SS)
    #[arg(value_parser = parse_cli_timestamp)]
    start_date: NaiveDateTime,

    /// Range end, inclusive (YYYY-MM-DDTHH:MM:SS)
    #[arg(value_parser = parse_cli_timestamp)]
    end_date: NaiveDateTime,

    /// Machine to keep in the output
    #[arg(long, default_value = "m1", conflicts_with = "all_machines")]
    machine_id: String,

    /// Keep every machine
    #[arg(long, default_value_t = false)]
    all_machines: bool,

    /// Arepa type to keep in the output
    #[arg(long, default_value = "a1", conflicts_with = "all_arepa_types")]
    arepa_type: String,

    /// Keep every arepa type
    #[arg(long, default_value_t = false)]
    all_arepa_types: bool,

    #[arg(long, default_value = "k1")]
    kitchen_id: String,

    #[arg(long, default_value = "phase1")]
    phase_id: String,

    /// Directory holding cooking_metrics.csv, batch_registry.csv and faulty_intervals.csv
    #[arg(long, default_value = "source")]
    source_root: PathBuf,

    #[arg(long, default_value = "outputs")]
    output_root: PathBuf,

    /// How machines without fault intervals are treated: inner | left-never-faulty
    #[arg(long, default_value = "inner", value_parser = parse_join_mode)]
    join_mode: JoinMode,
}

impl Cli {
    fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            kitchen_id: self.kitchen_id.clone(),
            phase_id: self.phase_id.clone(),
            machine_filter: (!self.all_machines).then(|| self.machine_id.clone()),
            arepa_filter: (!self.all_arepa_types).then(|| self.arepa_type.clone()),
            source_root: self.source_root.clone(),
            output_root: self.output_root.clone(),
            join_mode: self.join_mode,
        }
    }

    fn request(&self) -> FeatureRequest {
        FeatureRequest {
            start: self.start_date,
            end: self.end_date,
        }
    }
}

fn parse_join_mode(raw: &str) -> Result<JoinMode, String> {
    JoinMode::parse(raw).ok_or_else(|| format!("unknown join mode '{raw}'"))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let logging_cfg = logging_config_from_env();
    init_logging(&logging_cfg)?;

    let cfg = cli.pipeline_config();
    let req = cli.request();
    log_run_start(&logging_cfg, &cfg, &req);

    let outcome = run_pipeline(&cfg, &req)?;
    log_run_outcome(&outcome);

    Ok(())
}
