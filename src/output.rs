//! Output path layout and CSV persistence for hourly features.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::aggregate::SeriesFilter;
use crate::range::FeatureRequest;
use crate::tables::{HourlyFeature, PATH_TIMESTAMP_FORMAT};

pub const OUTPUT_HEADERS: [&str; 5] = [
    "timestamp",
    "machine_id",
    "arepa_type",
    "metric_1",
    "metric_2",
];

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid output path: {0}")]
    InvalidPath(String),
}

/// `<output_root>/<phase_id>/<start>_<end>`, timestamps rendered as `YYYYMMDDTHHMMSS`.
pub fn output_dir(output_root: &Path, phase_id: &str, req: &FeatureRequest) -> PathBuf {
    output_root.join(phase_id).join(format!(
        "{}_{}",
        req.start.format(PATH_TIMESTAMP_FORMAT),
        req.end.format(PATH_TIMESTAMP_FORMAT)
    ))
}

pub fn output_file_name(kitchen_id: &str, filter: &SeriesFilter) -> String {
    let machine = filter.machine_id.as_deref();
    let arepa = filter.arepa_type.as_deref();
    match (machine, arepa) {
        (Some(machine), Some(arepa)) => format!("{kitchen_id}_{machine}_{arepa}.csv"),
        (Some(machine), None) => format!("{kitchen_id}_{machine}_all_arepas.csv"),
        (None, Some(arepa)) => format!("{kitchen_id}_all_machines_{arepa}.csv"),
        (None, None) => format!("{kitchen_id}_all_machines_all_arepas.csv"),
    }
}

/// One output line; field order follows `OUTPUT_HEADERS`.
#[derive(Debug, Serialize)]
struct FeatureRecord<'a> {
    timestamp: String,
    machine_id: &'a str,
    arepa_type: &'a str,
    metric_1: String,
    metric_2: String,
}

impl<'a> From<&'a HourlyFeature> for FeatureRecord<'a> {
    fn from(row: &'a HourlyFeature) -> Self {
        Self {
            timestamp: row.timestamp_label(),
            machine_id: &row.machine_id,
            arepa_type: &row.arepa_type,
            metric_1: format_metric(row.metric_1),
            metric_2: format_metric(row.metric_2),
        }
    }
}

pub fn render_features_csv(rows: &[HourlyFeature]) -> Result<Vec<u8>, OutputError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(OUTPUT_HEADERS)?;
    for row in rows {
        writer.serialize(FeatureRecord::from(row))?;
    }
    writer
        .into_inner()
        .map_err(|err| OutputError::Io(err.into_error()))
}

pub fn write_features(path: &Path, rows: &[HourlyFeature]) -> Result<(), OutputError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let bytes = render_features_csv(rows)?;
    write_atomic(path, &bytes)?;

    info!(
        component = "output",
        event = "output.write.finish",
        path = %path.display(),
        rows = rows.len(),
        bytes = bytes.len()
    );

    Ok(())
}

/// Shortest round-trip text. Missing means are written as an empty cell and
/// exponents carry a sign and at least two digits (`1e-07`, `1e+16`).
fn format_metric(value: f64) -> String {
    if value.is_nan() {
        return String::new();
    }
    let text = format!("{value:?}");
    let Some((mantissa, exponent)) = text.split_once('e') else {
        return text;
    };
    match exponent.parse::<i32>() {
        Ok(exp) => {
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{mantissa}e{sign}{:02}", exp.unsigned_abs())
        }
        Err(_) => text,
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), OutputError> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .ok_or_else(|| OutputError::InvalidPath(path.display().to_string()))?;
    let tmp_path = path.with_file_name(format!("{file_name}.tmp"));

    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }

    fs::rename(tmp_path, path)?;
    Ok(())
}
