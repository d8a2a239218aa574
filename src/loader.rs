//! Source table loading from `;`-delimited, comma-decimal CSV files.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use csv::StringRecord;
use thiserror::Error;
use tracing::{info, warn};

use crate::tables::{parse_timestamp, Batch, FaultInterval, Reading};

pub const COOKING_METRICS_FILE: &str = "cooking_metrics.csv";
pub const BATCH_REGISTRY_FILE: &str = "batch_registry.csv";
pub const FAULTY_INTERVALS_FILE: &str = "faulty_intervals.csv";

const DELIMITER: u8 = b';';

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{} dataset not found", path.display())]
    NotFound { path: PathBuf },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("{} is missing required column '{column}'", path.display())]
    MissingColumn { path: PathBuf, column: &'static str },
    #[error("{}:{line}: failed to parse field {field} value '{value}'", path.display())]
    ParseField {
        path: PathBuf,
        line: u64,
        field: &'static str,
        value: String,
    },
}

/// Column positions resolved from a header row.
struct Columns<'a> {
    path: &'a Path,
    headers: StringRecord,
}

impl Columns<'_> {
    fn required(&self, column: &'static str) -> Result<usize, LoadError> {
        self.optional(column).ok_or_else(|| LoadError::MissingColumn {
            path: self.path.to_path_buf(),
            column,
        })
    }

    fn optional(&self, column: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|header| header.trim().trim_start_matches('\u{feff}') == column)
    }
}

pub fn load_readings(path: &Path) -> Result<Vec<Reading>, LoadError> {
    read_table(path, |columns| {
        let timestamp = columns.required("timestamp")?;
        let machine_id = columns.required("machine_id")?;
        let batch_id = columns.required("batch_id")?;
        let metric_1 = columns.required("metric_1")?;
        let metric_2 = columns.required("metric_2")?;

        Ok(move |record: &StringRecord, line: u64| -> Result<Reading, LoadError> {
            Ok(Reading {
                timestamp: parse_ts(path, record, line, timestamp, "timestamp")?,
                machine_id: text(record, machine_id),
                batch_id: text(record, batch_id),
                metric_1: parse_decimal(path, record, line, metric_1, "metric_1")?,
                metric_2: parse_decimal(path, record, line, metric_2, "metric_2")?,
            })
        })
    })
}

pub fn load_batches(path: &Path) -> Result<Vec<Batch>, LoadError> {
    read_table(path, |columns| {
        let batch_id = columns.required("batch_id")?;
        let arepa_type = columns.required("arepa_type")?;
        let machine_id = columns.optional("machine_id");

        Ok(move |record: &StringRecord, _line: u64| -> Result<Batch, LoadError> {
            Ok(Batch {
                batch_id: text(record, batch_id),
                arepa_type: text(record, arepa_type),
                machine_id: machine_id
                    .map(|idx| text(record, idx))
                    .filter(|value| !value.is_empty()),
            })
        })
    })
}

pub fn load_fault_intervals(path: &Path) -> Result<Vec<FaultInterval>, LoadError> {
    read_table(path, |columns| {
        let machine_id = columns.required("machine_id")?;
        let start_time = columns.required("start_time")?;
        let end_time = columns.required("end_time")?;

        Ok(move |record: &StringRecord, line: u64| -> Result<FaultInterval, LoadError> {
            Ok(FaultInterval {
                machine_id: text(record, machine_id),
                start_time: parse_ts(path, record, line, start_time, "start_time")?,
                end_time: parse_ts(path, record, line, end_time, "end_time")?,
            })
        })
    })
}

fn read_table<T, P, B>(path: &Path, bind: B) -> Result<Vec<T>, LoadError>
where
    B: FnOnce(&Columns<'_>) -> Result<P, LoadError>,
    P: Fn(&StringRecord, u64) -> Result<T, LoadError>,
{
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            warn!(
                component = "loader",
                event = "loader.dataset.not_found",
                path = %path.display(),
                "{} dataset not found",
                path.display()
            );
            return Err(LoadError::NotFound {
                path: path.to_path_buf(),
            });
        }
        Err(err) => return Err(err.into()),
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let columns = Columns {
        path,
        headers: reader.headers()?.clone(),
    };
    let parse_record = bind(&columns)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }
        let line = record.position().map(|pos| pos.line()).unwrap_or_default();
        rows.push(parse_record(&record, line)?);
    }

    info!(
        component = "loader",
        event = "loader.dataset.loaded",
        path = %path.display(),
        rows = rows.len()
    );

    Ok(rows)
}

fn text(record: &StringRecord, idx: usize) -> String {
    record.get(idx).unwrap_or_default().to_string()
}

fn parse_ts(
    path: &Path,
    record: &StringRecord,
    line: u64,
    idx: usize,
    field: &'static str,
) -> Result<NaiveDateTime, LoadError> {
    let raw = record.get(idx).unwrap_or_default();
    parse_timestamp(raw).ok_or_else(|| LoadError::ParseField {
        path: path.to_path_buf(),
        line,
        field,
        value: raw.to_string(),
    })
}

/// Empty cells are missing values; anything else must be a decimal number.
fn parse_decimal(
    path: &Path,
    record: &StringRecord,
    line: u64,
    idx: usize,
    field: &'static str,
) -> Result<Option<f64>, LoadError> {
    let raw = record.get(idx).unwrap_or_default();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.replace(',', ".")
        .parse::<f64>()
        .map(Some)
        .map_err(|_| LoadError::ParseField {
            path: path.to_path_buf(),
            line,
            field,
            value: raw.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).expect("fixture should be written");
        path
    }

    #[test]
    fn reads_semicolon_delimited_comma_decimal_readings() {
        let dir = tempdir().expect("temp dir should be created");
        let path = write(
            dir.path(),
            COOKING_METRICS_FILE,
            "timestamp;machine_id;batch_id;metric_1;metric_2;arepa_type\n\
             2020-11-01 01:30:00;m1;b1;0,1;0,8;a1\n\
             2020-11-01T01:45:00;m1;b1;0,1564;1\n\
             \n",
        );

        let rows = load_readings(&path).expect("readings should load");

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].machine_id, "m1");
        assert_eq!(rows[0].metric_1, Some(0.1));
        assert_eq!(rows[1].metric_1, Some(0.1564));
        assert_eq!(rows[1].metric_2, Some(1.0));
        assert_eq!(
            rows[1].timestamp,
            parse_timestamp("2020-11-01T01:45:00").expect("valid timestamp")
        );
    }

    #[test]
    fn batch_machine_column_is_optional() {
        let dir = tempdir().expect("temp dir should be created");
        let without = write(dir.path(), "a.csv", "batch_id;arepa_type\nb1;a1\n");
        let with = write(
            dir.path(),
            "b.csv",
            "batch_id;arepa_type;machine_id\nb1;a1;m1\nb2;a2;\n",
        );

        let without = load_batches(&without).expect("batches should load");
        let with = load_batches(&with).expect("batches should load");

        assert_eq!(without[0].machine_id, None);
        assert_eq!(with[0].machine_id.as_deref(), Some("m1"));
        assert_eq!(with[1].machine_id, None);
    }

    #[test]
    fn reads_fault_intervals() {
        let dir = tempdir().expect("temp dir should be created");
        let path = write(
            dir.path(),
            FAULTY_INTERVALS_FILE,
            "machine_id;start_time;end_time\nm1;2020-11-01 02:00:00;2020-11-01 02:10:00\n",
        );

        let rows = load_fault_intervals(&path).expect("intervals should load");

        assert_eq!(rows.len(), 1);
        assert!(rows[0].start_time < rows[0].end_time);
    }

    #[test]
    fn missing_file_is_reported_not_swallowed() {
        let dir = tempdir().expect("temp dir should be created");
        let err = load_batches(&dir.path().join(BATCH_REGISTRY_FILE)).expect_err("must fail");

        assert!(matches!(err, LoadError::NotFound { .. }));
        assert!(err.to_string().ends_with("batch_registry.csv dataset not found"));
    }

    #[test]
    fn missing_join_column_is_rejected() {
        let dir = tempdir().expect("temp dir should be created");
        let path = write(dir.path(), "r.csv", "timestamp;machine_id;metric_1;metric_2\n");

        let err = load_readings(&path).expect_err("must fail");

        assert!(matches!(
            err,
            LoadError::MissingColumn {
                column: "batch_id",
                ..
            }
        ));
    }

    #[test]
    fn empty_metric_cells_load_as_missing() {
        let dir = tempdir().expect("temp dir should be created");
        let path = write(
            dir.path(),
            COOKING_METRICS_FILE,
            "timestamp;machine_id;batch_id;metric_1;metric_2\n\
             2020-11-01T01:30:00;m1;b1;0,1;0,8\n\
             2020-11-01T01:45:00;m1;b1;;0,827\n\
             2020-11-01T01:50:00;m1;b1;0,2\n",
        );

        let rows = load_readings(&path).expect("empty cells are not a load error");

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].metric_1, None);
        assert_eq!(rows[1].metric_2, Some(0.827));
        assert_eq!(rows[2].metric_1, Some(0.2));
        assert_eq!(rows[2].metric_2, None);
    }

    #[test]
    fn unparseable_metric_reports_line_and_field() {
        let dir = tempdir().expect("temp dir should be created");
        let path = write(
            dir.path(),
            "r.csv",
            "timestamp;machine_id;batch_id;metric_1;metric_2\n\
             2020-11-01T01:30:00;m1;b1;abc;0,8\n",
        );

        let err = load_readings(&path).expect_err("must fail");

        match err {
            LoadError::ParseField {
                line, field, value, ..
            } => {
                assert_eq!(line, 2);
                assert_eq!(field, "metric_1");
                assert_eq!(value, "abc");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
