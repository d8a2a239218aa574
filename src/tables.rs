//! Row types shared by the loader, the feature stages and the writer.

use chrono::{NaiveDateTime, Timelike};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
pub const PATH_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S";

const ACCEPTED_TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// One sensor sample from a cooking machine. An empty metric cell loads as `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub timestamp: NaiveDateTime,
    pub machine_id: String,
    pub batch_id: String,
    pub metric_1: Option<f64>,
    pub metric_2: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub batch_id: String,
    pub arepa_type: String,
    pub machine_id: Option<String>,
}

/// Window during which a machine was malfunctioning. Both bounds are inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultInterval {
    pub machine_id: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
}

impl FaultInterval {
    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        self.start_time <= ts && ts <= self.end_time
    }
}

/// A reading that joined a batch and fell outside every fault interval of its machine.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanReading {
    pub timestamp: NaiveDateTime,
    pub machine_id: String,
    pub batch_id: String,
    pub arepa_type: String,
    pub metric_1: Option<f64>,
    pub metric_2: Option<f64>,
}

/// Hourly means. A metric with no values in its hour is `NaN`.
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyFeature {
    pub hour: NaiveDateTime,
    pub machine_id: String,
    pub arepa_type: String,
    pub metric_1: f64,
    pub metric_2: f64,
}

impl HourlyFeature {
    pub fn timestamp_label(&self) -> String {
        format_timestamp(self.hour)
    }
}

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    ACCEPTED_TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
}

/// Strict `YYYY-MM-DDTHH:MM:SS` parsing for command-line range bounds.
pub fn parse_cli_timestamp(raw: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .map_err(|_| format!("not a valid date: '{raw}' (expected YYYY-MM-DDTHH:MM:SS)"))
}

pub fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn floor_to_hour(ts: NaiveDateTime) -> NaiveDateTime {
    ts.date().and_hms_opt(ts.hour(), 0, 0).unwrap_or(ts)
}
