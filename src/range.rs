//! Closed date-range selection over raw readings.

use chrono::NaiveDateTime;
use tracing::{info, warn};

use crate::tables::{format_timestamp, Reading};

/// Inclusive `[start, end]` window requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureRequest {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl FeatureRequest {
    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        self.start <= ts && ts <= self.end
    }
}

pub fn filter_readings(readings: &[Reading], req: &FeatureRequest) -> Vec<Reading> {
    if req.start > req.end {
        warn!(
            component = "features",
            event = "features.range.inverted",
            start = %format_timestamp(req.start),
            end = %format_timestamp(req.end)
        );
        return Vec::new();
    }

    let selected: Vec<Reading> = readings
        .iter()
        .filter(|reading| req.contains(reading.timestamp))
        .cloned()
        .collect();

    if selected.is_empty() {
        info!(
            component = "features",
            event = "features.range.empty",
            start = %format_timestamp(req.start),
            end = %format_timestamp(req.end),
            input_rows = readings.len(),
            "No rows available for the specified date range"
        );
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::parse_timestamp;

    fn ts(raw: &str) -> NaiveDateTime {
        parse_timestamp(raw).expect("timestamp should parse")
    }

    fn reading(raw_ts: &str, machine_id: &str) -> Reading {
        Reading {
            timestamp: ts(raw_ts),
            machine_id: machine_id.to_string(),
            batch_id: "b1".to_string(),
            metric_1: Some(1.0),
            metric_2: Some(2.0),
        }
    }

    #[test]
    fn keeps_rows_within_closed_window_in_original_order() {
        let readings = vec![
            reading("2020-11-01T01:45:00", "m2"),
            reading("2020-11-01T00:59:59", "m1"),
            reading("2020-11-01T01:00:00", "m1"),
            reading("2020-11-01T02:00:00", "m1"),
            reading("2020-11-01T02:00:01", "m1"),
        ];
        let req = FeatureRequest {
            start: ts("2020-11-01T01:00:00"),
            end: ts("2020-11-01T02:00:00"),
        };

        let out = filter_readings(&readings, &req);

        assert_eq!(
            out,
            vec![readings[0].clone(), readings[2].clone(), readings[3].clone()]
        );
        assert!(out.iter().all(|r| req.contains(r.timestamp)));
    }

    #[test]
    fn window_without_rows_is_empty_not_an_error() {
        let readings = vec![reading("2020-11-01T01:30:00", "m1")];
        let req = FeatureRequest {
            start: ts("2020-11-01T00:23:34"),
            end: ts("2020-11-01T01:23:33"),
        };

        assert!(filter_readings(&readings, &req).is_empty());
    }

    #[test]
    fn inverted_window_selects_nothing() {
        let readings = vec![reading("2020-11-01T01:30:00", "m1")];
        let req = FeatureRequest {
            start: ts("2020-11-01T02:00:00"),
            end: ts("2020-11-01T01:00:00"),
        };

        assert!(filter_readings(&readings, &req).is_empty());
    }
}
