//! Hourly resampling of clean readings per (machine, arepa type) series.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use tracing::info;

use crate::tables::{floor_to_hour, CleanReading, HourlyFeature};

/// Post-aggregation row selection. `None` keeps every value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeriesFilter {
    pub machine_id: Option<String>,
    pub arepa_type: Option<String>,
}

impl SeriesFilter {
    pub fn matches(&self, machine_id: &str, arepa_type: &str) -> bool {
        self.machine_id.as_deref().map_or(true, |m| m == machine_id)
            && self.arepa_type.as_deref().map_or(true, |a| a == arepa_type)
    }
}

/// Running sum and count of the present values of one metric.
#[derive(Debug, Clone, Copy, Default)]
struct MetricSum {
    sum: f64,
    count: u64,
}

impl MetricSum {
    fn add(&mut self, value: Option<f64>) {
        if let Some(value) = value {
            self.sum += value;
            self.count += 1;
        }
    }

    fn mean(self) -> f64 {
        if self.count == 0 {
            return f64::NAN;
        }
        self.sum / self.count as f64
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct BucketSums {
    metric_1: MetricSum,
    metric_2: MetricSum,
}

pub fn aggregate(clean: &[CleanReading], filter: &SeriesFilter) -> Vec<HourlyFeature> {
    if clean.is_empty() {
        info!(
            component = "features",
            event = "features.aggregate.empty_input",
            "No features available for the specified date range"
        );
        return Vec::new();
    }

    let mut buckets: BTreeMap<(&str, &str, NaiveDateTime), BucketSums> = BTreeMap::new();
    for row in clean {
        let key = (
            row.machine_id.as_str(),
            row.arepa_type.as_str(),
            floor_to_hour(row.timestamp),
        );
        let bucket = buckets.entry(key).or_default();
        bucket.metric_1.add(row.metric_1);
        bucket.metric_2.add(row.metric_2);
    }

    let bucket_count = buckets.len();

    // Means are computed over every bucket first; the filter only selects rows.
    let features: Vec<HourlyFeature> = buckets
        .into_iter()
        .map(|((machine_id, arepa_type, hour), sums)| HourlyFeature {
            hour,
            machine_id: machine_id.to_string(),
            arepa_type: arepa_type.to_string(),
            metric_1: sums.metric_1.mean(),
            metric_2: sums.metric_2.mean(),
        })
        .filter(|feature| filter.matches(&feature.machine_id, &feature.arepa_type))
        .collect();

    if features.is_empty() {
        info!(
            component = "features",
            event = "features.aggregate.no_features",
            hourly_buckets = bucket_count,
            "No features available for the specified date range"
        );
        return features;
    }

    info!(
        component = "features",
        event = "features.aggregate.finish",
        clean_rows = clean.len(),
        hourly_buckets = bucket_count,
        output_rows = features.len(),
        machine_filter = filter.machine_id.as_deref().unwrap_or("*"),
        arepa_filter = filter.arepa_type.as_deref().unwrap_or("*")
    );

    features
}
