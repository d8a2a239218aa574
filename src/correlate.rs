//! Batch and fault-interval correlation.
//!
//! Readings are joined to the batch registry on `batch_id`, then fanned out
//! against every fault interval of their machine. A reading group keyed by
//! `(timestamp, machine_id, batch_id)` survives only when none of its
//! fanned-out rows falls inside the interval it was paired with.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDateTime;
use tracing::{debug, info};

use crate::tables::{Batch, CleanReading, FaultInterval, Reading};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinMode {
    /// Machines without any fault interval rows are dropped.
    #[default]
    Inner,
    /// Machines without any fault interval rows are treated as never faulty.
    LeftNeverFaulty,
}

impl JoinMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inner => "inner",
            Self::LeftNeverFaulty => "left-never-faulty",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "inner" => Some(Self::Inner),
            "left-never-faulty" | "left" => Some(Self::LeftNeverFaulty),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrelationReport {
    pub input_rows: u64,
    pub unmatched_batch_rows: u64,
    pub duplicate_batch_ids: u64,
    pub rows_without_intervals: u64,
    pub fan_out_rows: u64,
    pub faulty_groups: u64,
    pub clean_groups: u64,
}

#[derive(Debug)]
struct GroupState<'a> {
    first: &'a Reading,
    arepa_type: &'a str,
    // First present value of each metric across the group's rows.
    metric_1: Option<f64>,
    metric_2: Option<f64>,
    faulty_hits: u64,
}

pub fn correlate(
    readings: &[Reading],
    batches: &[Batch],
    intervals: &[FaultInterval],
    join_mode: JoinMode,
) -> (Vec<CleanReading>, CorrelationReport) {
    let mut report = CorrelationReport {
        input_rows: readings.len() as u64,
        ..CorrelationReport::default()
    };

    if readings.is_empty() {
        info!(
            component = "features",
            event = "features.correlate.empty_input",
            "No readings to correlate against batches and fault intervals"
        );
        return (Vec::new(), report);
    }

    let mut arepa_by_batch: HashMap<&str, &str> = HashMap::with_capacity(batches.len());
    for batch in batches {
        match arepa_by_batch.entry(batch.batch_id.as_str()) {
            Entry::Occupied(_) => report.duplicate_batch_ids += 1,
            Entry::Vacant(slot) => {
                slot.insert(batch.arepa_type.as_str());
            }
        }
    }
    if report.duplicate_batch_ids > 0 {
        debug!(
            component = "features",
            event = "features.correlate.duplicate_batch_ids",
            duplicate_batch_ids = report.duplicate_batch_ids
        );
    }

    let mut intervals_by_machine: HashMap<&str, Vec<&FaultInterval>> = HashMap::new();
    for interval in intervals {
        intervals_by_machine
            .entry(interval.machine_id.as_str())
            .or_default()
            .push(interval);
    }

    let mut groups: BTreeMap<(NaiveDateTime, &str, &str), GroupState<'_>> = BTreeMap::new();
    for reading in readings {
        let Some(arepa_type) = arepa_by_batch.get(reading.batch_id.as_str()).copied() else {
            report.unmatched_batch_rows += 1;
            continue;
        };

        let faulty_hits = match intervals_by_machine.get(reading.machine_id.as_str()) {
            Some(machine_intervals) => {
                report.fan_out_rows += machine_intervals.len() as u64;
                machine_intervals
                    .iter()
                    .filter(|interval| interval.contains(reading.timestamp))
                    .count() as u64
            }
            None => match join_mode {
                JoinMode::Inner => {
                    report.rows_without_intervals += 1;
                    continue;
                }
                JoinMode::LeftNeverFaulty => {
                    report.fan_out_rows += 1;
                    0
                }
            },
        };

        let key = (
            reading.timestamp,
            reading.machine_id.as_str(),
            reading.batch_id.as_str(),
        );
        groups
            .entry(key)
            .and_modify(|group| {
                group.metric_1 = group.metric_1.or(reading.metric_1);
                group.metric_2 = group.metric_2.or(reading.metric_2);
                group.faulty_hits += faulty_hits;
            })
            .or_insert(GroupState {
                first: reading,
                arepa_type,
                metric_1: reading.metric_1,
                metric_2: reading.metric_2,
                faulty_hits,
            });
    }

    let mut clean = Vec::with_capacity(groups.len());
    for group in groups.into_values() {
        if group.faulty_hits != 0 {
            report.faulty_groups += 1;
            continue;
        }
        clean.push(CleanReading {
            timestamp: group.first.timestamp,
            machine_id: group.first.machine_id.clone(),
            batch_id: group.first.batch_id.clone(),
            arepa_type: group.arepa_type.to_string(),
            metric_1: group.metric_1,
            metric_2: group.metric_2,
        });
    }
    report.clean_groups = clean.len() as u64;

    if report.unmatched_batch_rows > 0 || report.rows_without_intervals > 0 {
        debug!(
            component = "features",
            event = "features.correlate.join_dropped",
            join_mode = join_mode.as_str(),
            unmatched_batch_rows = report.unmatched_batch_rows,
            rows_without_intervals = report.rows_without_intervals
        );
    }

    info!(
        component = "features",
        event = "features.correlate.finish",
        join_mode = join_mode.as_str(),
        input_rows = report.input_rows,
        fan_out_rows = report.fan_out_rows,
        faulty_groups = report.faulty_groups,
        clean_groups = report.clean_groups
    );

    (clean, report)
}
