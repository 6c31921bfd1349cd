//! Cohort aggregation: reduce one scope's per-item metrics to the scalar
//! metrics a report column carries.

pub mod types;

pub use types::*;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rayon::prelude::*;

use crate::date_util::SECONDS_PER_DAY;
use crate::error::Result;
use crate::item::{analyze_item, ItemMetrics, ItemRecord};

/// Result of running reconstruction + extraction over a batch of records.
/// Items whose histories could not be reconciled are dropped here, one by
/// one, and their ids kept so callers can report the exclusion count.
#[derive(Debug)]
pub struct ExtractionOutcome {
    pub items: Vec<ItemMetrics>,
    pub excluded: Vec<String>,
}

/// Reconstruct and reduce every record, in parallel. Items are independent,
/// so this is a plain parallel map; inconsistent items are logged and
/// excluded rather than failing the batch.
pub fn analyze_items(records: &[ItemRecord], now: DateTime<Utc>) -> ExtractionOutcome {
    let results: Vec<(String, Result<ItemMetrics>)> = records
        .par_iter()
        .map(|record| (record.id.clone(), analyze_item(record, now)))
        .collect();

    let mut items = Vec::with_capacity(results.len());
    let mut excluded = Vec::new();
    for (id, result) in results {
        match result {
            Ok(metrics) => items.push(metrics),
            Err(e) => {
                log::warn!("excluding item from cohort: {e}");
                excluded.push(id);
            }
        }
    }
    ExtractionOutcome { items, excluded }
}

/// Reduce one scope's items over one window.
///
/// The window is validated first; a malformed window is a fatal
/// configuration error, not a column of NAs.
pub fn compute_cohort_metrics(
    items: &[ItemMetrics],
    excluded_items: u64,
    window: &CohortWindow,
) -> Result<CohortMetrics> {
    window.validate()?;

    let total_items = items.len() as u64;

    let mut states: BTreeMap<String, StateStats> = BTreeMap::new();
    for item in items {
        for (state, duration) in &item.state_durations {
            let stats = states.entry(state.clone()).or_default();
            stats.items_affected += 1;
            stats.total_days += duration.num_seconds() as f64 / SECONDS_PER_DAY;
            stats.total_entries += item.state_entry_counts[state];
        }
    }

    let mut type_counts: BTreeMap<String, u64> = BTreeMap::new();
    for item in items {
        *type_counts.entry(item.item_type.clone()).or_insert(0) += 1;
    }

    let closure = closure_stats(items);
    let throughput = throughput_variants(
        total_items,
        window.period_days() as f64,
        window.leave_days,
        window.capacity,
    );

    Ok(CohortMetrics {
        phase: window.name.clone(),
        total_items,
        excluded_items,
        states,
        closure,
        throughput,
        type_counts,
    })
}

/// Average and maximum creation-to-resolution time in days. Unresolved
/// items are excluded from both, not counted as zero.
fn closure_stats(items: &[ItemMetrics]) -> ClosureStats {
    let closure_days: Vec<f64> = items
        .iter()
        .filter_map(|item| item.closure_time())
        .map(|d| d.num_seconds() as f64 / SECONDS_PER_DAY)
        .collect();

    if closure_days.is_empty() {
        return ClosureStats::default();
    }
    let sum: f64 = closure_days.iter().sum();
    let max = closure_days.iter().cloned().fold(f64::MIN, f64::max);
    ClosureStats {
        analyzed: closure_days.len() as u64,
        avg_days: Some(sum / closure_days.len() as f64),
        max_days: Some(max),
    }
}

/// The four throughput readings over an analysis period. Each variant whose
/// effective denominator is not strictly positive yields `None`.
pub fn throughput_variants(
    total_items: u64,
    period_days: f64,
    leave_days: f64,
    capacity: f64,
) -> ThroughputVariants {
    let per = |denominator: f64| -> Option<f64> {
        (denominator > 0.0).then(|| total_items as f64 / denominator)
    };
    ThroughputVariants {
        baseline: per(period_days),
        skip_leave: per(period_days - leave_days),
        per_capacity: per(period_days * capacity),
        both: per((period_days - leave_days) * capacity),
    }
}
