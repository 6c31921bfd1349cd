//! Per-item metric extraction.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::error::Result;
use crate::timeline::{reconstruct_intervals, StateInterval, StatusEvent};

/// One work item as delivered by the retrieval layer: metadata plus the raw
/// status changelog. Everything the engine needs, nothing about where it
/// came from.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemRecord {
    pub id: String,
    #[serde(default = "default_item_type")]
    pub item_type: String,
    /// Stable identity key of the assignee, when known.
    #[serde(default)]
    pub assignee: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
    /// State the item is in today; the timeline falls back to this when the
    /// changelog is empty.
    pub current_state: String,
    #[serde(default)]
    pub events: Vec<StatusEvent>,
}

fn default_item_type() -> String {
    "Unknown".to_string()
}

impl ItemRecord {
    /// The terminal cutoff of this item's timeline: resolution time when
    /// resolved, the supplied "now" otherwise.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.resolved_at.unwrap_or(now)
    }
}

/// Immutable reduction of one item: how long it sat in each state and how
/// many times it entered each.
///
/// A state the item never visited is absent from both maps. Absence, not a
/// zero value, is what downstream aggregation reads as "not applicable".
#[derive(Debug, Clone)]
pub struct ItemMetrics {
    pub item_id: String,
    pub item_type: String,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub state_durations: BTreeMap<String, Duration>,
    pub state_entry_counts: BTreeMap<String, u64>,
}

impl ItemMetrics {
    /// Time from creation to resolution, for resolved items.
    pub fn closure_time(&self) -> Option<Duration> {
        self.resolved_at.map(|r| r - self.created_at)
    }
}

/// Reduce one item's reconstructed intervals to [`ItemMetrics`].
///
/// Every interval contributes its duration to `state_durations` and exactly
/// one entry to `state_entry_counts`, zero-duration intervals included. An
/// item that visits Review three times therefore counts 3 entries and the
/// sum of all three stays.
pub fn extract_item_metrics(record: &ItemRecord, intervals: &[StateInterval]) -> ItemMetrics {
    let mut state_durations: BTreeMap<String, Duration> = BTreeMap::new();
    let mut state_entry_counts: BTreeMap<String, u64> = BTreeMap::new();

    for interval in intervals {
        *state_durations
            .entry(interval.state.clone())
            .or_insert_with(Duration::zero) += interval.duration();
        *state_entry_counts.entry(interval.state.clone()).or_insert(0) += 1;
    }

    ItemMetrics {
        item_id: record.id.clone(),
        item_type: record.item_type.clone(),
        created_at: record.created_at,
        resolved_at: record.resolved_at,
        state_durations,
        state_entry_counts,
    }
}

/// Reconstruct and reduce in one step.
pub fn analyze_item(record: &ItemRecord, now: DateTime<Utc>) -> Result<ItemMetrics> {
    let intervals = reconstruct_intervals(
        &record.id,
        record.created_at,
        &record.events,
        &record.current_state,
        record.cutoff(now),
    )?;
    Ok(extract_item_metrics(record, &intervals))
}
