use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::date_util::days_between_inclusive;
use crate::error::{Error, Result};

/// A named analysis window plus the availability context metrics are
/// normalized against.
///
/// `capacity` is FTE: 1.0 for one full-time member, a fraction for part
/// time, the sum of member capacities for a team scope. `capacity = 0`
/// marks a member inactive in the window; throughput then reads NA rather
/// than dividing by zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortWindow {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub leave_days: f64,
    pub capacity: f64,
}

impl CohortWindow {
    /// A cohort cannot report with an undefined period; checked before any
    /// metric computation starts.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Config("phase name is empty".to_string()));
        }
        if self.end_date < self.start_date {
            return Err(Error::Config(format!(
                "phase '{}': end date {} precedes start date {}",
                self.name, self.end_date, self.start_date
            )));
        }
        if self.leave_days < 0.0 {
            return Err(Error::Config(format!(
                "phase '{}': negative leave days {}",
                self.name, self.leave_days
            )));
        }
        if self.capacity < 0.0 {
            return Err(Error::Config(format!(
                "phase '{}': negative capacity {}",
                self.name, self.capacity
            )));
        }
        Ok(())
    }

    /// Window length in days, inclusive of both ends.
    pub fn period_days(&self) -> i64 {
        days_between_inclusive(self.start_date, self.end_date)
    }
}

/// Aggregate duration/entry statistics for one state across a cohort.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StateStats {
    /// Items that visited the state at least once.
    pub items_affected: u64,
    /// Interval count across the whole cohort, no-op re-entries included.
    pub total_entries: u64,
    pub total_days: f64,
}

impl StateStats {
    /// Average days per item *that visited the state*. Items that never did
    /// are not averaged in; that would understate active bottleneck time.
    pub fn avg_days(&self) -> f64 {
        self.total_days / self.items_affected as f64
    }
}

/// Closure-time statistics over resolved items only.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClosureStats {
    pub analyzed: u64,
    pub avg_days: Option<f64>,
    pub max_days: Option<f64>,
}

/// The four daily-throughput readings. `None` marks a non-positive
/// denominator (departed member, leave swallowing the whole window).
#[derive(Debug, Clone, Default, Serialize)]
pub struct ThroughputVariants {
    pub baseline: Option<f64>,
    pub skip_leave: Option<f64>,
    pub per_capacity: Option<f64>,
    pub both: Option<f64>,
}

/// Everything the cohort aggregator reduces one scope (team or member, one
/// phase) down to.
#[derive(Debug, Clone, Serialize)]
pub struct CohortMetrics {
    pub phase: String,
    pub total_items: u64,
    /// Items dropped by consistency checks; reported, never silently lost.
    pub excluded_items: u64,
    pub states: BTreeMap<String, StateStats>,
    pub closure: ClosureStats,
    pub throughput: ThroughputVariants,
    pub type_counts: BTreeMap<String, u64>,
}

impl CohortMetrics {
    /// Average time in `state`, NA when no item in the cohort visited it.
    pub fn state_avg_days(&self, state: &str) -> Option<f64> {
        self.states.get(state).map(StateStats::avg_days)
    }

    /// Entries into `state` per item over the whole cohort (rework gauge);
    /// NA when the cohort never entered the state at all.
    pub fn reentry_rate(&self, state: &str) -> Option<f64> {
        let stats = self.states.get(state)?;
        if stats.total_entries == 0 || self.total_items == 0 {
            return None;
        }
        Some(stats.total_entries as f64 / self.total_items as f64)
    }

    /// Share of the cohort with the given type, as a percentage. NA for an
    /// empty cohort; 0% for a type the cohort simply does not contain.
    pub fn type_percentage(&self, item_type: &str) -> Option<f64> {
        if self.total_items == 0 {
            return None;
        }
        let count = self.type_counts.get(item_type).copied().unwrap_or(0);
        Some(count as f64 / self.total_items as f64 * 100.0)
    }
}
