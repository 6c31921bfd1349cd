//! Reconstruction of per-item state timelines from status-change events.
//!
//! An item's changelog arrives as a list of `(timestamp, from, to)` status
//! transitions. This module turns that list plus the creation time and a
//! cutoff (resolution time, or "now" for open items) into a contiguous run
//! of [`StateInterval`]s covering the whole lifetime.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A single status transition from an item's changelog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub at: DateTime<Utc>,
    pub from_state: String,
    pub to_state: String,
}

/// A closed span of time during which one state was active.
///
/// Intervals for an item are contiguous: each interval's `end` equals the
/// next interval's `start`, and together they cover `[created_at, cutoff]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateInterval {
    pub state: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl StateInterval {
    pub fn duration(&self) -> chrono::Duration {
        self.end - self.start
    }
}

/// Rebuild the full state timeline of one item.
///
/// `events` need not be pre-sorted; they are stably sorted by timestamp here,
/// so same-timestamp events keep their changelog order. The initial state is
/// the `from_state` of the first event; with no events at all the item is
/// assumed to have sat in `current_state` for its entire lifetime.
///
/// Event timestamps earlier than `created_at` are clamped to `created_at`
/// (source clock skew). A transition whose `to_state` equals its `from_state`
/// still closes and reopens an interval, so re-entry counts downstream see it.
///
/// Errors with [`Error::DataConsistency`] when the stream cannot be
/// reconciled: a same-timestamp event contradicting the state it claims to
/// leave, or a cutoff earlier than the last transition.
pub fn reconstruct_intervals(
    item_id: &str,
    created_at: DateTime<Utc>,
    events: &[StatusEvent],
    current_state: &str,
    cutoff: DateTime<Utc>,
) -> Result<Vec<StateInterval>> {
    let inconsistent = |message: String| Error::DataConsistency {
        item_id: item_id.to_string(),
        message,
    };

    if cutoff < created_at {
        return Err(inconsistent(format!(
            "cutoff {cutoff} precedes creation {created_at}"
        )));
    }

    let mut events: Vec<&StatusEvent> = events.iter().collect();
    events.sort_by_key(|e| e.at);

    if events.is_empty() {
        return Ok(vec![StateInterval {
            state: current_state.to_string(),
            start: created_at,
            end: cutoff,
        }]);
    }

    let mut intervals = Vec::with_capacity(events.len() + 1);
    let mut open_state = events[0].from_state.clone();
    let mut open_start = created_at;

    for event in &events {
        let at = if event.at < created_at {
            log::debug!(
                "{item_id}: event at {} precedes creation, clamping to {created_at}",
                event.at
            );
            created_at
        } else {
            event.at
        };

        // Within a same-timestamp run the changelog order is all we have to
        // go on; a from-state that disagrees with the running state means the
        // order cannot be trusted either.
        if at == open_start && event.from_state != open_state {
            return Err(inconsistent(format!(
                "transition at {at} leaves '{}' but item was in '{open_state}'",
                event.from_state
            )));
        }

        intervals.push(StateInterval {
            state: open_state,
            start: open_start,
            end: at,
        });
        open_state = event.to_state.clone();
        open_start = at;
    }

    if cutoff < open_start {
        return Err(inconsistent(format!(
            "cutoff {cutoff} precedes last transition at {open_start}"
        )));
    }
    intervals.push(StateInterval {
        state: open_state,
        start: open_start,
        end: cutoff,
    });

    Ok(intervals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap() + chrono::Duration::hours(hour as i64)
    }

    fn ev(hour: u32, from: &str, to: &str) -> StatusEvent {
        StatusEvent {
            at: ts(hour),
            from_state: from.to_string(),
            to_state: to.to_string(),
        }
    }

    fn assert_covers(intervals: &[StateInterval], start: DateTime<Utc>, end: DateTime<Utc>) {
        assert_eq!(intervals.first().unwrap().start, start);
        assert_eq!(intervals.last().unwrap().end, end);
        for pair in intervals.windows(2) {
            assert_eq!(pair[0].end, pair[1].start, "gap or overlap between intervals");
        }
        let total: i64 = intervals.iter().map(|i| i.duration().num_seconds()).sum();
        assert_eq!(total, (end - start).num_seconds());
    }

    #[test]
    fn test_zero_events_single_interval() {
        let intervals = reconstruct_intervals("X-1", ts(0), &[], "Done", ts(48)).unwrap();
        assert_eq!(intervals.len(), 1);
        assert_eq!(intervals[0].state, "Done");
        assert_covers(&intervals, ts(0), ts(48));
    }

    #[test]
    fn test_rework_scenario() {
        // New -> InProgress @5h, -> Review @30h, back to InProgress @40h,
        // -> Done @50h, resolved @50h.
        let events = vec![
            ev(5, "New", "InProgress"),
            ev(30, "InProgress", "Review"),
            ev(40, "Review", "InProgress"),
            ev(50, "InProgress", "Done"),
        ];
        let intervals = reconstruct_intervals("X-2", ts(0), &events, "Done", ts(50)).unwrap();

        assert_eq!(intervals.len(), 5);
        assert_covers(&intervals, ts(0), ts(50));
        let states: Vec<&str> = intervals.iter().map(|i| i.state.as_str()).collect();
        assert_eq!(states, ["New", "InProgress", "Review", "InProgress", "Done"]);
        assert_eq!(intervals[0].duration().num_hours(), 5);
        assert_eq!(intervals[4].duration().num_hours(), 0);
    }

    #[test]
    fn test_initial_state_is_first_from_state() {
        let events = vec![ev(10, "Backlog", "InProgress")];
        let intervals = reconstruct_intervals("X-3", ts(0), &events, "InProgress", ts(20)).unwrap();
        assert_eq!(intervals[0].state, "Backlog");
    }

    #[test]
    fn test_unsorted_events_are_sorted() {
        let events = vec![ev(30, "InProgress", "Done"), ev(10, "New", "InProgress")];
        let intervals = reconstruct_intervals("X-4", ts(0), &events, "Done", ts(40)).unwrap();
        let states: Vec<&str> = intervals.iter().map(|i| i.state.as_str()).collect();
        assert_eq!(states, ["New", "InProgress", "Done"]);
        assert_covers(&intervals, ts(0), ts(40));
    }

    #[test]
    fn test_pre_creation_event_clamped() {
        let mut early = ev(0, "New", "InProgress");
        early.at = ts(0) - chrono::Duration::hours(3);
        let intervals = reconstruct_intervals("X-5", ts(0), &[early], "InProgress", ts(10)).unwrap();
        assert_eq!(intervals.len(), 2);
        assert_eq!(intervals[0].duration().num_seconds(), 0);
        assert_covers(&intervals, ts(0), ts(10));
    }

    #[test]
    fn test_noop_transition_produces_adjacent_same_state_intervals() {
        let events = vec![ev(5, "New", "InProgress"), ev(8, "InProgress", "InProgress")];
        let intervals = reconstruct_intervals("X-6", ts(0), &events, "InProgress", ts(12)).unwrap();
        assert_eq!(intervals.len(), 3);
        assert_eq!(intervals[1].state, "InProgress");
        assert_eq!(intervals[2].state, "InProgress");
        assert_covers(&intervals, ts(0), ts(12));
    }

    #[test]
    fn test_contradictory_same_timestamp_events() {
        let events = vec![ev(5, "New", "InProgress"), ev(5, "Review", "Done")];
        let err = reconstruct_intervals("X-7", ts(0), &events, "Done", ts(10)).unwrap_err();
        assert!(matches!(err, Error::DataConsistency { ref item_id, .. } if item_id == "X-7"));
    }

    #[test]
    fn test_same_timestamp_consistent_chain_is_fine() {
        let events = vec![ev(5, "New", "Triage"), ev(5, "Triage", "InProgress")];
        let intervals = reconstruct_intervals("X-8", ts(0), &events, "InProgress", ts(10)).unwrap();
        assert_eq!(intervals.len(), 3);
        assert_eq!(intervals[1].duration().num_seconds(), 0);
    }

    #[test]
    fn test_cutoff_before_last_event() {
        let events = vec![ev(20, "New", "Done")];
        let err = reconstruct_intervals("X-9", ts(0), &events, "Done", ts(10)).unwrap_err();
        assert!(err.is_item_level());
    }

    #[test]
    fn test_cutoff_before_creation() {
        let err =
            reconstruct_intervals("X-10", ts(10), &[], "New", ts(10) - chrono::Duration::hours(1))
                .unwrap_err();
        assert!(matches!(err, Error::DataConsistency { .. }));
    }
}
