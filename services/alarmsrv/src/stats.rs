//! Statistics aggregation
//!
//! Pure recomputation from an occurrence snapshot. No side effects; safe to
//! call on every store mutation.

use chrono::{DateTime, Duration, Utc};
use gridmon_model::{AlarmState, AlarmStatistics, Severity};

use crate::store::OccurrenceSnapshot;

/// Derive statistics from a snapshot.
///
/// Severity buckets cover open occurrences only (the operator's active-alarm
/// view); `recent` counts open occurrences triggered within the window.
pub fn aggregate(
    snapshot: &OccurrenceSnapshot,
    recent_window: Duration,
    now: DateTime<Utc>,
) -> AlarmStatistics {
    let mut stats = AlarmStatistics {
        total: snapshot.len(),
        ..Default::default()
    };
    let recent_cutoff = now - recent_window;

    for occurrence in snapshot.iter() {
        match occurrence.state {
            AlarmState::Active => stats.by_state.active += 1,
            AlarmState::Acknowledged => stats.by_state.acknowledged += 1,
            AlarmState::Cleared => stats.by_state.cleared += 1,
        }

        if occurrence.is_open() {
            stats.open += 1;
            match occurrence.severity {
                Severity::Critical => stats.by_severity.critical += 1,
                Severity::High => stats.by_severity.high += 1,
                Severity::Medium => stats.by_severity.medium += 1,
                Severity::Low => stats.by_severity.low += 1,
            }
            if occurrence.triggered_at > recent_cutoff {
                stats.recent += 1;
            }
        }
    }

    stats
}
