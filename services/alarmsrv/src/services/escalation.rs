//! Alarm escalation sweep
//!
//! Periodically raises the escalation level of occurrences that stay
//! unacknowledged past the configured age. Escalation goes through the
//! backing store so reconciliation remains the single write path into the
//! local view.

use chrono::{Duration, Utc};
use gridmon_model::AlarmState;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

use crate::backend::AlarmBackend;
use crate::config::EscalationConfig;
use crate::store::OccurrenceStore;

/// Run one escalation pass; returns how many occurrences were escalated
pub async fn process_escalations(
    backend: &Arc<dyn AlarmBackend>,
    store: &OccurrenceStore,
    config: &EscalationConfig,
) -> usize {
    let cutoff = Utc::now() - Duration::minutes(config.after_minutes as i64);
    let snapshot = store.snapshot().await;

    let candidates: Vec<Uuid> = snapshot
        .iter()
        .filter(|o| {
            o.state == AlarmState::Active
                && o.triggered_at < cutoff
                && o.escalation_level < config.max_level
        })
        .map(|o| o.id)
        .collect();

    let mut escalated = 0;
    for id in candidates {
        match backend.escalate_occurrence(id).await {
            Ok(occurrence) => {
                info!(
                    "Escalated occurrence {} to level {}",
                    id, occurrence.escalation_level
                );
                store.upsert(occurrence).await;
                escalated += 1;
            },
            Err(e) => error!("Failed to escalate occurrence {}: {}", id, e),
        }
    }

    escalated
}

/// Spawn the periodic sweep; it stops when `token` is cancelled
pub fn start_escalation_sweep(
    backend: Arc<dyn AlarmBackend>,
    store: Arc<OccurrenceStore>,
    config: EscalationConfig,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(StdDuration::from_secs(config.interval_secs));
        info!(
            "Starting escalation sweep: after {} minutes, max level {}",
            config.after_minutes, config.max_level
        );

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = interval.tick() => {},
            }

            process_escalations(&backend, &store, &config).await;
        }

        info!("Escalation sweep stopped");
    })
}
