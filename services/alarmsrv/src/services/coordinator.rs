//! Acknowledgment and clear coordination
//!
//! Applies single or bulk state transitions to occurrences. The local store
//! provides a fast-path legality check, but the backing store is the sole
//! arbiter under concurrent operators: only its answer is committed locally,
//! and a rejection caused by another actor's earlier transition re-syncs the
//! local entry from the authoritative record.

use chrono::Utc;
use futures::future::join_all;
use gridmon_model::{AlarmOccurrence, AlarmState, TransitionMeta};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::backend::AlarmBackend;
use crate::error::{AlarmError, Result};
use crate::store::OccurrenceStore;

/// Per-id failure in a bulk transition
#[derive(Debug, Clone, Serialize)]
pub struct BulkFailure {
    pub id: Uuid,
    pub reason: String,
}

/// Result of a bulk acknowledge; partial success is reported as counts,
/// never collapsed into a single flag
#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkAckReport {
    pub succeeded: Vec<Uuid>,
    pub failed: Vec<BulkFailure>,
}

/// Coordinates occurrence transitions between the local store and the
/// backing store
pub struct AckClearCoordinator {
    backend: Arc<dyn AlarmBackend>,
    store: Arc<OccurrenceStore>,
}

impl AckClearCoordinator {
    pub fn new(backend: Arc<dyn AlarmBackend>, store: Arc<OccurrenceStore>) -> Self {
        Self { backend, store }
    }

    /// Acknowledge an occurrence
    pub async fn acknowledge(
        &self,
        id: Uuid,
        actor: &str,
        comment: Option<String>,
    ) -> Result<AlarmOccurrence> {
        self.transition(id, AlarmState::Acknowledged, actor, comment)
            .await
    }

    /// Clear an occurrence (terminal; retained but no longer active)
    pub async fn clear(
        &self,
        id: Uuid,
        actor: &str,
        comment: Option<String>,
    ) -> Result<AlarmOccurrence> {
        self.transition(id, AlarmState::Cleared, actor, comment)
            .await
    }

    /// Acknowledge a batch of occurrences, one independent transition per id.
    ///
    /// There is no atomicity across the batch: an already-cleared id fails
    /// with its own reason while the rest proceed.
    pub async fn bulk_acknowledge(
        &self,
        ids: Vec<Uuid>,
        actor: &str,
        comment: Option<String>,
    ) -> BulkAckReport {
        let outcomes = join_all(
            ids.iter()
                .map(|&id| self.acknowledge(id, actor, comment.clone())),
        )
        .await;

        let mut report = BulkAckReport::default();
        for (id, outcome) in ids.into_iter().zip(outcomes) {
            match outcome {
                Ok(_) => report.succeeded.push(id),
                Err(e) => report.failed.push(BulkFailure {
                    id,
                    reason: e.reason_code().to_string(),
                }),
            }
        }

        info!(
            "Bulk acknowledge: {} succeeded, {} failed",
            report.succeeded.len(),
            report.failed.len()
        );
        report
    }

    async fn transition(
        &self,
        id: Uuid,
        target: AlarmState,
        actor: &str,
        comment: Option<String>,
    ) -> Result<AlarmOccurrence> {
        // Fast-path validation against the local snapshot; a rejection here
        // never reaches the backing store
        self.store.check_transition(id, target).await?;

        let meta = TransitionMeta {
            actor: Some(actor.to_string()),
            comment,
            timestamp: Some(Utc::now()),
        };

        match self.backend_transition(id, target, meta).await {
            Ok(occurrence) => {
                // Commit the backing store's answer, not the caller's intent
                self.store.upsert(occurrence.clone()).await;
                info!("Occurrence {} {:?} by {}", id, target, actor);
                Ok(occurrence)
            },
            Err(AlarmError::InvalidStateTransition { from, to }) => {
                // The fast path passed but the arbiter rejected: another
                // operator moved the occurrence first. Re-sync local state
                // from the authoritative record.
                warn!(
                    "Occurrence {} moved concurrently ({:?} -> {:?} rejected), re-syncing",
                    id, from, to
                );
                match self.backend.get_occurrence(id).await? {
                    Some(current) => {
                        self.store.upsert(current.clone()).await;
                        Err(AlarmError::ConcurrentConflict {
                            current: Box::new(current),
                        })
                    },
                    None => Err(AlarmError::NotFound(format!("occurrence {}", id))),
                }
            },
            // Transport and other failures leave the local entry untouched
            Err(e) => Err(e),
        }
    }

    async fn backend_transition(
        &self,
        id: Uuid,
        target: AlarmState,
        meta: TransitionMeta,
    ) -> Result<AlarmOccurrence> {
        match target {
            AlarmState::Acknowledged => self.backend.acknowledge_occurrence(id, meta).await,
            AlarmState::Cleared => self.backend.clear_occurrence(id, meta).await,
            AlarmState::Active => Err(AlarmError::InvalidInput(
                "cannot transition an occurrence back to active".to_string(),
            )),
        }
    }
}
