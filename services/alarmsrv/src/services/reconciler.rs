//! Reconciliation of backing-store occurrence state into the local store
//!
//! Periodically fetches the current set of active occurrences and merges it
//! into the occurrence store. Merging is idempotent and order-insensitive per
//! id, so the push listener can feed the same path without coordination.

use async_trait::async_trait;
use chrono::Utc;
use gridmon_model::{AlarmOccurrence, AlarmStatistics};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::AlarmBackend;
use crate::error::Result;
use crate::stats;
use crate::store::{MergeSummary, OccurrenceStore};

/// Where reconciled occurrences come from: a poll on demand. Push delivery
/// feeds the same store merge, so both modes share one code path.
#[async_trait]
pub trait ReconciliationSource: Send + Sync {
    async fn fetch_active(&self) -> Result<Vec<AlarmOccurrence>>;
}

/// Poll source backed by the backing store's active set
pub struct BackendPollSource(pub Arc<dyn AlarmBackend>);

#[async_trait]
impl ReconciliationSource for BackendPollSource {
    async fn fetch_active(&self) -> Result<Vec<AlarmOccurrence>> {
        self.0.list_active_occurrences().await
    }
}

/// Shared cell holding the last aggregated statistics
pub type StatsCell = Arc<RwLock<AlarmStatistics>>;

/// Recompute statistics from the current snapshot into the shared cell
pub async fn refresh_statistics(
    store: &OccurrenceStore,
    cell: &StatsCell,
    recent_window: chrono::Duration,
) -> AlarmStatistics {
    let snapshot = store.snapshot().await;
    let computed = stats::aggregate(&snapshot, recent_window, Utc::now());
    *cell.write().await = computed.clone();
    computed
}

/// Periodic reconciliation loop
pub struct ReconciliationLoop {
    source: Arc<dyn ReconciliationSource>,
    store: Arc<OccurrenceStore>,
    stats_cell: StatsCell,
    interval: Duration,
    recent_window: chrono::Duration,
}

impl ReconciliationLoop {
    pub fn new(
        source: Arc<dyn ReconciliationSource>,
        store: Arc<OccurrenceStore>,
        stats_cell: StatsCell,
        interval: Duration,
        recent_window: chrono::Duration,
    ) -> Self {
        Self {
            source,
            store,
            stats_cell,
            interval,
            recent_window,
        }
    }

    /// Run one fetch-and-merge cycle
    pub async fn run_cycle(&self) -> Result<MergeSummary> {
        let batch = self.source.fetch_active().await?;
        let summary = self.store.merge_batch(batch).await;
        refresh_statistics(&self.store, &self.stats_cell, self.recent_window).await;
        Ok(summary)
    }

    /// Spawn the loop; it stops when `token` is cancelled
    pub fn spawn(self, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run(token).await;
        })
    }

    async fn run(&self, token: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        info!(
            "Starting reconciliation loop with {}s interval",
            self.interval.as_secs()
        );

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = interval.tick() => {},
            }

            // A fetch still in flight when the view is torn down is discarded
            // rather than applied
            let fetched = tokio::select! {
                _ = token.cancelled() => break,
                result = self.source.fetch_active() => result,
            };

            match fetched {
                Ok(batch) => {
                    let summary = self.store.merge_batch(batch).await;
                    if summary.inserted > 0 || summary.updated > 0 {
                        debug!(
                            "Reconciled occurrences: {} inserted, {} updated, {} unchanged",
                            summary.inserted, summary.updated, summary.unchanged
                        );
                    }
                    refresh_statistics(&self.store, &self.stats_cell, self.recent_window).await;
                },
                // A failed cycle neither clears nor corrupts the store
                Err(e) => warn!("Reconciliation fetch failed, retrying next cycle: {}", e),
            }
        }

        info!("Reconciliation loop stopped");
    }
}
