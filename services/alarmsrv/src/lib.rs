//! Alarm Service Library
//!
//! This module exports the public API for the alarm service: the backing
//! store abstraction, the occurrence store, the template applier, the
//! acknowledgment/clear coordinator, reconciliation, and the HTTP surface.

pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod services;
pub mod stats;
pub mod store;

use std::sync::Arc;

pub use config::AlarmConfig;
pub use error::{AlarmError, Result};

use backend::AlarmBackend;
use services::reconciler::refresh_statistics;
use services::{AckClearCoordinator, StatsCell, TemplateApplier};
use store::OccurrenceStore;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AlarmConfig>,
    pub backend: Arc<dyn AlarmBackend>,
    pub store: Arc<OccurrenceStore>,
    pub stats: StatsCell,
    pub applier: Arc<TemplateApplier>,
    pub coordinator: Arc<AckClearCoordinator>,
}

impl AppState {
    pub fn new(config: AlarmConfig, backend: Arc<dyn AlarmBackend>) -> Self {
        let store = Arc::new(OccurrenceStore::new());
        let applier = Arc::new(TemplateApplier::new(backend.clone()));
        let coordinator = Arc::new(AckClearCoordinator::new(backend.clone(), store.clone()));

        Self {
            config: Arc::new(config),
            backend,
            store,
            stats: StatsCell::default(),
            applier,
            coordinator,
        }
    }

    /// Recompute statistics from the current snapshot
    pub async fn refresh_stats(&self) {
        let window = chrono::Duration::seconds(self.config.stats.recent_window_secs as i64);
        refresh_statistics(&self.store, &self.stats, window).await;
    }
}
