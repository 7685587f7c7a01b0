//! Background services and orchestration logic

pub mod applier;
pub mod coordinator;
pub mod escalation;
pub mod listener;
pub mod reconciler;

pub use applier::{ApplyFailure, ApplyReport, TemplateApplier};
pub use coordinator::{AckClearCoordinator, BulkAckReport, BulkFailure};
pub use reconciler::{BackendPollSource, ReconciliationLoop, ReconciliationSource, StatsCell};
