//! Client-visible occurrence store
//!
//! The one piece of shared mutable state in the service. Implemented as a
//! reducer over an immutable snapshot: every mutation clones the current map,
//! applies the change, and swaps in a fresh `Arc`, so readers (statistics,
//! API snapshots) always observe a consistent point-in-time view with no
//! partial writes.

use chrono::{DateTime, Utc};
use gridmon_model::{AlarmOccurrence, AlarmState, Severity, TransitionMeta};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::error::{AlarmError, Result};

/// Immutable point-in-time view of the known occurrences
#[derive(Debug, Default, Clone)]
pub struct OccurrenceSnapshot {
    occurrences: HashMap<Uuid, AlarmOccurrence>,
}

impl OccurrenceSnapshot {
    pub fn get(&self, id: &Uuid) -> Option<&AlarmOccurrence> {
        self.occurrences.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AlarmOccurrence> {
        self.occurrences.values()
    }

    pub fn len(&self) -> usize {
        self.occurrences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.occurrences.is_empty()
    }

    /// The open (active or acknowledged) occurrence for a rule, if any
    pub fn open_for(&self, rule_id: Uuid) -> Option<&AlarmOccurrence> {
        self.occurrences
            .values()
            .find(|o| o.rule_id == rule_id && o.is_open())
    }

    /// Occurrences ordered newest-first for presentation
    pub fn to_sorted_vec(&self) -> Vec<AlarmOccurrence> {
        let mut items: Vec<AlarmOccurrence> = self.occurrences.values().cloned().collect();
        items.sort_by(|a, b| b.triggered_at.cmp(&a.triggered_at));
        items
    }
}

/// Outcome of a single upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No entry existed for the id
    Inserted,
    /// An entry existed and the payload differed
    Updated,
    /// Re-delivery of an identical payload; nothing changed
    Unchanged,
}

/// Outcome of a trigger application
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerOutcome {
    /// First trigger of the rule; a new occurrence was created
    Created(AlarmOccurrence),
    /// The rule already had an open occurrence; its count was incremented
    Deduplicated(AlarmOccurrence),
}

/// Summary of a reconciliation merge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
}

/// Shared occurrence store
#[derive(Default)]
pub struct OccurrenceStore {
    snapshot: RwLock<Arc<OccurrenceSnapshot>>,
}

impl OccurrenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot; cheap to take and safe to hold across awaits
    pub async fn snapshot(&self) -> Arc<OccurrenceSnapshot> {
        self.snapshot.read().await.clone()
    }

    /// Insert or replace the entry for `occurrence.id`.
    ///
    /// Re-delivery of an identical payload is a no-op: idempotent and safe to
    /// call any number of times, in any order per id.
    pub async fn upsert(&self, occurrence: AlarmOccurrence) -> UpsertOutcome {
        let mut guard = self.snapshot.write().await;

        match guard.get(&occurrence.id) {
            Some(existing) if *existing == occurrence => UpsertOutcome::Unchanged,
            existing => {
                let outcome = if existing.is_some() {
                    UpsertOutcome::Updated
                } else {
                    UpsertOutcome::Inserted
                };
                let mut next = (**guard).clone();
                next.occurrences.insert(occurrence.id, occurrence);
                *guard = Arc::new(next);
                outcome
            },
        }
    }

    /// Merge a delivered batch under one write lock, so readers never observe
    /// a half-applied cycle
    pub async fn merge_batch(&self, batch: Vec<AlarmOccurrence>) -> MergeSummary {
        let mut guard = self.snapshot.write().await;
        let mut next = (**guard).clone();
        let mut summary = MergeSummary::default();

        for occurrence in batch {
            match next.occurrences.get(&occurrence.id) {
                Some(existing) if *existing == occurrence => summary.unchanged += 1,
                Some(_) => {
                    summary.updated += 1;
                    next.occurrences.insert(occurrence.id, occurrence);
                },
                None => {
                    summary.inserted += 1;
                    next.occurrences.insert(occurrence.id, occurrence);
                },
            }
        }

        if summary.inserted > 0 || summary.updated > 0 {
            *guard = Arc::new(next);
        }
        summary
    }

    /// The open occurrence for a rule, if one exists
    pub async fn open_occurrence_for(&self, rule_id: Uuid) -> Option<AlarmOccurrence> {
        self.snapshot.read().await.open_for(rule_id).cloned()
    }

    /// Apply a trigger event with dedup-while-open: while an occurrence for
    /// the rule is active or acknowledged, a new trigger increments its
    /// `occurrence_count` instead of creating a second entry.
    pub async fn apply_trigger(
        &self,
        rule_id: Uuid,
        severity: Severity,
        message: String,
        value: Value,
        triggered_at: DateTime<Utc>,
    ) -> TriggerOutcome {
        let mut guard = self.snapshot.write().await;
        let mut next = (**guard).clone();

        if let Some(open) = next
            .occurrences
            .values_mut()
            .find(|o| o.rule_id == rule_id && o.is_open())
        {
            open.record_retrigger(value, triggered_at);
            let updated = open.clone();
            *guard = Arc::new(next);
            debug!(
                "Trigger for rule {} deduplicated into {} (count {})",
                rule_id, updated.id, updated.occurrence_count
            );
            return TriggerOutcome::Deduplicated(updated);
        }

        let occurrence = AlarmOccurrence::new(rule_id, severity, message, value, triggered_at);
        next.occurrences.insert(occurrence.id, occurrence.clone());
        *guard = Arc::new(next);
        TriggerOutcome::Created(occurrence)
    }

    /// Transition an occurrence, enforcing the legal transition table.
    ///
    /// Illegal requests are rejected with `InvalidStateTransition` and leave
    /// the stored entry unmodified.
    pub async fn transition(
        &self,
        id: Uuid,
        target: AlarmState,
        meta: &TransitionMeta,
    ) -> Result<AlarmOccurrence> {
        let mut guard = self.snapshot.write().await;
        let current = guard
            .get(&id)
            .ok_or_else(|| AlarmError::NotFound(format!("occurrence {}", id)))?;

        let from = current.state;
        let mut updated = current.clone();
        if !updated.apply_transition(target, meta) {
            return Err(AlarmError::InvalidStateTransition { from, to: target });
        }

        let mut next = (**guard).clone();
        next.occurrences.insert(id, updated.clone());
        *guard = Arc::new(next);
        Ok(updated)
    }

    /// Fast-path legality check without committing anything
    pub async fn check_transition(&self, id: Uuid, target: AlarmState) -> Result<()> {
        let snapshot = self.snapshot.read().await;
        let current = snapshot
            .get(&id)
            .ok_or_else(|| AlarmError::NotFound(format!("occurrence {}", id)))?;
        if !current.state.can_transition_to(target) {
            return Err(AlarmError::InvalidStateTransition {
                from: current.state,
                to: target,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn occurrence(rule_id: Uuid) -> AlarmOccurrence {
        AlarmOccurrence::new(
            rule_id,
            Severity::High,
            "Voltage high".to_string(),
            json!(242.0),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let store = OccurrenceStore::new();
        let occ = occurrence(Uuid::new_v4());

        assert_eq!(store.upsert(occ.clone()).await, UpsertOutcome::Inserted);
        assert_eq!(store.upsert(occ.clone()).await, UpsertOutcome::Unchanged);
        assert_eq!(store.upsert(occ.clone()).await, UpsertOutcome::Unchanged);

        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get(&occ.id), Some(&occ));
    }

    #[tokio::test]
    async fn test_upsert_replaces_on_changed_payload() {
        let store = OccurrenceStore::new();
        let mut occ = occurrence(Uuid::new_v4());
        store.upsert(occ.clone()).await;

        occ.occurrence_count = 3;
        assert_eq!(store.upsert(occ.clone()).await, UpsertOutcome::Updated);
        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.get(&occ.id).unwrap().occurrence_count, 3);
        assert_eq!(snapshot.len(), 1);
    }

    #[tokio::test]
    async fn test_dedup_while_open() {
        let store = OccurrenceStore::new();
        let rule_id = Uuid::new_v4();

        let first = store
            .apply_trigger(
                rule_id,
                Severity::High,
                "Voltage high".to_string(),
                json!(242.0),
                Utc::now(),
            )
            .await;
        let created = match first {
            TriggerOutcome::Created(o) => o,
            other => panic!("expected Created, got {:?}", other),
        };

        let second = store
            .apply_trigger(
                rule_id,
                Severity::High,
                "Voltage high".to_string(),
                json!(245.0),
                Utc::now(),
            )
            .await;
        match second {
            TriggerOutcome::Deduplicated(o) => {
                assert_eq!(o.id, created.id);
                assert_eq!(o.occurrence_count, 2);
            },
            other => panic!("expected Deduplicated, got {:?}", other),
        }

        assert_eq!(store.snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn test_dedup_still_applies_when_acknowledged() {
        let store = OccurrenceStore::new();
        let rule_id = Uuid::new_v4();

        let created = match store
            .apply_trigger(
                rule_id,
                Severity::Medium,
                "msg".to_string(),
                json!(1),
                Utc::now(),
            )
            .await
        {
            TriggerOutcome::Created(o) => o,
            other => panic!("expected Created, got {:?}", other),
        };

        store
            .transition(
                created.id,
                AlarmState::Acknowledged,
                &TransitionMeta::default(),
            )
            .await
            .unwrap();

        match store
            .apply_trigger(
                rule_id,
                Severity::Medium,
                "msg".to_string(),
                json!(2),
                Utc::now(),
            )
            .await
        {
            TriggerOutcome::Deduplicated(o) => assert_eq!(o.occurrence_count, 2),
            other => panic!("expected Deduplicated, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_new_occurrence_after_clear() {
        let store = OccurrenceStore::new();
        let rule_id = Uuid::new_v4();

        let created = match store
            .apply_trigger(
                rule_id,
                Severity::Low,
                "msg".to_string(),
                json!(1),
                Utc::now(),
            )
            .await
        {
            TriggerOutcome::Created(o) => o,
            other => panic!("expected Created, got {:?}", other),
        };
        store
            .transition(created.id, AlarmState::Cleared, &TransitionMeta::default())
            .await
            .unwrap();

        match store
            .apply_trigger(
                rule_id,
                Severity::Low,
                "msg".to_string(),
                json!(2),
                Utc::now(),
            )
            .await
        {
            TriggerOutcome::Created(o) => assert_ne!(o.id, created.id),
            other => panic!("expected Created, got {:?}", other),
        }

        assert_eq!(store.snapshot().await.len(), 2);
    }

    #[tokio::test]
    async fn test_illegal_transition_leaves_entry_unmodified() {
        let store = OccurrenceStore::new();
        let occ = occurrence(Uuid::new_v4());
        store.upsert(occ.clone()).await;

        store
            .transition(occ.id, AlarmState::Cleared, &TransitionMeta::default())
            .await
            .unwrap();
        let before = store.snapshot().await.get(&occ.id).cloned().unwrap();

        let err = store
            .transition(occ.id, AlarmState::Active, &TransitionMeta::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AlarmError::InvalidStateTransition { .. }));

        let after = store.snapshot().await.get(&occ.id).cloned().unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_full_lifecycle_transitions() {
        let store = OccurrenceStore::new();
        let occ = occurrence(Uuid::new_v4());
        store.upsert(occ.clone()).await;

        let meta = TransitionMeta {
            actor: Some("operator1".to_string()),
            comment: Some("looking into it".to_string()),
            timestamp: None,
        };
        let acked = store
            .transition(occ.id, AlarmState::Acknowledged, &meta)
            .await
            .unwrap();
        assert_eq!(acked.state, AlarmState::Acknowledged);
        assert_eq!(acked.acknowledged_by.as_deref(), Some("operator1"));

        let cleared = store
            .transition(occ.id, AlarmState::Cleared, &TransitionMeta::default())
            .await
            .unwrap();
        assert_eq!(cleared.state, AlarmState::Cleared);

        // acknowledgment audit trail survives the clear
        let stored = store.snapshot().await.get(&occ.id).cloned().unwrap();
        assert_eq!(stored.acknowledged_by.as_deref(), Some("operator1"));
    }

    #[tokio::test]
    async fn test_snapshot_is_immutable_under_mutation() {
        let store = OccurrenceStore::new();
        let occ = occurrence(Uuid::new_v4());
        store.upsert(occ.clone()).await;

        let snapshot_before = store.snapshot().await;
        store
            .transition(occ.id, AlarmState::Cleared, &TransitionMeta::default())
            .await
            .unwrap();

        // the old snapshot still shows the old state
        assert_eq!(
            snapshot_before.get(&occ.id).unwrap().state,
            AlarmState::Active
        );
        assert_eq!(
            store.snapshot().await.get(&occ.id).unwrap().state,
            AlarmState::Cleared
        );
    }

    #[tokio::test]
    async fn test_merge_batch_summary() {
        let store = OccurrenceStore::new();
        let a = occurrence(Uuid::new_v4());
        let b = occurrence(Uuid::new_v4());
        store.upsert(a.clone()).await;

        let mut a_updated = a.clone();
        a_updated.occurrence_count = 2;

        let summary = store.merge_batch(vec![a_updated.clone(), b.clone()]).await;
        assert_eq!(summary.inserted, 1);
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.unchanged, 0);
        assert_eq!(store.snapshot().await.len(), 2);

        // replaying the same batch is a no-op
        let summary = store.merge_batch(vec![a_updated, b]).await;
        assert_eq!(summary.inserted, 0);
        assert_eq!(summary.updated, 0);
        assert_eq!(summary.unchanged, 2);
    }
}
