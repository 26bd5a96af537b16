//! Activity records for committed ledger changes.
//!
//! The stock service never writes audit entries itself. An `ActivityRecorder`
//! turns each published ledger fact into an `ActivityRecord` and hands it to
//! whatever `ActivityLog` the process is wired with.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use stockledger_core::{MutationId, PairKey, UserId};
use stockledger_events::{Event, EventEnvelope};
use stockledger_inventory::MutationEvent;

pub const MUTATION_MODULE: &str = "mutation";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub actor: Option<UserId>,
    /// "create", "update" or "delete".
    pub action: String,
    pub module: String,
    pub occurred_at: DateTime<Utc>,
    pub subject: MutationId,
    pub pair: PairKey,
}

impl ActivityRecord {
    pub fn from_envelope(envelope: &EventEnvelope<MutationEvent>) -> Self {
        let event = envelope.payload();
        Self {
            actor: envelope.actor(),
            action: event.action().to_string(),
            module: MUTATION_MODULE.to_string(),
            occurred_at: event.occurred_at(),
            subject: event.mutation_id(),
            pair: envelope.pair(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ActivityError {
    #[error("activity log unavailable: {0}")]
    Unavailable(String),
}

/// Sink for activity records.
pub trait ActivityLog: Send + Sync {
    fn append(&self, record: ActivityRecord) -> Result<(), ActivityError>;
}

impl<L> ActivityLog for Arc<L>
where
    L: ActivityLog + ?Sized,
{
    fn append(&self, record: ActivityRecord) -> Result<(), ActivityError> {
        (**self).append(record)
    }
}

/// Keeps records in memory (tests/dev).
#[derive(Debug, Default)]
pub struct InMemoryActivityLog {
    records: RwLock<Vec<ActivityRecord>>,
}

impl InMemoryActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ActivityRecord> {
        self.records.read().map(|r| r.clone()).unwrap_or_default()
    }
}

impl ActivityLog for InMemoryActivityLog {
    fn append(&self, record: ActivityRecord) -> Result<(), ActivityError> {
        self.records
            .write()
            .map_err(|_| ActivityError::Unavailable("lock poisoned".to_string()))?
            .push(record);
        Ok(())
    }
}

/// Emits each record as a structured `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingActivityLog;

impl ActivityLog for TracingActivityLog {
    fn append(&self, record: ActivityRecord) -> Result<(), ActivityError> {
        info!(
            target: "stockledger::activity",
            actor = ?record.actor,
            action = %record.action,
            module = %record.module,
            subject = %record.subject,
            pair = %record.pair,
            occurred_at = %record.occurred_at,
            "activity"
        );
        Ok(())
    }
}

/// Bus consumer that forwards ledger facts to an activity log.
#[derive(Debug)]
pub struct ActivityRecorder<L> {
    log: L,
}

impl<L> ActivityRecorder<L>
where
    L: ActivityLog,
{
    pub fn new(log: L) -> Self {
        Self { log }
    }

    pub fn handle(&self, envelope: &EventEnvelope<MutationEvent>) -> Result<(), ActivityError> {
        self.log.append(ActivityRecord::from_envelope(envelope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    use stockledger_core::{LocationId, ProductId};
    use stockledger_inventory::{Direction, NewMutation, Quantity};

    #[test]
    fn recorder_maps_facts_to_records() {
        let log = Arc::new(InMemoryActivityLog::new());
        let recorder = ActivityRecorder::new(log.clone());
        let actor = UserId::new();
        let pair = PairKey::new(ProductId::new(), LocationId::new());
        let mutation = NewMutation::new(pair.product_id, pair.location_id, Direction::In, Quantity::new(4).unwrap())
            .into_mutation(MutationId::new(8), Utc::now());

        let created = EventEnvelope::new(Uuid::now_v7(), pair, 1, Some(actor), MutationEvent::recorded(&mutation));
        let removed = EventEnvelope::new(
            Uuid::now_v7(),
            pair,
            2,
            None,
            MutationEvent::removed(&mutation, Utc::now()),
        );
        recorder.handle(&created).unwrap();
        recorder.handle(&removed).unwrap();

        let records = log.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].actor, Some(actor));
        assert_eq!(records[0].action, "create");
        assert_eq!(records[0].module, "mutation");
        assert_eq!(records[0].subject, MutationId::new(8));
        assert_eq!(records[1].action, "delete");
        assert_eq!(records[1].actor, None);
    }

    #[test]
    fn tracing_sink_accepts_records() {
        let pair = PairKey::new(ProductId::new(), LocationId::new());
        let record = ActivityRecord {
            actor: None,
            action: "update".to_string(),
            module: MUTATION_MODULE.to_string(),
            occurred_at: Utc::now(),
            subject: MutationId::new(1),
            pair,
        };
        assert!(TracingActivityLog.append(record).is_ok());
    }
}
