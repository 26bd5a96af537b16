use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockledger_core::{PairKey, UserId};

/// Envelope for a ledger fact, carrying the stream metadata consumers need.
///
/// Notes:
/// - The stream is the (product, location) pair the fact belongs to.
/// - `revision` is the pair revision the ledger reached with this write; it
///   increases by one per write, so consumers can drop duplicates and detect
///   gaps.
/// - `actor` is whoever issued the command, passed explicitly by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    pair: PairKey,
    revision: u64,
    actor: Option<UserId>,
    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        pair: PairKey,
        revision: u64,
        actor: Option<UserId>,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            pair,
            revision,
            actor,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn pair(&self) -> PairKey {
        self.pair
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn actor(&self) -> Option<UserId> {
        self.actor
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }
}
