use thiserror::Error;
use tracing::debug;

use stockledger_core::PairKey;
use stockledger_events::EventEnvelope;
use stockledger_inventory::MutationEvent;

use crate::ledger::PairHistory;
use crate::read_model::{ReadModelError, StockLevel, StockStore};

#[derive(Debug, Error)]
pub enum StockProjectionError {
    /// A revision was skipped; the pair must be rebuilt from the ledger.
    #[error("revision gap on pair {pair} (last={last}, found={found})")]
    Gap { pair: PairKey, last: u64, found: u64 },

    #[error(transparent)]
    Store(#[from] ReadModelError),
}

/// What `apply` did with an envelope.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Applied {
    Updated(StockLevel),
    /// At or behind the cached revision; ignored.
    Duplicate,
}

/// Per-pair stock cache fed by ledger facts.
///
/// The cached level carries the revision it reflects, which doubles as the
/// projection cursor: an envelope at or below it is a replay, one more than
/// it is applied, anything further ahead is a gap.
#[derive(Debug)]
pub struct StockLevelsProjection<S> {
    store: S,
}

impl<S> StockLevelsProjection<S>
where
    S: StockStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Cached stock of a pair; pairs never seen read as zero at revision 0.
    pub async fn get(&self, pair: PairKey) -> Result<StockLevel, StockProjectionError> {
        Ok(self.store.get(pair).await?.unwrap_or(StockLevel {
            pair,
            quantity: 0,
            revision: 0,
        }))
    }

    pub async fn list(&self) -> Result<Vec<StockLevel>, StockProjectionError> {
        Ok(self.store.list().await?)
    }

    pub async fn apply(&self, envelope: &EventEnvelope<MutationEvent>) -> Result<Applied, StockProjectionError> {
        let pair = envelope.pair();
        let found = envelope.revision();
        let current = self.get(pair).await?;

        if found <= current.revision {
            return Ok(Applied::Duplicate);
        }
        if found != current.revision + 1 {
            return Err(StockProjectionError::Gap {
                pair,
                last: current.revision,
                found,
            });
        }

        let next = StockLevel {
            pair,
            quantity: current.quantity + envelope.payload().stock_delta(),
            revision: found,
        };
        if !self.store.advance(next).await? {
            // A rebuild got there first.
            return Ok(Applied::Duplicate);
        }
        debug!(pair = %pair, revision = found, quantity = next.quantity, "stock level updated");
        Ok(Applied::Updated(next))
    }

    /// Overwrite the cached level with the ledger's view of the pair.
    /// Returns the level it replaced.
    pub async fn rebuild_pair(
        &self,
        pair: PairKey,
        history: &PairHistory,
    ) -> Result<Option<StockLevel>, StockProjectionError> {
        let previous = self.store.get(pair).await?;
        self.store
            .replace(StockLevel {
                pair,
                quantity: history.stock(),
                revision: history.revision,
            })
            .await?;
        Ok(previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    use stockledger_core::{LocationId, MutationId, ProductId};
    use stockledger_inventory::{Direction, NewMutation, Quantity};

    use crate::read_model::InMemoryStockStore;

    fn test_pair() -> PairKey {
        PairKey::new(ProductId::new(), LocationId::new())
    }

    fn recorded(pair: PairKey, id: u64, revision: u64, direction: Direction, q: i64) -> EventEnvelope<MutationEvent> {
        let mutation = NewMutation::new(pair.product_id, pair.location_id, direction, Quantity::new(q).unwrap())
            .into_mutation(MutationId::new(id), Utc::now());
        EventEnvelope::new(Uuid::now_v7(), pair, revision, None, MutationEvent::recorded(&mutation))
    }

    #[tokio::test]
    async fn applies_deltas_in_revision_order() {
        let projection = StockLevelsProjection::new(InMemoryStockStore::new());
        let pair = test_pair();

        projection.apply(&recorded(pair, 1, 1, Direction::In, 10)).await.unwrap();
        projection.apply(&recorded(pair, 2, 2, Direction::Out, 7)).await.unwrap();

        let level = projection.get(pair).await.unwrap();
        assert_eq!((level.quantity, level.revision), (3, 2));
    }

    #[tokio::test]
    async fn duplicate_delivery_is_ignored() {
        let projection = StockLevelsProjection::new(InMemoryStockStore::new());
        let pair = test_pair();
        let env = recorded(pair, 1, 1, Direction::In, 10);

        assert!(matches!(projection.apply(&env).await.unwrap(), Applied::Updated(_)));
        assert_eq!(projection.apply(&env).await.unwrap(), Applied::Duplicate);
        assert_eq!(projection.get(pair).await.unwrap().quantity, 10);
    }

    #[tokio::test]
    async fn skipped_revision_is_reported() {
        let projection = StockLevelsProjection::new(InMemoryStockStore::new());
        let pair = test_pair();

        match projection.apply(&recorded(pair, 5, 3, Direction::In, 1)).await {
            Err(StockProjectionError::Gap { last, found, .. }) => assert_eq!((last, found), (0, 3)),
            other => panic!("expected gap, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rebuild_replaces_drifted_level() {
        let projection = StockLevelsProjection::new(InMemoryStockStore::new());
        let pair = test_pair();
        projection
            .store()
            .replace(StockLevel {
                pair,
                quantity: 999,
                revision: 1,
            })
            .await
            .unwrap();

        let in_ten = NewMutation::new(pair.product_id, pair.location_id, Direction::In, Quantity::new(10).unwrap())
            .into_mutation(MutationId::new(1), Utc::now());
        let history = PairHistory {
            revision: 1,
            mutations: vec![in_ten],
        };

        let previous = projection.rebuild_pair(pair, &history).await.unwrap();
        assert_eq!(previous.map(|l| l.quantity), Some(999));
        assert_eq!(projection.get(pair).await.unwrap().quantity, 10);
    }
}
