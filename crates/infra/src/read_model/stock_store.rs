use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockledger_core::PairKey;

/// Cached stock of one pair, as of a ledger revision.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub pair: PairKey,
    pub quantity: i64,
    pub revision: u64,
}

#[derive(Debug, Error)]
pub enum ReadModelError {
    #[error("read model storage failure: {0}")]
    Storage(String),
}

/// Key/value store for cached stock levels.
#[async_trait]
pub trait StockStore: Send + Sync {
    async fn get(&self, pair: PairKey) -> Result<Option<StockLevel>, ReadModelError>;

    /// Write `level` unless the stored one is at the same or a later revision.
    /// Returns whether anything was written.
    async fn advance(&self, level: StockLevel) -> Result<bool, ReadModelError>;

    /// Unconditional write (rebuild support).
    async fn replace(&self, level: StockLevel) -> Result<(), ReadModelError>;

    async fn list(&self) -> Result<Vec<StockLevel>, ReadModelError>;
}

#[async_trait]
impl<S> StockStore for Arc<S>
where
    S: StockStore + ?Sized,
{
    async fn get(&self, pair: PairKey) -> Result<Option<StockLevel>, ReadModelError> {
        (**self).get(pair).await
    }

    async fn advance(&self, level: StockLevel) -> Result<bool, ReadModelError> {
        (**self).advance(level).await
    }

    async fn replace(&self, level: StockLevel) -> Result<(), ReadModelError> {
        (**self).replace(level).await
    }

    async fn list(&self) -> Result<Vec<StockLevel>, ReadModelError> {
        (**self).list().await
    }
}

/// In-memory stock cache for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryStockStore {
    inner: RwLock<HashMap<PairKey, StockLevel>>,
}

impl InMemoryStockStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> ReadModelError {
        ReadModelError::Storage("lock poisoned".to_string())
    }
}

#[async_trait]
impl StockStore for InMemoryStockStore {
    async fn get(&self, pair: PairKey) -> Result<Option<StockLevel>, ReadModelError> {
        let map = self.inner.read().map_err(|_| Self::poisoned())?;
        Ok(map.get(&pair).copied())
    }

    async fn advance(&self, level: StockLevel) -> Result<bool, ReadModelError> {
        let mut map = self.inner.write().map_err(|_| Self::poisoned())?;
        match map.get(&level.pair) {
            Some(stored) if stored.revision >= level.revision => Ok(false),
            _ => {
                map.insert(level.pair, level);
                Ok(true)
            }
        }
    }

    async fn replace(&self, level: StockLevel) -> Result<(), ReadModelError> {
        let mut map = self.inner.write().map_err(|_| Self::poisoned())?;
        map.insert(level.pair, level);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<StockLevel>, ReadModelError> {
        let map = self.inner.read().map_err(|_| Self::poisoned())?;
        let mut levels: Vec<StockLevel> = map.values().copied().collect();
        levels.sort_by_key(|l| l.pair);
        Ok(levels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockledger_core::{LocationId, ProductId};

    fn level(pair: PairKey, quantity: i64, revision: u64) -> StockLevel {
        StockLevel {
            pair,
            quantity,
            revision,
        }
    }

    #[tokio::test]
    async fn advance_never_moves_backwards() {
        let store = InMemoryStockStore::new();
        let pair = PairKey::new(ProductId::new(), LocationId::new());

        assert!(store.advance(level(pair, 10, 1)).await.unwrap());
        assert!(store.advance(level(pair, 3, 2)).await.unwrap());
        assert!(!store.advance(level(pair, 10, 1)).await.unwrap());
        assert!(!store.advance(level(pair, 99, 2)).await.unwrap());

        assert_eq!(store.get(pair).await.unwrap(), Some(level(pair, 3, 2)));
    }

    #[tokio::test]
    async fn replace_overwrites_at_any_revision() {
        let store = InMemoryStockStore::new();
        let pair = PairKey::new(ProductId::new(), LocationId::new());
        store.advance(level(pair, 42, 5)).await.unwrap();

        store.replace(level(pair, 7, 5)).await.unwrap();
        assert_eq!(store.get(pair).await.unwrap().map(|l| l.quantity), Some(7));
        assert_eq!(store.list().await.unwrap().len(), 1);
    }
}
