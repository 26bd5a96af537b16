//! Per-pair write serialization.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use stockledger_core::PairKey;

/// Registry of async mutexes keyed by (product, location).
///
/// Holding the guard for a pair serializes [project → check → write] for that
/// pair inside this process. Different pairs never contend. Entries nobody
/// holds are pruned as new pairs come in.
#[derive(Debug, Default)]
pub struct PairLocks {
    slots: Mutex<HashMap<PairKey, Arc<AsyncMutex<()>>>>,
}

/// Guard for one pair; the pair unlocks on drop.
#[derive(Debug)]
pub struct PairGuard {
    pair: PairKey,
    _guard: OwnedMutexGuard<()>,
}

impl PairGuard {
    pub fn pair(&self) -> PairKey {
        self.pair
    }
}

impl PairLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, pair: PairKey) -> PairGuard {
        let slot = self.slot(pair);
        PairGuard {
            pair,
            _guard: slot.lock_owned().await,
        }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.slots.lock().map(|s| s.len()).unwrap_or(0)
    }

    fn slot(&self, pair: PairKey) -> Arc<AsyncMutex<()>> {
        // A poisoned registry only means another thread panicked while
        // inserting; the map itself is still usable.
        let mut slots = match self.slots.lock() {
            Ok(s) => s,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(slot) = slots.get(&pair) {
            return slot.clone();
        }
        // Only the registry holds a reference to an idle slot.
        slots.retain(|_, slot| Arc::strong_count(slot) > 1);
        let slot = Arc::new(AsyncMutex::new(()));
        slots.insert(pair, slot.clone());
        slot
    }
}
