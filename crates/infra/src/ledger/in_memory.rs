use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use stockledger_core::{ExpectedVersion, MutationId, PairKey};
use stockledger_inventory::{newest_first, Mutation, MutationFilter, MutationPatch, NewMutation, Page, PageRequest};

use super::{Committed, LedgerError, LedgerResult, MutationLedger, PairHistory};

#[derive(Debug, Default)]
struct State {
    last_id: u64,
    rows: BTreeMap<MutationId, Mutation>,
    revisions: HashMap<PairKey, u64>,
}

impl State {
    fn check(&self, pair: PairKey, expected: ExpectedVersion) -> LedgerResult<u64> {
        let current = self.revisions.get(&pair).copied().unwrap_or(0);
        if !expected.matches(current) {
            return Err(LedgerError::Concurrency(format!(
                "pair {pair}: expected {expected:?}, found {current}"
            )));
        }
        Ok(current)
    }

    fn bump(&mut self, pair: PairKey, current: u64) -> u64 {
        let next = current + 1;
        self.revisions.insert(pair, next);
        next
    }
}

/// In-memory mutation ledger.
///
/// Intended for tests/dev. Every write runs under one lock, so the revision
/// check and the write are atomic.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    state: RwLock<State>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> LedgerError {
        LedgerError::Storage("lock poisoned".to_string())
    }
}

#[async_trait]
impl MutationLedger for InMemoryLedger {
    async fn create(&self, new: NewMutation, expected: ExpectedVersion) -> LedgerResult<Committed> {
        let mut state = self.state.write().map_err(|_| Self::poisoned())?;
        let pair = new.pair();
        let current = state.check(pair, expected)?;

        state.last_id += 1;
        let mutation = new.into_mutation(MutationId::new(state.last_id), Utc::now());
        state.rows.insert(mutation.id_typed(), mutation.clone());
        let revision = state.bump(pair, current);

        Ok(Committed { mutation, revision })
    }

    async fn update(
        &self,
        id: MutationId,
        patch: MutationPatch,
        expected: ExpectedVersion,
    ) -> LedgerResult<Committed> {
        let mut state = self.state.write().map_err(|_| Self::poisoned())?;
        let existing = state.rows.get(&id).ok_or(LedgerError::NotFound(id))?;
        let pair = existing.pair();
        let next = patch.apply(existing, Utc::now());
        let current = state.check(pair, expected)?;

        state.rows.insert(id, next.clone());
        let revision = state.bump(pair, current);

        Ok(Committed {
            mutation: next,
            revision,
        })
    }

    async fn delete(&self, id: MutationId, expected: ExpectedVersion) -> LedgerResult<Committed> {
        let mut state = self.state.write().map_err(|_| Self::poisoned())?;
        let pair = state.rows.get(&id).ok_or(LedgerError::NotFound(id))?.pair();
        let current = state.check(pair, expected)?;

        let removed = state.rows.remove(&id).ok_or(LedgerError::NotFound(id))?;
        let revision = state.bump(pair, current);

        Ok(Committed {
            mutation: removed,
            revision,
        })
    }

    async fn get(&self, id: MutationId) -> LedgerResult<Option<Mutation>> {
        let state = self.state.read().map_err(|_| Self::poisoned())?;
        Ok(state.rows.get(&id).cloned())
    }

    async fn list(&self, filter: &MutationFilter, page: PageRequest) -> LedgerResult<Page<Mutation>> {
        let state = self.state.read().map_err(|_| Self::poisoned())?;
        let mut matched: Vec<&Mutation> = state.rows.values().filter(|m| filter.matches(m)).collect();
        matched.sort_by(|a, b| newest_first(a, b));

        let total = matched.len() as u64;
        let items = matched
            .into_iter()
            .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
            .take(page.per_page as usize)
            .cloned()
            .collect();

        Ok(Page::new(items, page, total))
    }

    async fn load_pair(&self, pair: PairKey) -> LedgerResult<PairHistory> {
        let state = self.state.read().map_err(|_| Self::poisoned())?;
        Ok(PairHistory {
            revision: state.revisions.get(&pair).copied().unwrap_or(0),
            mutations: state.rows.values().filter(|m| m.pair() == pair).cloned().collect(),
        })
    }

    async fn pairs(&self) -> LedgerResult<Vec<PairKey>> {
        let state = self.state.read().map_err(|_| Self::poisoned())?;
        let mut pairs: Vec<PairKey> = state.revisions.keys().copied().collect();
        pairs.sort();
        Ok(pairs)
    }
}
