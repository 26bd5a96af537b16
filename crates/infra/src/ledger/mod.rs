//! Mutation ledger boundary.
//!
//! The ledger is the source of truth for stock. It stores mutation records and
//! versions every (product, location) pair: each accepted write to a pair
//! bumps that pair's revision by one.
//!
//! ## Write semantics
//!
//! `create`, `update` and `delete` take the pair revision the caller based its
//! decision on. Implementations compare it to the current revision and write
//! atomically with the comparison; a mismatch is `LedgerError::Concurrency`
//! and nothing is written.
//!
//! The ledger does not look at stock. Keeping stock non-negative is the
//! service's job, done between `load_pair` and the write.

pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use stockledger_core::{ExpectedVersion, MutationId, PairKey};
use stockledger_inventory::{project, Mutation, MutationFilter, MutationPatch, NewMutation, Page, PageRequest};

pub use in_memory::InMemoryLedger;
pub use postgres::PostgresLedger;

pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("mutation {0} not found")]
    NotFound(MutationId),

    #[error("ledger storage failure: {0}")]
    Storage(String),
}

/// All mutations of one pair, read at one revision.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairHistory {
    pub revision: u64,
    pub mutations: Vec<Mutation>,
}

impl PairHistory {
    pub fn stock(&self) -> i64 {
        project(&self.mutations, None)
    }

    pub fn stock_excluding(&self, id: MutationId) -> i64 {
        project(&self.mutations, Some(id))
    }

    pub fn find(&self, id: MutationId) -> Option<&Mutation> {
        self.mutations.iter().find(|m| m.id_typed() == id)
    }

    pub fn expected(&self) -> ExpectedVersion {
        ExpectedVersion::Exact(self.revision)
    }
}

/// An accepted ledger write and the pair revision it produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed {
    pub mutation: Mutation,
    pub revision: u64,
}

#[async_trait]
pub trait MutationLedger: Send + Sync {
    /// Assign id and timestamps, persist. No stock check.
    async fn create(&self, new: NewMutation, expected: ExpectedVersion) -> LedgerResult<Committed>;

    /// Apply quantity/note/date. `expected` refers to the mutation's pair.
    async fn update(
        &self,
        id: MutationId,
        patch: MutationPatch,
        expected: ExpectedVersion,
    ) -> LedgerResult<Committed>;

    /// Remove the record and hand it back.
    async fn delete(&self, id: MutationId, expected: ExpectedVersion) -> LedgerResult<Committed>;

    async fn get(&self, id: MutationId) -> LedgerResult<Option<Mutation>>;

    /// Newest first, ties broken by id.
    async fn list(&self, filter: &MutationFilter, page: PageRequest) -> LedgerResult<Page<Mutation>>;

    async fn load_pair(&self, pair: PairKey) -> LedgerResult<PairHistory>;

    /// Every pair that has ever been written.
    async fn pairs(&self) -> LedgerResult<Vec<PairKey>>;
}

#[async_trait]
impl<L> MutationLedger for Arc<L>
where
    L: MutationLedger + ?Sized,
{
    async fn create(&self, new: NewMutation, expected: ExpectedVersion) -> LedgerResult<Committed> {
        (**self).create(new, expected).await
    }

    async fn update(
        &self,
        id: MutationId,
        patch: MutationPatch,
        expected: ExpectedVersion,
    ) -> LedgerResult<Committed> {
        (**self).update(id, patch, expected).await
    }

    async fn delete(&self, id: MutationId, expected: ExpectedVersion) -> LedgerResult<Committed> {
        (**self).delete(id, expected).await
    }

    async fn get(&self, id: MutationId) -> LedgerResult<Option<Mutation>> {
        (**self).get(id).await
    }

    async fn list(&self, filter: &MutationFilter, page: PageRequest) -> LedgerResult<Page<Mutation>> {
        (**self).list(filter, page).await
    }

    async fn load_pair(&self, pair: PairKey) -> LedgerResult<PairHistory> {
        (**self).load_pair(pair).await
    }

    async fn pairs(&self) -> LedgerResult<Vec<PairKey>> {
        (**self).pairs().await
    }
}
