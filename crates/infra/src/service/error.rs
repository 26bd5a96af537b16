use thiserror::Error;

use stockledger_catalog::CatalogError;
use stockledger_core::{DomainError, Entity, EntityKind, MutationId};
use stockledger_inventory::Mutation;

use crate::ledger::LedgerError;
use crate::projections::StockProjectionError;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Everything a caller of `StockService` can get back instead of a result.
///
/// `Validation`, `NotFound` and `InsufficientStock` are business outcomes and
/// are never retried. `Contention` means the pair kept moving under us for the
/// whole retry budget.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation failed on `{field}`: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: String },

    #[error("insufficient stock: available {available}, requested {requested}")]
    InsufficientStock { available: i64, requested: i64 },

    /// Duplicate unique key reported by the entity store.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("gave up after {attempts} attempts: pair kept changing")]
    Contention { attempts: u32 },

    #[error("storage failure: {0}")]
    Storage(String),
}

impl ServiceError {
    pub fn mutation_not_found(id: MutationId) -> Self {
        Mutation::not_found(&id).into()
    }

    /// Expected business outcome rather than a fault.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            ServiceError::Validation { .. }
                | ServiceError::NotFound { .. }
                | ServiceError::InsufficientStock { .. }
                | ServiceError::Conflict(_)
        )
    }
}

impl From<DomainError> for ServiceError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation { field, reason } => ServiceError::Validation { field, reason },
            DomainError::NotFound { kind, id } => ServiceError::NotFound { kind, id },
            DomainError::InsufficientStock {
                available,
                requested,
            } => ServiceError::InsufficientStock {
                available,
                requested,
            },
            DomainError::Conflict(msg) => ServiceError::Conflict(msg),
        }
    }
}

impl From<LedgerError> for ServiceError {
    fn from(value: LedgerError) -> Self {
        match value {
            LedgerError::NotFound(id) => ServiceError::mutation_not_found(id),
            // Only reached when the retry loop is bypassed.
            LedgerError::Concurrency(_) => ServiceError::Contention { attempts: 1 },
            LedgerError::Storage(msg) => ServiceError::Storage(msg),
        }
    }
}

impl From<CatalogError> for ServiceError {
    fn from(value: CatalogError) -> Self {
        match value {
            CatalogError::Domain(e) => e.into(),
            CatalogError::Storage(msg) => ServiceError::Storage(msg),
        }
    }
}

impl From<StockProjectionError> for ServiceError {
    fn from(value: StockProjectionError) -> Self {
        ServiceError::Storage(value.to_string())
    }
}
