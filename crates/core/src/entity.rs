//! Entity trait: identity + continuity across state changes.

use crate::error::{DomainError, EntityKind};

/// Records that keep their identity while their fields change.
///
/// Products, locations, users and ledger mutations are entities. `KIND` names
/// the record in `NotFound` errors.
pub trait Entity {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug + core::fmt::Display;

    const KIND: EntityKind;

    fn id(&self) -> &Self::Id;

    /// The error for a lookup of `id` that found nothing.
    fn not_found(id: &Self::Id) -> DomainError {
        DomainError::not_found(Self::KIND, id)
    }
}
