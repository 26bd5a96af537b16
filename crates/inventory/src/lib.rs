//! Stock-mutation domain module.
//!
//! This crate contains the business rules of the ledger engine, implemented
//! purely as deterministic domain logic (no IO, no locking, no storage): the
//! mutation record, the stock projector and the consistency guard.

pub mod command;
pub mod event;
pub mod guard;
pub mod mutation;
pub mod projector;
pub mod query;

pub use command::{AmendMutation, RecordMutation};
pub use event::{MutationAmended, MutationEvent, MutationRecorded, MutationRemoved};
pub use mutation::{Direction, Mutation, MutationParts, MutationPatch, NewMutation, Quantity, NOTE_MAX_CHARS};
pub use projector::{project, signed_quantity};
pub use query::{newest_first, MutationFilter, Page, PageRequest};
