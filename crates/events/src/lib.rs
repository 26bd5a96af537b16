//! Ledger facts and their distribution.
//!
//! The ledger is the source of truth; everything in this crate is about
//! telling downstream consumers (stock cache, activity log) what the ledger
//! committed, after it committed it.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
