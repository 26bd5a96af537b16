//! Stock cache storage.
//!
//! The per-pair stock level is a disposable read model: derived from the
//! ledger, rebuildable at any time, never consulted by the guard.

pub mod postgres;
pub mod stock_store;

pub use postgres::PostgresStockStore;
pub use stock_store::{InMemoryStockStore, ReadModelError, StockLevel, StockStore};
