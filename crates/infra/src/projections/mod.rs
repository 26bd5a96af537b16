//! Projection implementations (read model builders).
//!
//! Projections consume committed ledger facts and maintain disposable read
//! models. They are:
//! - **Rebuildable**: reconstructed from the ledger at any time
//! - **Idempotent**: safe for at-least-once delivery

pub mod stock_levels;

pub use stock_levels::{Applied, StockLevelsProjection, StockProjectionError};
