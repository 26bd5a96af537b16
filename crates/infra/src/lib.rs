//! Infrastructure layer: ledger stores, entity store adapters, the stock
//! service, the stock cache projection, configuration and workers.

pub mod activity;
pub mod catalog;
pub mod config;
pub mod errors;
pub mod ledger;
pub mod locks;
pub mod projections;
pub mod read_model;
pub mod retry;
pub mod schema;
pub mod service;
pub mod workers;

#[cfg(test)]
mod integration_tests;

pub use activity::{ActivityLog, ActivityRecord, ActivityRecorder, InMemoryActivityLog, TracingActivityLog};
pub use catalog::PostgresCatalog;
pub use config::AppConfig;
pub use ledger::{InMemoryLedger, LedgerError, MutationLedger, PairHistory, PostgresLedger};
pub use read_model::{InMemoryStockStore, PostgresStockStore, StockLevel, StockStore};
pub use service::{MutationQuery, MutationView, ReconcileReport, ServiceError, ServiceResult, StockService};
