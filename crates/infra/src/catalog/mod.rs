//! Entity store adapters. The in-memory store lives in `stockledger-catalog`.

pub mod postgres;

pub use postgres::PostgresCatalog;
