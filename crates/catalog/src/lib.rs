//! Entity store for the records the stock ledger references.
//!
//! Products, locations and users are owned here; the ledger only ever asks
//! whether they exist and how to display them. The records carry field
//! validation and code uniqueness, nothing more.

pub mod fields;
pub mod in_memory;
pub mod location;
pub mod product;
pub mod store;
pub mod user;

pub use in_memory::InMemoryCatalog;
pub use location::{Location, LocationUpdate, NewLocation};
pub use product::{Category, NewProduct, Product, ProductUpdate, Unit};
pub use store::{CatalogError, CatalogResult, EntityStore, EntityWriter};
pub use user::{NewUser, User};
