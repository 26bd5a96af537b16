//! Entity store boundary.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use stockledger_core::{CategoryId, DomainError, LocationId, ProductId, UnitId, UserId};

use crate::location::{Location, LocationUpdate, NewLocation};
use crate::product::{Category, NewProduct, Product, ProductUpdate, Unit};
use crate::user::{NewUser, User};

pub type CatalogResult<T> = Result<T, CatalogError>;

#[derive(Debug, Error)]
pub enum CatalogError {
    /// Validation, missing reference or duplicate code.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// The backing store failed.
    #[error("catalog storage failure: {0}")]
    Storage(String),
}

/// Read side of the entity store, as the ledger engine sees it.
///
/// The engine only asks about existence (before recording a movement), display
/// data (when resolving a mutation for the caller) and product search (to turn
/// a free-text filter into a product-id set).
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn product(&self, id: ProductId) -> CatalogResult<Option<Product>>;

    async fn location(&self, id: LocationId) -> CatalogResult<Option<Location>>;

    async fn user(&self, id: UserId) -> CatalogResult<Option<User>>;

    /// Products whose name or code contains `text` (case-insensitive).
    async fn search_products(&self, text: &str) -> CatalogResult<Vec<ProductId>>;

    async fn product_exists(&self, id: ProductId) -> CatalogResult<bool> {
        Ok(self.product(id).await?.is_some())
    }

    async fn location_exists(&self, id: LocationId) -> CatalogResult<bool> {
        Ok(self.location(id).await?.is_some())
    }

    async fn user_exists(&self, id: UserId) -> CatalogResult<bool> {
        Ok(self.user(id).await?.is_some())
    }
}

/// Write side of the entity store.
///
/// Implementations enforce code uniqueness for products and locations and
/// reject references to unknown categories/units with `NotFound`.
#[async_trait]
pub trait EntityWriter: Send + Sync {
    async fn add_category(&self, name: &str) -> CatalogResult<Category>;

    async fn add_unit(&self, name: &str) -> CatalogResult<Unit>;

    async fn add_product(&self, input: NewProduct) -> CatalogResult<Product>;

    async fn update_product(&self, id: ProductId, update: ProductUpdate) -> CatalogResult<Product>;

    async fn add_location(&self, input: NewLocation) -> CatalogResult<Location>;

    async fn update_location(&self, id: LocationId, update: LocationUpdate) -> CatalogResult<Location>;

    async fn add_user(&self, input: NewUser) -> CatalogResult<User>;

    async fn category(&self, id: CategoryId) -> CatalogResult<Option<Category>>;

    async fn unit(&self, id: UnitId) -> CatalogResult<Option<Unit>>;
}

#[async_trait]
impl<S> EntityStore for Arc<S>
where
    S: EntityStore + ?Sized,
{
    async fn product(&self, id: ProductId) -> CatalogResult<Option<Product>> {
        (**self).product(id).await
    }

    async fn location(&self, id: LocationId) -> CatalogResult<Option<Location>> {
        (**self).location(id).await
    }

    async fn user(&self, id: UserId) -> CatalogResult<Option<User>> {
        (**self).user(id).await
    }

    async fn search_products(&self, text: &str) -> CatalogResult<Vec<ProductId>> {
        (**self).search_products(text).await
    }

    async fn product_exists(&self, id: ProductId) -> CatalogResult<bool> {
        (**self).product_exists(id).await
    }

    async fn location_exists(&self, id: LocationId) -> CatalogResult<bool> {
        (**self).location_exists(id).await
    }

    async fn user_exists(&self, id: UserId) -> CatalogResult<bool> {
        (**self).user_exists(id).await
    }
}
