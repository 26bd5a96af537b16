use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;

use stockledger_core::{CategoryId, DomainError, Entity, EntityKind, LocationId, ProductId, UnitId, UserId};

use crate::fields;
use crate::location::{Location, LocationUpdate, NewLocation};
use crate::product::{Category, NewProduct, Product, ProductUpdate, Unit};
use crate::store::{CatalogError, CatalogResult, EntityStore, EntityWriter};
use crate::user::{NewUser, User};

#[derive(Debug, Default)]
struct Tables {
    categories: HashMap<CategoryId, Category>,
    units: HashMap<UnitId, Unit>,
    products: HashMap<ProductId, Product>,
    locations: HashMap<LocationId, Location>,
    users: HashMap<UserId, User>,
}

/// In-memory entity store for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    tables: RwLock<Tables>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> CatalogResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| CatalogError::Storage("lock poisoned".to_string()))
    }

    fn write(&self) -> CatalogResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| CatalogError::Storage("lock poisoned".to_string()))
    }
}

impl Tables {
    fn ensure_references(&self, category: Option<CategoryId>, unit: Option<UnitId>) -> CatalogResult<()> {
        if let Some(id) = category {
            if !self.categories.contains_key(&id) {
                return Err(DomainError::not_found(EntityKind::Category, id).into());
            }
        }
        if let Some(id) = unit {
            if !self.units.contains_key(&id) {
                return Err(DomainError::not_found(EntityKind::Unit, id).into());
            }
        }
        Ok(())
    }

    fn ensure_product_code_free(&self, code: &str, except: Option<ProductId>) -> CatalogResult<()> {
        let key = fields::code_key(code);
        let taken = self
            .products
            .values()
            .any(|p| Some(p.id) != except && fields::code_key(&p.code) == key);
        if taken {
            return Err(DomainError::conflict(format!("product code '{code}' is already in use")).into());
        }
        Ok(())
    }

    fn ensure_location_code_free(&self, code: &str, except: Option<LocationId>) -> CatalogResult<()> {
        let key = fields::code_key(code);
        let taken = self
            .locations
            .values()
            .any(|l| Some(l.id) != except && fields::code_key(&l.code) == key);
        if taken {
            return Err(DomainError::conflict(format!("location code '{code}' is already in use")).into());
        }
        Ok(())
    }
}

#[async_trait]
impl EntityStore for InMemoryCatalog {
    async fn product(&self, id: ProductId) -> CatalogResult<Option<Product>> {
        Ok(self.read()?.products.get(&id).cloned())
    }

    async fn location(&self, id: LocationId) -> CatalogResult<Option<Location>> {
        Ok(self.read()?.locations.get(&id).cloned())
    }

    async fn user(&self, id: UserId) -> CatalogResult<Option<User>> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn search_products(&self, text: &str) -> CatalogResult<Vec<ProductId>> {
        let needle = text.trim();
        let tables = self.read()?;
        let mut ids: Vec<ProductId> = tables
            .products
            .values()
            .filter(|p| fields::contains_ci(&p.name, needle) || fields::contains_ci(&p.code, needle))
            .map(|p| p.id)
            .collect();
        ids.sort();
        Ok(ids)
    }
}

#[async_trait]
impl EntityWriter for InMemoryCatalog {
    async fn add_category(&self, name: &str) -> CatalogResult<Category> {
        let category = Category {
            id: CategoryId::new(),
            name: fields::required("name", name, 255)?,
        };
        self.write()?.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn add_unit(&self, name: &str) -> CatalogResult<Unit> {
        let unit = Unit {
            id: UnitId::new(),
            name: fields::required("name", name, 255)?,
        };
        self.write()?.units.insert(unit.id, unit.clone());
        Ok(unit)
    }

    async fn add_product(&self, input: NewProduct) -> CatalogResult<Product> {
        let product = input.into_product(ProductId::new(), Utc::now())?;
        let mut tables = self.write()?;
        tables.ensure_references(product.category_id, product.unit_id)?;
        tables.ensure_product_code_free(&product.code, None)?;
        tables.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn update_product(&self, id: ProductId, update: ProductUpdate) -> CatalogResult<Product> {
        let mut tables = self.write()?;
        let current = tables
            .products
            .get(&id)
            .ok_or_else(|| Product::not_found(&id))?;
        let next = update.apply(current, Utc::now())?;
        tables.ensure_references(next.category_id, next.unit_id)?;
        tables.ensure_product_code_free(&next.code, Some(id))?;
        tables.products.insert(id, next.clone());
        Ok(next)
    }

    async fn add_location(&self, input: NewLocation) -> CatalogResult<Location> {
        let location = input.into_location(LocationId::new(), Utc::now())?;
        let mut tables = self.write()?;
        tables.ensure_location_code_free(&location.code, None)?;
        tables.locations.insert(location.id, location.clone());
        Ok(location)
    }

    async fn update_location(&self, id: LocationId, update: LocationUpdate) -> CatalogResult<Location> {
        let mut tables = self.write()?;
        let current = tables
            .locations
            .get(&id)
            .ok_or_else(|| Location::not_found(&id))?;
        let next = update.apply(current, Utc::now())?;
        tables.ensure_location_code_free(&next.code, Some(id))?;
        tables.locations.insert(id, next.clone());
        Ok(next)
    }

    async fn add_user(&self, input: NewUser) -> CatalogResult<User> {
        let user = input.into_user(UserId::new(), Utc::now())?;
        self.write()?.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn category(&self, id: CategoryId) -> CatalogResult<Option<Category>> {
        Ok(self.read()?.categories.get(&id).cloned())
    }

    async fn unit(&self, id: UnitId) -> CatalogResult<Option<Unit>> {
        Ok(self.read()?.units.get(&id).cloned())
    }
}
