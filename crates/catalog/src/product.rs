use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{CategoryId, DomainResult, Entity, EntityKind, ProductId, UnitId};

use crate::fields;

const CODE_MAX: usize = 50;
const NAME_MAX: usize = 255;
const DESCRIPTION_MAX: usize = 1000;

/// Product category lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

/// Unit of measure lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub name: String,
}

/// A stocked product.
///
/// `code` is unique across the catalog (case-insensitive).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub code: String,
    pub name: String,
    pub category_id: Option<CategoryId>,
    pub unit_id: Option<UnitId>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Product {
    type Id = ProductId;
    const KIND: EntityKind = EntityKind::Product;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Input for registering a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub code: String,
    pub name: String,
    pub category_id: Option<CategoryId>,
    pub unit_id: Option<UnitId>,
    pub description: Option<String>,
}

impl NewProduct {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            category_id: None,
            unit_id: None,
            description: None,
        }
    }

    /// Validate fields and build the record. Uniqueness is the store's job.
    pub fn into_product(self, id: ProductId, now: DateTime<Utc>) -> DomainResult<Product> {
        Ok(Product {
            id,
            code: fields::required("code", &self.code, CODE_MAX)?,
            name: fields::required("name", &self.name, NAME_MAX)?,
            category_id: self.category_id,
            unit_id: self.unit_id,
            description: fields::optional("description", self.description.as_deref(), DESCRIPTION_MAX)?,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Partial update of a product; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductUpdate {
    pub code: Option<String>,
    pub name: Option<String>,
    pub category_id: Option<CategoryId>,
    pub unit_id: Option<UnitId>,
    pub description: Option<String>,
}

impl ProductUpdate {
    /// Apply the update to a copy of `current`; identity and creation time are kept.
    pub fn apply(&self, current: &Product, now: DateTime<Utc>) -> DomainResult<Product> {
        let mut next = current.clone();
        if let Some(code) = &self.code {
            next.code = fields::required("code", code, CODE_MAX)?;
        }
        if let Some(name) = &self.name {
            next.name = fields::required("name", name, NAME_MAX)?;
        }
        if self.category_id.is_some() {
            next.category_id = self.category_id;
        }
        if self.unit_id.is_some() {
            next.unit_id = self.unit_id;
        }
        if let Some(description) = &self.description {
            next.description = fields::optional("description", Some(description), DESCRIPTION_MAX)?;
        }
        next.updated_at = now;
        Ok(next)
    }
}
