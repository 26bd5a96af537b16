use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use stockledger_catalog::{Location, Product, User};
use stockledger_core::{LocationId, MutationId, ProductId, UserId};
use stockledger_inventory::{Direction, Mutation};

/// A mutation resolved against the entity store for display.
///
/// Display fields are `None` when the referenced record can no longer be
/// found; the ids are always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationView {
    pub id: MutationId,
    pub product_id: ProductId,
    pub product_code: Option<String>,
    pub product_name: Option<String>,
    pub location_id: LocationId,
    pub location_code: Option<String>,
    pub location_name: Option<String>,
    pub actor_id: Option<UserId>,
    pub actor_name: Option<String>,
    pub direction: Direction,
    pub quantity: u32,
    pub note: String,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MutationView {
    pub fn resolve(
        mutation: &Mutation,
        product: Option<&Product>,
        location: Option<&Location>,
        actor: Option<&User>,
    ) -> Self {
        Self {
            id: mutation.id_typed(),
            product_id: mutation.product_id(),
            product_code: product.map(|p| p.code.clone()),
            product_name: product.map(|p| p.name.clone()),
            location_id: mutation.location_id(),
            location_code: location.map(|l| l.code.clone()),
            location_name: location.map(|l| l.name.clone()),
            actor_id: mutation.actor(),
            actor_name: actor.map(|u| u.name.clone()),
            direction: mutation.direction(),
            quantity: mutation.quantity().get(),
            note: mutation.note().to_string(),
            date: mutation.date(),
            created_at: mutation.created_at(),
            updated_at: mutation.updated_at(),
        }
    }

    pub fn signed_quantity(&self) -> i64 {
        self.direction.sign() * i64::from(self.quantity)
    }
}

/// Caller-facing list query. `search` matches product name or code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MutationQuery {
    pub search: Option<String>,
    pub product_id: Option<ProductId>,
    pub location_id: Option<LocationId>,
    pub direction: Option<Direction>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl MutationQuery {
    pub fn for_pair(product_id: ProductId, location_id: LocationId) -> Self {
        Self {
            product_id: Some(product_id),
            location_id: Some(location_id),
            ..Self::default()
        }
    }

    pub fn with_search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn with_page(mut self, page: u32, per_page: u32) -> Self {
        self.page = Some(page);
        self.per_page = Some(per_page);
        self
    }
}

/// One pair whose cached stock disagreed with the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockDrift {
    pub pair: stockledger_core::PairKey,
    /// `None` when the cache had no entry at all.
    pub cached: Option<i64>,
    pub actual: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub checked: usize,
    pub drift: Vec<StockDrift>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.drift.is_empty()
    }
}
