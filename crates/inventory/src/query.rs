use core::cmp::Ordering;

use serde::{Deserialize, Serialize};

use stockledger_core::{LocationId, ProductId};

use crate::mutation::{Direction, Mutation};

/// Ledger list filter. Empty filter matches everything.
///
/// Free-text product search is resolved into `product_ids` before it reaches
/// the ledger; `Some(vec![])` therefore means "no product matched".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationFilter {
    pub product_ids: Option<Vec<ProductId>>,
    pub location_id: Option<LocationId>,
    pub direction: Option<Direction>,
}

impl MutationFilter {
    pub fn matches(&self, mutation: &Mutation) -> bool {
        if let Some(ids) = &self.product_ids {
            if !ids.contains(&mutation.product_id()) {
                return false;
            }
        }
        if let Some(location_id) = self.location_id {
            if mutation.location_id() != location_id {
                return false;
            }
        }
        if let Some(direction) = self.direction {
            if mutation.direction() != direction {
                return false;
            }
        }
        true
    }
}

/// Listing order: newest first, ties broken by id (newest first).
pub fn newest_first(a: &Mutation, b: &Mutation) -> Ordering {
    b.created_at()
        .cmp(&a.created_at())
        .then_with(|| b.id_typed().cmp(&a.id_typed()))
}

/// 1-based page request.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

impl PageRequest {
    pub const DEFAULT_PER_PAGE: u32 = 10;

    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.max(1),
        }
    }

    /// Clamp the page size into `1..=max`.
    pub fn clamped(self, max: u32) -> Self {
        Self::new(self.page, self.per_page.min(max.max(1)))
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.per_page)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.per_page)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, Self::DEFAULT_PER_PAGE)
    }
}

/// One page of results plus the total match count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total: u64) -> Self {
        Self {
            items,
            page: request.page,
            per_page: request.per_page,
            total,
        }
    }

    pub fn total_pages(&self) -> u64 {
        self.total.div_ceil(u64::from(self.per_page.max(1)))
    }
}
