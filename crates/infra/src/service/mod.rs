//! Stock service: the guarded write path and the read path over the ledger.
//!
//! ## Write path
//!
//! ```text
//! command → validate fields → references exist → lock pair
//!   ↓
//! load pair history (revision r) → project stock → guard decision
//!   ↓
//! ledger write with ExpectedVersion::Exact(r)
//!   ├─ Concurrency → back off, reload, decide again (bounded)
//!   └─ committed   → publish fact (revision r + 1, best effort) → unlock
//! ```
//!
//! The pair lock serializes writers inside this process; the revision check
//! catches writers in other processes sharing the same database. Facts are
//! published while the pair is still locked, so consumers see each pair's
//! revisions in order.

mod error;
mod view;

pub use error::{ServiceError, ServiceResult};
pub use view::{MutationQuery, MutationView, ReconcileReport, StockDrift};

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use tracing::{field, info, instrument, warn, Span};
use uuid::Uuid;

use stockledger_catalog::{EntityStore, Location, Product, User};
use stockledger_core::{DomainError, Entity, LocationId, MutationId, PairKey, ProductId, UserId};
use stockledger_events::{EventBus, EventEnvelope};
use stockledger_inventory::guard::{check_create, check_delete, check_update};
use stockledger_inventory::{AmendMutation, Mutation, MutationEvent, MutationFilter, Page, PageRequest, RecordMutation};

use crate::config::LedgerSettings;
use crate::ledger::{LedgerError, MutationLedger};
use crate::locks::PairLocks;
use crate::projections::StockLevelsProjection;
use crate::read_model::{StockLevel, StockStore};
use crate::retry::RetryPolicy;

/// Entry point for callers of the ledger engine.
///
/// - `L`: mutation ledger (source of truth)
/// - `C`: entity store (existence checks, display data, product search)
/// - `B`: bus the committed facts are published on
/// - `S`: backing store of the per-pair stock cache
#[derive(Debug)]
pub struct StockService<L, C, B, S> {
    ledger: L,
    catalog: C,
    bus: B,
    cache: Arc<StockLevelsProjection<S>>,
    locks: PairLocks,
    retry: RetryPolicy,
    settings: LedgerSettings,
}

impl<L, C, B, S> StockService<L, C, B, S> {
    pub fn new(ledger: L, catalog: C, bus: B, cache: Arc<StockLevelsProjection<S>>) -> Self {
        Self {
            ledger,
            catalog,
            bus,
            cache,
            locks: PairLocks::new(),
            retry: RetryPolicy::default(),
            settings: LedgerSettings::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_ledger_settings(mut self, settings: LedgerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn cache(&self) -> &Arc<StockLevelsProjection<S>> {
        &self.cache
    }
}

impl<L, C, B, S> StockService<L, C, B, S>
where
    L: MutationLedger,
    C: EntityStore,
    B: EventBus<EventEnvelope<MutationEvent>>,
    S: StockStore,
{
    /// Record a new movement.
    #[instrument(skip_all, fields(actor = ?actor, pair = field::Empty, mutation_id = field::Empty))]
    pub async fn record(&self, actor: Option<UserId>, command: RecordMutation) -> ServiceResult<MutationView> {
        let new = command.validate(actor).map_err(|e| rejected("record", e))?;
        let pair = new.pair();
        Span::current().record("pair", field::display(pair));

        let product = self.require_product(pair.product_id).await?;
        let location = self.require_location(pair.location_id).await?;
        let user = self.require_actor(actor).await?;

        let _pair_guard = self.locks.lock(pair).await;
        let mut attempt = 1;
        let committed = loop {
            let history = self.ledger.load_pair(pair).await?;
            check_create(new.direction, new.quantity, history.stock()).map_err(|e| rejected("record", e))?;

            match self.ledger.create(new.clone(), history.expected()).await {
                Ok(committed) => break committed,
                Err(LedgerError::Concurrency(reason)) => {
                    self.back_off("record", attempt, &reason).await?;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        };

        let mutation = committed.mutation;
        Span::current().record("mutation_id", field::display(mutation.id_typed()));
        info!(
            direction = %mutation.direction(),
            quantity = mutation.quantity().get(),
            revision = committed.revision,
            "mutation recorded"
        );
        self.publish(pair, committed.revision, actor, MutationEvent::recorded(&mutation));

        Ok(MutationView::resolve(&mutation, Some(&product), Some(&location), user.as_ref()))
    }

    /// Change quantity, note or date of an existing movement.
    ///
    /// The mutation keeps its original actor; `actor` is who made the change
    /// and travels with the published fact.
    #[instrument(skip_all, fields(actor = ?actor, mutation_id = %id, pair = field::Empty))]
    pub async fn amend(
        &self,
        actor: Option<UserId>,
        id: MutationId,
        command: AmendMutation,
    ) -> ServiceResult<MutationView> {
        let patch = command.validate().map_err(|e| rejected("amend", e))?;
        self.require_actor(actor).await?;
        let pair = self.pair_of(id).await?;
        Span::current().record("pair", field::display(pair));

        let _pair_guard = self.locks.lock(pair).await;
        let mut attempt = 1;
        let (before, committed) = loop {
            let history = self.ledger.load_pair(pair).await?;
            let existing = history.find(id).cloned().ok_or_else(|| ServiceError::mutation_not_found(id))?;
            check_update(&existing, patch.resulting_quantity(&existing), history.stock_excluding(id))
                .map_err(|e| rejected("amend", e))?;

            match self.ledger.update(id, patch.clone(), history.expected()).await {
                Ok(committed) => break (existing, committed),
                Err(LedgerError::Concurrency(reason)) => {
                    self.back_off("amend", attempt, &reason).await?;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        };

        let mutation = committed.mutation;
        info!(
            previous_quantity = before.quantity().get(),
            quantity = mutation.quantity().get(),
            revision = committed.revision,
            "mutation amended"
        );
        self.publish(pair, committed.revision, actor, MutationEvent::amended(&before, &mutation));

        self.resolve(&mutation).await
    }

    /// Delete a movement. Returns the removed record.
    #[instrument(skip_all, fields(actor = ?actor, mutation_id = %id, pair = field::Empty))]
    pub async fn remove(&self, actor: Option<UserId>, id: MutationId) -> ServiceResult<MutationView> {
        self.require_actor(actor).await?;
        let pair = self.pair_of(id).await?;
        Span::current().record("pair", field::display(pair));

        let _pair_guard = self.locks.lock(pair).await;
        let mut attempt = 1;
        let committed = loop {
            let history = self.ledger.load_pair(pair).await?;
            let existing = history.find(id).ok_or_else(|| ServiceError::mutation_not_found(id))?;
            check_delete(existing, history.stock_excluding(id)).map_err(|e| rejected("remove", e))?;

            match self.ledger.delete(id, history.expected()).await {
                Ok(committed) => break committed,
                Err(LedgerError::Concurrency(reason)) => {
                    self.back_off("remove", attempt, &reason).await?;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        };

        let mutation = committed.mutation;
        info!(revision = committed.revision, "mutation removed");
        self.publish(pair, committed.revision, actor, MutationEvent::removed(&mutation, Utc::now()));

        self.resolve(&mutation).await
    }

    pub async fn get(&self, id: MutationId) -> ServiceResult<MutationView> {
        let mutation = self.ledger.get(id).await?.ok_or_else(|| ServiceError::mutation_not_found(id))?;
        self.resolve(&mutation).await
    }

    /// Filtered, paginated listing, newest first.
    #[instrument(skip_all, fields(total = field::Empty))]
    pub async fn list(&self, query: MutationQuery) -> ServiceResult<Page<MutationView>> {
        let search = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let product_ids = match search {
            Some(text) => {
                let mut ids = self.catalog.search_products(text).await?;
                if let Some(product_id) = query.product_id {
                    ids.retain(|id| *id == product_id);
                }
                Some(ids)
            }
            None => query.product_id.map(|id| vec![id]),
        };
        let filter = MutationFilter {
            product_ids,
            location_id: query.location_id,
            direction: query.direction,
        };
        let request = PageRequest::new(
            query.page.unwrap_or(1),
            query.per_page.unwrap_or(self.settings.default_page_size),
        )
        .clamped(self.settings.max_page_size);

        let page = self.ledger.list(&filter, request).await?;
        Span::current().record("total", page.total);

        let views = self.resolve_all(&page.items).await?;
        Ok(Page {
            items: views,
            page: page.page,
            per_page: page.per_page,
            total: page.total,
        })
    }

    /// Stock of a pair, projected from the ledger.
    pub async fn current_stock(&self, product_id: ProductId, location_id: LocationId) -> ServiceResult<i64> {
        Ok(self.ledger.load_pair(PairKey::new(product_id, location_id)).await?.stock())
    }

    /// Stock of a pair as the cache currently has it.
    pub async fn cached_stock(&self, product_id: ProductId, location_id: LocationId) -> ServiceResult<StockLevel> {
        Ok(self.cache.get(PairKey::new(product_id, location_id)).await?)
    }

    /// Recompute the cached stock of a pair from the ledger.
    pub async fn rebuild_stock(&self, product_id: ProductId, location_id: LocationId) -> ServiceResult<StockLevel> {
        let (_, level) = self.rebuild_pair(PairKey::new(product_id, location_id)).await?;
        Ok(level)
    }

    /// Rebuild one pair; returns the cached level it replaced and the new one.
    #[instrument(skip_all, fields(pair = %pair))]
    pub async fn rebuild_pair(&self, pair: PairKey) -> ServiceResult<(Option<StockLevel>, StockLevel)> {
        let _pair_guard = self.locks.lock(pair).await;
        let history = self.ledger.load_pair(pair).await?;
        let previous = self.cache.rebuild_pair(pair, &history).await?;
        let level = StockLevel {
            pair,
            quantity: history.stock(),
            revision: history.revision,
        };
        if previous.map(|p| p.quantity) != Some(level.quantity) {
            info!(
                cached = ?previous.map(|p| p.quantity),
                actual = level.quantity,
                revision = level.revision,
                "stock cache rebuilt"
            );
        }
        Ok((previous, level))
    }

    /// Rebuild every known pair and report where the cache had drifted.
    #[instrument(skip(self))]
    pub async fn reconcile(&self) -> ServiceResult<ReconcileReport> {
        let mut pairs: BTreeSet<PairKey> = self.ledger.pairs().await?.into_iter().collect();
        pairs.extend(self.cache.list().await?.into_iter().map(|level| level.pair));

        let mut report = ReconcileReport::default();
        for pair in pairs {
            let (previous, level) = self.rebuild_pair(pair).await?;
            report.checked += 1;

            let cached = previous.map(|p| p.quantity);
            let clean = cached == Some(level.quantity) || (cached.is_none() && level.quantity == 0);
            if !clean {
                warn!(pair = %pair, cached = ?cached, actual = level.quantity, "stock cache drift");
                report.drift.push(StockDrift {
                    pair,
                    cached,
                    actual: level.quantity,
                });
            }
        }

        info!(checked = report.checked, drifted = report.drift.len(), "stock cache reconciled");
        Ok(report)
    }

    async fn pair_of(&self, id: MutationId) -> ServiceResult<PairKey> {
        let mutation = self.ledger.get(id).await?.ok_or_else(|| ServiceError::mutation_not_found(id))?;
        Ok(mutation.pair())
    }

    async fn require_product(&self, id: ProductId) -> ServiceResult<Product> {
        self.catalog
            .product(id)
            .await?
            .ok_or_else(|| rejected("lookup", Product::not_found(&id)))
    }

    async fn require_location(&self, id: LocationId) -> ServiceResult<Location> {
        self.catalog
            .location(id)
            .await?
            .ok_or_else(|| rejected("lookup", Location::not_found(&id)))
    }

    async fn require_actor(&self, actor: Option<UserId>) -> ServiceResult<Option<User>> {
        let Some(id) = actor else {
            return Ok(None);
        };
        let user = self
            .catalog
            .user(id)
            .await?
            .ok_or_else(|| rejected("lookup", User::not_found(&id)))?;
        Ok(Some(user))
    }

    async fn resolve(&self, mutation: &Mutation) -> ServiceResult<MutationView> {
        let product = self.catalog.product(mutation.product_id()).await?;
        let location = self.catalog.location(mutation.location_id()).await?;
        let actor = match mutation.actor() {
            Some(id) => self.catalog.user(id).await?,
            None => None,
        };
        Ok(MutationView::resolve(mutation, product.as_ref(), location.as_ref(), actor.as_ref()))
    }

    /// Resolve a page, looking each referenced record up once.
    async fn resolve_all(&self, mutations: &[Mutation]) -> ServiceResult<Vec<MutationView>> {
        let mut products = HashMap::new();
        for id in mutations.iter().map(Mutation::product_id).collect::<HashSet<_>>() {
            if let Some(product) = self.catalog.product(id).await? {
                products.insert(id, product);
            }
        }
        let mut locations = HashMap::new();
        for id in mutations.iter().map(Mutation::location_id).collect::<HashSet<_>>() {
            if let Some(location) = self.catalog.location(id).await? {
                locations.insert(id, location);
            }
        }
        let mut users = HashMap::new();
        for id in mutations.iter().filter_map(Mutation::actor).collect::<HashSet<_>>() {
            if let Some(user) = self.catalog.user(id).await? {
                users.insert(id, user);
            }
        }

        Ok(mutations
            .iter()
            .map(|m| {
                MutationView::resolve(
                    m,
                    products.get(&m.product_id()),
                    locations.get(&m.location_id()),
                    m.actor().and_then(|id| users.get(&id)),
                )
            })
            .collect())
    }

    async fn back_off(&self, operation: &'static str, attempt: u32, reason: &str) -> ServiceResult<()> {
        if !self.retry.should_retry(attempt) {
            warn!(operation, attempts = attempt, reason, "pair kept changing, giving up");
            return Err(ServiceError::Contention { attempts: attempt });
        }
        let delay = self.retry.delay_for_attempt(attempt);
        warn!(operation, attempt, delay_ms = delay.as_millis() as u64, reason, "pair revision moved, retrying");
        tokio::time::sleep(delay).await;
        Ok(())
    }

    /// The write is already committed here, so a bus failure never fails the
    /// command. Consumers that miss the fact see a revision gap and rebuild.
    fn publish(&self, pair: PairKey, revision: u64, actor: Option<UserId>, event: MutationEvent) {
        let envelope = EventEnvelope::new(Uuid::now_v7(), pair, revision, actor, event);
        if let Err(e) = self.bus.publish(envelope) {
            warn!(pair = %pair, revision, error = ?e, "publish failed after commit");
        }
    }
}

fn rejected(operation: &'static str, err: DomainError) -> ServiceError {
    warn!(operation, error = %err, "command rejected");
    err.into()
}
