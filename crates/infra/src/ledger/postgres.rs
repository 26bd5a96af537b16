//! Postgres-backed mutation ledger.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | LedgerError | Scenario |
//! |------------|----------------------|-------------|----------|
//! | Database (unique violation) | `23505` | `Concurrency` | Two writers created the same pair row concurrently |
//! | Database (serialization failure) | `40001` | `Concurrency` | Snapshot conflict on a pair read |
//! | Database (foreign key violation) | `23503` | `Storage` | Unknown product/location/user reference |
//! | Database (check constraint violation) | `23514` | `Storage` | Invalid data (direction, quantity) |
//! | Database (other) / PoolClosed / Other | N/A | `Storage` | Everything else |
//!
//! ## Revision check
//!
//! Every write runs in one transaction that locks the pair's row in
//! `stock_pairs` (`SELECT ... FOR UPDATE`), compares its revision with the
//! caller's expectation, writes the mutation and bumps the revision. A writer
//! in another process that raced us blocks on the row lock and then sees the
//! bumped revision, so its stale decision is refused.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SubsecRound, Utc};
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::{Span, instrument};

use stockledger_core::{ExpectedVersion, LocationId, MutationId, PairKey, ProductId, UserId};
use stockledger_inventory::{
    Direction, Mutation, MutationFilter, MutationParts, MutationPatch, NewMutation, Page, PageRequest, Quantity,
};

use super::{Committed, LedgerError, LedgerResult, MutationLedger, PairHistory};

const MUTATION_COLUMNS: &str = r#"
    id,
    product_id,
    location_id,
    actor_id,
    direction,
    quantity,
    note,
    mutation_date,
    created_at,
    updated_at
"#;

/// Postgres-backed mutation ledger.
///
/// Uses the SQLx connection pool (thread-safe); all writes are transactional.
#[derive(Debug, Clone)]
pub struct PostgresLedger {
    pool: Arc<PgPool>,
}

impl PostgresLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    async fn begin(&self) -> LedgerResult<Transaction<'_, Postgres>> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))
    }
}

#[async_trait]
impl MutationLedger for PostgresLedger {
    #[instrument(
        skip(self, new),
        fields(
            product_id = %new.product_id,
            location_id = %new.location_id,
            direction = %new.direction,
            expected = ?expected,
            mutation_id = tracing::field::Empty
        ),
        err
    )]
    async fn create(&self, new: NewMutation, expected: ExpectedVersion) -> LedgerResult<Committed> {
        let pair = new.pair();
        let mut tx = self.begin().await?;

        let current = lock_pair(&mut tx, pair).await?;
        if !expected.matches(current) {
            rollback(tx).await?;
            return Err(stale(pair, expected, current));
        }

        // Postgres keeps microseconds; stamp with what will be read back.
        let now = Utc::now().trunc_subsecs(6);
        let date = new.date.unwrap_or_else(|| now.date_naive());

        let row = sqlx::query(
            r#"
            INSERT INTO stock_mutations (
                product_id,
                location_id,
                actor_id,
                direction,
                quantity,
                note,
                mutation_date,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING id
            "#,
        )
        .bind(new.product_id.as_uuid())
        .bind(new.location_id.as_uuid())
        .bind(new.actor.map(uuid::Uuid::from))
        .bind(new.direction.as_str())
        .bind(new.quantity.as_i64())
        .bind(&new.note)
        .bind(date)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_mutation", e))?;

        let id: i64 = row
            .try_get("id")
            .map_err(|e| LedgerError::Storage(format!("failed to read mutation id: {e}")))?;
        let revision = bump_pair(&mut tx, pair).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        let mutation = new.with_date(date).into_mutation(MutationId::new(id as u64), now);
        Span::current().record("mutation_id", id);
        Ok(Committed { mutation, revision })
    }

    #[instrument(skip(self, patch), fields(mutation_id = %id, expected = ?expected), err)]
    async fn update(
        &self,
        id: MutationId,
        patch: MutationPatch,
        expected: ExpectedVersion,
    ) -> LedgerResult<Committed> {
        let mut tx = self.begin().await?;

        let Some(existing) = lock_mutation(&mut tx, id).await? else {
            rollback(tx).await?;
            return Err(LedgerError::NotFound(id));
        };
        let pair = existing.pair();
        let current = lock_pair(&mut tx, pair).await?;
        if !expected.matches(current) {
            rollback(tx).await?;
            return Err(stale(pair, expected, current));
        }

        let next = patch.apply(&existing, Utc::now().trunc_subsecs(6));
        sqlx::query(
            r#"
            UPDATE stock_mutations
            SET quantity = $2,
                note = $3,
                mutation_date = $4,
                updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(id.get() as i64)
        .bind(next.quantity().as_i64())
        .bind(next.note())
        .bind(next.date())
        .bind(next.updated_at())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_mutation", e))?;

        let revision = bump_pair(&mut tx, pair).await?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(Committed {
            mutation: next,
            revision,
        })
    }

    #[instrument(skip(self), fields(mutation_id = %id, expected = ?expected), err)]
    async fn delete(&self, id: MutationId, expected: ExpectedVersion) -> LedgerResult<Committed> {
        let mut tx = self.begin().await?;

        let Some(existing) = lock_mutation(&mut tx, id).await? else {
            rollback(tx).await?;
            return Err(LedgerError::NotFound(id));
        };
        let pair = existing.pair();
        let current = lock_pair(&mut tx, pair).await?;
        if !expected.matches(current) {
            rollback(tx).await?;
            return Err(stale(pair, expected, current));
        }

        sqlx::query("DELETE FROM stock_mutations WHERE id = $1")
            .bind(id.get() as i64)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_mutation", e))?;

        let revision = bump_pair(&mut tx, pair).await?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(Committed {
            mutation: existing,
            revision,
        })
    }

    #[instrument(skip(self), fields(mutation_id = %id), err)]
    async fn get(&self, id: MutationId) -> LedgerResult<Option<Mutation>> {
        let sql = format!("SELECT {MUTATION_COLUMNS} FROM stock_mutations WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.get() as i64)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_mutation", e))?;

        row.map(|r| decode_mutation(&r)).transpose()
    }

    #[instrument(
        skip(self, filter),
        fields(page = page.page, per_page = page.per_page, total = tracing::field::Empty),
        err
    )]
    async fn list(&self, filter: &MutationFilter, page: PageRequest) -> LedgerResult<Page<Mutation>> {
        let product_ids: Option<Vec<uuid::Uuid>> = filter
            .product_ids
            .as_ref()
            .map(|ids| ids.iter().map(|id| *id.as_uuid()).collect());
        let location_id = filter.location_id.map(uuid::Uuid::from);
        let direction = filter.direction.map(Direction::as_str);

        let where_clause = r#"
            WHERE ($1::uuid[] IS NULL OR product_id = ANY($1))
              AND ($2::uuid IS NULL OR location_id = $2)
              AND ($3::text IS NULL OR direction = $3)
        "#;

        let count_sql = format!("SELECT COUNT(*) AS total FROM stock_mutations {where_clause}");
        let total: i64 = sqlx::query(&count_sql)
            .bind(&product_ids)
            .bind(location_id)
            .bind(direction)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_mutations", e))?
            .try_get("total")
            .map_err(|e| LedgerError::Storage(format!("failed to read total: {e}")))?;

        let page_sql = format!(
            "SELECT {MUTATION_COLUMNS} FROM stock_mutations {where_clause} \
             ORDER BY created_at DESC, id DESC LIMIT $4 OFFSET $5"
        );
        let rows = sqlx::query(&page_sql)
            .bind(&product_ids)
            .bind(location_id)
            .bind(direction)
            .bind(page.limit() as i64)
            .bind(page.offset() as i64)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_mutations", e))?;

        let items = rows.iter().map(decode_mutation).collect::<LedgerResult<Vec<_>>>()?;
        Span::current().record("total", total);
        Ok(Page::new(items, page, total.max(0) as u64))
    }

    #[instrument(skip(self), fields(pair = %pair), err)]
    async fn load_pair(&self, pair: PairKey) -> LedgerResult<PairHistory> {
        let mut tx = self.begin().await?;

        // Revision and rows must come from the same snapshot.
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_isolation", e))?;

        let revision: Option<i64> = sqlx::query(
            r#"
            SELECT revision
            FROM stock_pairs
            WHERE product_id = $1 AND location_id = $2
            "#,
        )
        .bind(pair.product_id.as_uuid())
        .bind(pair.location_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("load_pair_revision", e))?
        .map(|row| row.try_get("revision"))
        .transpose()
        .map_err(|e| LedgerError::Storage(format!("failed to read revision: {e}")))?;

        let sql = format!(
            "SELECT {MUTATION_COLUMNS} FROM stock_mutations \
             WHERE product_id = $1 AND location_id = $2 ORDER BY id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(pair.product_id.as_uuid())
            .bind(pair.location_id.as_uuid())
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("load_pair_mutations", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        let mutations = rows.iter().map(decode_mutation).collect::<LedgerResult<Vec<_>>>()?;
        Ok(PairHistory {
            revision: revision.unwrap_or(0) as u64,
            mutations,
        })
    }

    #[instrument(skip(self), err)]
    async fn pairs(&self) -> LedgerResult<Vec<PairKey>> {
        let rows = sqlx::query(
            r#"
            SELECT product_id, location_id
            FROM stock_pairs
            ORDER BY product_id, location_id
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_pairs", e))?;

        rows.iter()
            .map(|row| {
                let product_id: uuid::Uuid = row.try_get("product_id")?;
                let location_id: uuid::Uuid = row.try_get("location_id")?;
                Ok(PairKey::new(ProductId::from_uuid(product_id), LocationId::from_uuid(location_id)))
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(|e| LedgerError::Storage(format!("failed to read pair row: {e}")))
    }
}

/// Lock the pair row (creating it at revision 0 first if needed) and return its revision.
async fn lock_pair(tx: &mut Transaction<'_, Postgres>, pair: PairKey) -> LedgerResult<u64> {
    sqlx::query(
        r#"
        INSERT INTO stock_pairs (product_id, location_id, revision)
        VALUES ($1, $2, 0)
        ON CONFLICT (product_id, location_id) DO NOTHING
        "#,
    )
    .bind(pair.product_id.as_uuid())
    .bind(pair.location_id.as_uuid())
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("ensure_pair", e))?;

    let row = sqlx::query(
        r#"
        SELECT revision
        FROM stock_pairs
        WHERE product_id = $1 AND location_id = $2
        FOR UPDATE
        "#,
    )
    .bind(pair.product_id.as_uuid())
    .bind(pair.location_id.as_uuid())
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("lock_pair", e))?;

    let revision: i64 = row
        .try_get("revision")
        .map_err(|e| LedgerError::Storage(format!("failed to read revision: {e}")))?;
    Ok(revision as u64)
}

async fn bump_pair(tx: &mut Transaction<'_, Postgres>, pair: PairKey) -> LedgerResult<u64> {
    let row = sqlx::query(
        r#"
        UPDATE stock_pairs
        SET revision = revision + 1
        WHERE product_id = $1 AND location_id = $2
        RETURNING revision
        "#,
    )
    .bind(pair.product_id.as_uuid())
    .bind(pair.location_id.as_uuid())
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("bump_pair", e))?;

    let revision: i64 = row
        .try_get("revision")
        .map_err(|e| LedgerError::Storage(format!("failed to read revision: {e}")))?;
    Ok(revision as u64)
}

async fn lock_mutation(tx: &mut Transaction<'_, Postgres>, id: MutationId) -> LedgerResult<Option<Mutation>> {
    let sql = format!("SELECT {MUTATION_COLUMNS} FROM stock_mutations WHERE id = $1 FOR UPDATE");
    let row = sqlx::query(&sql)
        .bind(id.get() as i64)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("lock_mutation", e))?;
    row.map(|r| decode_mutation(&r)).transpose()
}

async fn rollback(tx: Transaction<'_, Postgres>) -> LedgerResult<()> {
    tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))
}

fn stale(pair: PairKey, expected: ExpectedVersion, current: u64) -> LedgerError {
    LedgerError::Concurrency(format!("pair {pair}: expected {expected:?}, found {current}"))
}

/// Map SQLx errors to LedgerError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> LedgerError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") | Some("40001") => LedgerError::Concurrency(msg),
                _ => LedgerError::Storage(msg),
            }
        }
        sqlx::Error::PoolClosed => LedgerError::Storage(format!("connection pool closed in {operation}")),
        _ => LedgerError::Storage(format!("sqlx error in {operation}: {err}")),
    }
}

fn decode_mutation(row: &sqlx::postgres::PgRow) -> LedgerResult<Mutation> {
    let row = MutationRow::from_row(row)
        .map_err(|e| LedgerError::Storage(format!("failed to deserialize mutation row: {e}")))?;
    Mutation::try_from(row)
}

// SQLx row types
#[derive(Debug)]
struct MutationRow {
    id: i64,
    product_id: uuid::Uuid,
    location_id: uuid::Uuid,
    actor_id: Option<uuid::Uuid>,
    direction: String,
    quantity: i64,
    note: String,
    mutation_date: NaiveDate,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for MutationRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(MutationRow {
            id: row.try_get("id")?,
            product_id: row.try_get("product_id")?,
            location_id: row.try_get("location_id")?,
            actor_id: row.try_get("actor_id")?,
            direction: row.try_get("direction")?,
            quantity: row.try_get("quantity")?,
            note: row.try_get("note")?,
            mutation_date: row.try_get("mutation_date")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl TryFrom<MutationRow> for Mutation {
    type Error = LedgerError;

    fn try_from(row: MutationRow) -> Result<Self, Self::Error> {
        let corrupt = |e: stockledger_core::DomainError| {
            LedgerError::Storage(format!("mutation {} has invalid data: {e}", row.id))
        };
        Ok(Mutation::restore(MutationParts {
            id: MutationId::new(row.id as u64),
            product_id: ProductId::from_uuid(row.product_id),
            location_id: LocationId::from_uuid(row.location_id),
            actor: row.actor_id.map(UserId::from_uuid),
            direction: row.direction.parse().map_err(corrupt)?,
            quantity: Quantity::new(row.quantity).map_err(corrupt)?,
            note: row.note,
            date: row.mutation_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }))
    }
}
