//! Postgres-backed stock cache (`stock_levels` table).

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::instrument;

use stockledger_core::{LocationId, PairKey, ProductId};

use super::stock_store::{ReadModelError, StockLevel, StockStore};

#[derive(Debug, Clone)]
pub struct PostgresStockStore {
    pool: Arc<PgPool>,
}

impl PostgresStockStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }
}

#[async_trait]
impl StockStore for PostgresStockStore {
    #[instrument(skip(self), fields(pair = %pair), err)]
    async fn get(&self, pair: PairKey) -> Result<Option<StockLevel>, ReadModelError> {
        let row = sqlx::query(
            r#"
            SELECT product_id, location_id, quantity, revision
            FROM stock_levels
            WHERE product_id = $1 AND location_id = $2
            "#,
        )
        .bind(pair.product_id.as_uuid())
        .bind(pair.location_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| storage("get_stock_level", e))?;

        row.map(|r| decode(&r)).transpose()
    }

    #[instrument(skip(self), fields(pair = %level.pair, revision = level.revision), err)]
    async fn advance(&self, level: StockLevel) -> Result<bool, ReadModelError> {
        let result = sqlx::query(
            r#"
            INSERT INTO stock_levels (product_id, location_id, quantity, revision, updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (product_id, location_id)
            DO UPDATE SET
                quantity = EXCLUDED.quantity,
                revision = EXCLUDED.revision,
                updated_at = NOW()
            WHERE stock_levels.revision < EXCLUDED.revision
            "#,
        )
        .bind(level.pair.product_id.as_uuid())
        .bind(level.pair.location_id.as_uuid())
        .bind(level.quantity)
        .bind(level.revision as i64)
        .execute(&*self.pool)
        .await
        .map_err(|e| storage("advance_stock_level", e))?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(pair = %level.pair, revision = level.revision), err)]
    async fn replace(&self, level: StockLevel) -> Result<(), ReadModelError> {
        sqlx::query(
            r#"
            INSERT INTO stock_levels (product_id, location_id, quantity, revision, updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (product_id, location_id)
            DO UPDATE SET
                quantity = EXCLUDED.quantity,
                revision = EXCLUDED.revision,
                updated_at = NOW()
            "#,
        )
        .bind(level.pair.product_id.as_uuid())
        .bind(level.pair.location_id.as_uuid())
        .bind(level.quantity)
        .bind(level.revision as i64)
        .execute(&*self.pool)
        .await
        .map_err(|e| storage("replace_stock_level", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn list(&self) -> Result<Vec<StockLevel>, ReadModelError> {
        let rows = sqlx::query(
            r#"
            SELECT product_id, location_id, quantity, revision
            FROM stock_levels
            ORDER BY product_id, location_id
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| storage("list_stock_levels", e))?;

        rows.iter().map(decode).collect()
    }
}

fn decode(row: &sqlx::postgres::PgRow) -> Result<StockLevel, ReadModelError> {
    let read = || -> Result<StockLevel, sqlx::Error> {
        let product_id: uuid::Uuid = row.try_get("product_id")?;
        let location_id: uuid::Uuid = row.try_get("location_id")?;
        let revision: i64 = row.try_get("revision")?;
        Ok(StockLevel {
            pair: PairKey::new(ProductId::from_uuid(product_id), LocationId::from_uuid(location_id)),
            quantity: row.try_get("quantity")?,
            revision: revision.max(0) as u64,
        })
    };
    read().map_err(|e| storage("decode_stock_level", e))
}

fn storage(operation: &str, err: sqlx::Error) -> ReadModelError {
    ReadModelError::Storage(format!("sqlx error in {operation}: {err}"))
}
