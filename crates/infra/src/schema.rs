//! Database schema bootstrap.

use sqlx::PgPool;
use tracing::info;

const INIT: &str = include_str!("../migrations/0001_init.sql");

/// Create tables and indexes if they are missing. Idempotent.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(INIT).execute(pool).await?;
    info!("database schema ready");
    Ok(())
}
