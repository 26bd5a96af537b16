//! Postgres-backed entity store.
//!
//! Product and location codes are unique case-insensitively through
//! `LOWER(code)` indexes; a violation surfaces as `DomainError::Conflict`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use sqlx::{PgPool, Row};
use tracing::instrument;

use stockledger_catalog::fields;
use stockledger_catalog::{
    CatalogError, CatalogResult, Category, EntityStore, EntityWriter, Location, LocationUpdate, NewLocation,
    NewProduct, NewUser, Product, ProductUpdate, Unit, User,
};
use stockledger_core::{CategoryId, DomainError, Entity, EntityKind, LocationId, ProductId, UnitId, UserId};

#[derive(Debug, Clone)]
pub struct PostgresCatalog {
    pool: Arc<PgPool>,
}

impl PostgresCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    async fn ensure_references(&self, category: Option<CategoryId>, unit: Option<UnitId>) -> CatalogResult<()> {
        if let Some(id) = category {
            if self.category(id).await?.is_none() {
                return Err(DomainError::not_found(EntityKind::Category, id).into());
            }
        }
        if let Some(id) = unit {
            if self.unit(id).await?.is_none() {
                return Err(DomainError::not_found(EntityKind::Unit, id).into());
            }
        }
        Ok(())
    }

    async fn insert_product(&self, product: &Product) -> CatalogResult<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, code, name, category_id, unit_id, description, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.code)
        .bind(&product.name)
        .bind(product.category_id.map(uuid::Uuid::from))
        .bind(product.unit_id.map(uuid::Uuid::from))
        .bind(&product.description)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_product", &product.code, e))?;
        Ok(())
    }

    async fn update_product_row(&self, product: &Product) -> CatalogResult<()> {
        sqlx::query(
            r#"
            UPDATE products
            SET code = $2,
                name = $3,
                category_id = $4,
                unit_id = $5,
                description = $6,
                updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.code)
        .bind(&product.name)
        .bind(product.category_id.map(uuid::Uuid::from))
        .bind(product.unit_id.map(uuid::Uuid::from))
        .bind(&product.description)
        .bind(product.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_product", &product.code, e))?;
        Ok(())
    }

    async fn insert_location(&self, location: &Location) -> CatalogResult<()> {
        sqlx::query(
            r#"
            INSERT INTO locations (id, code, name, address, description, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(location.id.as_uuid())
        .bind(&location.code)
        .bind(&location.name)
        .bind(&location.address)
        .bind(&location.description)
        .bind(location.created_at)
        .bind(location.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_location", &location.code, e))?;
        Ok(())
    }

    async fn update_location_row(&self, location: &Location) -> CatalogResult<()> {
        sqlx::query(
            r#"
            UPDATE locations
            SET code = $2,
                name = $3,
                address = $4,
                description = $5,
                updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(location.id.as_uuid())
        .bind(&location.code)
        .bind(&location.name)
        .bind(&location.address)
        .bind(&location.description)
        .bind(location.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_location", &location.code, e))?;
        Ok(())
    }
}

#[async_trait]
impl EntityStore for PostgresCatalog {
    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn product(&self, id: ProductId) -> CatalogResult<Option<Product>> {
        let row = sqlx::query(
            r#"
            SELECT id, code, name, category_id, unit_id, description, created_at, updated_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| storage("load_product", e))?;

        row.map(|r| -> Result<Product, sqlx::Error> {
            Ok(Product {
                id: ProductId::from_uuid(r.try_get("id")?),
                code: r.try_get("code")?,
                name: r.try_get("name")?,
                category_id: r.try_get::<Option<uuid::Uuid>, _>("category_id")?.map(CategoryId::from_uuid),
                unit_id: r.try_get::<Option<uuid::Uuid>, _>("unit_id")?.map(UnitId::from_uuid),
                description: r.try_get("description")?,
                created_at: r.try_get("created_at")?,
                updated_at: r.try_get("updated_at")?,
            })
        })
        .transpose()
        .map_err(|e| storage("decode_product", e))
    }

    #[instrument(skip(self), fields(location_id = %id), err)]
    async fn location(&self, id: LocationId) -> CatalogResult<Option<Location>> {
        let row = sqlx::query(
            r#"
            SELECT id, code, name, address, description, created_at, updated_at
            FROM locations
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| storage("load_location", e))?;

        row.map(|r| -> Result<Location, sqlx::Error> {
            Ok(Location {
                id: LocationId::from_uuid(r.try_get("id")?),
                code: r.try_get("code")?,
                name: r.try_get("name")?,
                address: r.try_get("address")?,
                description: r.try_get("description")?,
                created_at: r.try_get("created_at")?,
                updated_at: r.try_get("updated_at")?,
            })
        })
        .transpose()
        .map_err(|e| storage("decode_location", e))
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn user(&self, id: UserId) -> CatalogResult<Option<User>> {
        let row = sqlx::query("SELECT id, name, email, created_at FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| storage("load_user", e))?;

        row.map(|r| -> Result<User, sqlx::Error> {
            Ok(User {
                id: UserId::from_uuid(r.try_get("id")?),
                name: r.try_get("name")?,
                email: r.try_get("email")?,
                created_at: r.try_get("created_at")?,
            })
        })
        .transpose()
        .map_err(|e| storage("decode_user", e))
    }

    #[instrument(skip(self), err)]
    async fn search_products(&self, text: &str) -> CatalogResult<Vec<ProductId>> {
        let pattern = format!("%{}%", escape_like(text.trim()));
        let rows = sqlx::query(
            r#"
            SELECT id
            FROM products
            WHERE name ILIKE $1 ESCAPE '\' OR code ILIKE $1 ESCAPE '\'
            ORDER BY id
            "#,
        )
        .bind(pattern)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| storage("search_products", e))?;

        rows.iter()
            .map(|r| r.try_get::<uuid::Uuid, _>("id").map(ProductId::from_uuid))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| storage("decode_product_id", e))
    }
}

#[async_trait]
impl EntityWriter for PostgresCatalog {
    async fn add_category(&self, name: &str) -> CatalogResult<Category> {
        let category = Category {
            id: CategoryId::new(),
            name: fields::required("name", name, 255)?,
        };
        sqlx::query("INSERT INTO categories (id, name) VALUES ($1, $2)")
            .bind(category.id.as_uuid())
            .bind(&category.name)
            .execute(&*self.pool)
            .await
            .map_err(|e| storage("insert_category", e))?;
        Ok(category)
    }

    async fn add_unit(&self, name: &str) -> CatalogResult<Unit> {
        let unit = Unit {
            id: UnitId::new(),
            name: fields::required("name", name, 255)?,
        };
        sqlx::query("INSERT INTO units (id, name) VALUES ($1, $2)")
            .bind(unit.id.as_uuid())
            .bind(&unit.name)
            .execute(&*self.pool)
            .await
            .map_err(|e| storage("insert_unit", e))?;
        Ok(unit)
    }

    #[instrument(skip(self, input), fields(code = %input.code), err)]
    async fn add_product(&self, input: NewProduct) -> CatalogResult<Product> {
        let product = input.into_product(ProductId::new(), now())?;
        self.ensure_references(product.category_id, product.unit_id).await?;
        self.insert_product(&product).await?;
        Ok(product)
    }

    #[instrument(skip(self, update), fields(product_id = %id), err)]
    async fn update_product(&self, id: ProductId, update: ProductUpdate) -> CatalogResult<Product> {
        let current = self
            .product(id)
            .await?
            .ok_or_else(|| Product::not_found(&id))?;
        let next = update.apply(&current, now())?;
        self.ensure_references(next.category_id, next.unit_id).await?;
        self.update_product_row(&next).await?;
        Ok(next)
    }

    #[instrument(skip(self, input), fields(code = %input.code), err)]
    async fn add_location(&self, input: NewLocation) -> CatalogResult<Location> {
        let location = input.into_location(LocationId::new(), now())?;
        self.insert_location(&location).await?;
        Ok(location)
    }

    #[instrument(skip(self, update), fields(location_id = %id), err)]
    async fn update_location(&self, id: LocationId, update: LocationUpdate) -> CatalogResult<Location> {
        let current = self
            .location(id)
            .await?
            .ok_or_else(|| Location::not_found(&id))?;
        let next = update.apply(&current, now())?;
        self.update_location_row(&next).await?;
        Ok(next)
    }

    async fn add_user(&self, input: NewUser) -> CatalogResult<User> {
        let user = input.into_user(UserId::new(), now())?;
        sqlx::query("INSERT INTO users (id, name, email, created_at) VALUES ($1, $2, $3, $4)")
            .bind(user.id.as_uuid())
            .bind(&user.name)
            .bind(&user.email)
            .bind(user.created_at)
            .execute(&*self.pool)
            .await
            .map_err(|e| storage("insert_user", e))?;
        Ok(user)
    }

    async fn category(&self, id: CategoryId) -> CatalogResult<Option<Category>> {
        let row = sqlx::query("SELECT name FROM categories WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| storage("load_category", e))?;
        row.map(|r| r.try_get("name").map(|name| Category { id, name }))
            .transpose()
            .map_err(|e| storage("decode_category", e))
    }

    async fn unit(&self, id: UnitId) -> CatalogResult<Option<Unit>> {
        let row = sqlx::query("SELECT name FROM units WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| storage("load_unit", e))?;
        row.map(|r| r.try_get("name").map(|name| Unit { id, name }))
            .transpose()
            .map_err(|e| storage("decode_unit", e))
    }
}

fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Escape `%`, `_` and `\` so user text matches literally inside ILIKE.
fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn storage(operation: &str, err: sqlx::Error) -> CatalogError {
    CatalogError::Storage(format!("sqlx error in {operation}: {err}"))
}

fn map_sqlx_error(operation: &str, code: &str, err: sqlx::Error) -> CatalogError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            return DomainError::conflict(format!("code '{code}' is already in use")).into();
        }
    }
    storage(operation, err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("laptop"), "laptop");
    }
}
