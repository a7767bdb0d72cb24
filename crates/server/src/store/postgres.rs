//! `PostgreSQL`-backed product store.

use std::time::Duration;

use async_stream::stream;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use product_stream_core::{Price, Product, ProductId, ProductName};

use super::{ProductStore, ProductStream, StoreError};

const SELECT_ALL: &str = r"
    SELECT id, name, price, created_at
    FROM products
    ORDER BY created_at, id
";

const SELECT_BY_ID: &str = r"
    SELECT id, name, price, created_at
    FROM products
    WHERE id = $1
";

const UPSERT: &str = r"
    INSERT INTO products (id, name, price, created_at)
    VALUES ($1, $2, $3, COALESCE($4::timestamptz, now()))
    ON CONFLICT (id) DO UPDATE
        SET name = EXCLUDED.name,
            price = EXCLUDED.price
    RETURNING id, name, price, created_at
";

/// Row shape of the `products` table.
#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    name: ProductName,
    price: Price,
    created_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: Some(row.id),
            name: row.name,
            price: row.price,
            created_at: Some(row.created_at),
        }
    }
}

/// Product store backed by a `PostgreSQL` connection pool.
#[derive(Clone)]
pub struct PgProductStore {
    pool: PgPool,
}

impl PgProductStore {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect with sensible pool defaults.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` if the connection cannot be
    /// established.
    pub async fn connect(database_url: &SecretString) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .min_connections(2)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url.expose_secret())
            .await?;
        Ok(Self::new(pool))
    }

    /// Apply pending migrations from `crates/server/migrations/`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(format!("migration failed: {e}")))
    }
}

#[async_trait]
impl ProductStore for PgProductStore {
    fn find_all(&self) -> ProductStream {
        let pool = self.pool.clone();

        // The cursor lives inside the stream; dropping the stream closes it.
        Box::pin(stream! {
            let mut rows = sqlx::query_as::<_, ProductRow>(SELECT_ALL).fetch(&pool);
            loop {
                match rows.try_next().await {
                    Ok(Some(row)) => yield Ok::<Product, StoreError>(row.into()),
                    Ok(None) => break,
                    Err(e) => {
                        yield Err(StoreError::from(e));
                        break;
                    }
                }
            }
        })
    }

    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query_as::<_, ProductRow>(SELECT_BY_ID)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Product::from))
    }

    async fn save(&self, product: Product) -> Result<Product, StoreError> {
        let id = product.id.unwrap_or_else(ProductId::generate);

        let row = sqlx::query_as::<_, ProductRow>(UPSERT)
            .bind(&id)
            .bind(&product.name)
            .bind(product.price)
            .bind(product.created_at)
            .fetch_one(&self.pool)
            .await?;

        tracing::debug!(id = %row.id, "product saved");
        Ok(row.into())
    }

    async fn delete(&self, id: &ProductId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM products")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}
