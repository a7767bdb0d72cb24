//! Document store for products.
//!
//! The [`ProductStore`] trait is the only surface the rest of the server
//! sees. Two implementations exist:
//!
//! - [`MemoryProductStore`] - process-local, insertion ordered (default)
//! - [`PgProductStore`] - `PostgreSQL` table `products`
//!
//! # Migrations
//!
//! `PostgreSQL` migrations live in `crates/server/migrations/` and are
//! applied by [`PgProductStore::migrate`] at startup.

pub mod memory;
pub mod postgres;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use thiserror::Error;

use product_stream_core::{Product, ProductId};

pub use memory::MemoryProductStore;
pub use postgres::PgProductStore;

/// Errors that can occur during store operations.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The store could not be reached or the operation failed in transit.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Data in the store is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                Self::DataCorruption(err.to_string())
            }
            other => Self::Unavailable(other.to_string()),
        }
    }
}

/// Lazy sequence of products as produced by [`ProductStore::find_all`].
pub type ProductStream = Pin<Box<dyn Stream<Item = Result<Product, StoreError>> + Send>>;

/// Create/read/update/delete access to product documents.
///
/// Implementations own their synchronization; callers share them through an
/// `Arc<dyn ProductStore>`.
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Stream every product in the store's natural order.
    ///
    /// The listing is not started until the stream is first polled, and
    /// dropping the stream stops any further reads.
    fn find_all(&self) -> ProductStream;

    /// Look up a product by identifier.
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, StoreError>;

    /// Insert or update a product.
    ///
    /// A product without an identifier is created with a freshly generated
    /// one. A product with an identifier is updated in place. The creation
    /// timestamp is set only if it is absent and is never overwritten.
    async fn save(&self, product: Product) -> Result<Product, StoreError>;

    /// Delete a product. Returns `false` if it did not exist.
    async fn delete(&self, id: &ProductId) -> Result<bool, StoreError>;

    /// Remove every product.
    async fn clear(&self) -> Result<(), StoreError>;

    /// Check that the store is reachable.
    async fn ping(&self) -> Result<(), StoreError>;
}
