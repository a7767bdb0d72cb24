//! In-memory product store.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::{StreamExt, stream};
use tokio::sync::RwLock;

use product_stream_core::{Product, ProductId};

use super::{ProductStore, ProductStream, StoreError};

/// Process-local store keeping products in insertion order.
///
/// Cheaply cloneable; clones share the same documents.
#[derive(Clone, Default)]
pub struct MemoryProductStore {
    products: Arc<RwLock<Vec<Product>>>,
}

impl MemoryProductStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored products.
    pub async fn len(&self) -> usize {
        self.products.read().await.len()
    }

    /// Returns `true` if the store holds no products.
    pub async fn is_empty(&self) -> bool {
        self.products.read().await.is_empty()
    }
}

#[async_trait]
impl ProductStore for MemoryProductStore {
    fn find_all(&self) -> ProductStream {
        let products = Arc::clone(&self.products);

        // Snapshot on first poll so a listing sees one consistent view.
        Box::pin(
            stream::once(async move { products.read().await.clone() })
                .flat_map(|snapshot| stream::iter(snapshot.into_iter().map(Ok))),
        )
    }

    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, StoreError> {
        let products = self.products.read().await;
        Ok(products
            .iter()
            .find(|p| p.id.as_ref() == Some(id))
            .cloned())
    }

    async fn save(&self, mut product: Product) -> Result<Product, StoreError> {
        let mut products = self.products.write().await;

        let existing = product
            .id
            .as_ref()
            .and_then(|id| products.iter().position(|p| p.id.as_ref() == Some(id)));

        match existing {
            Some(index) => {
                let slot = products
                    .get_mut(index)
                    .ok_or_else(|| StoreError::DataCorruption("index out of range".into()))?;
                product.created_at = slot
                    .created_at
                    .or(product.created_at)
                    .or_else(|| Some(Utc::now()));
                *slot = product.clone();
            }
            None => {
                if product.id.is_none() {
                    product.id = Some(ProductId::generate());
                }
                if product.created_at.is_none() {
                    product.created_at = Some(Utc::now());
                }
                products.push(product.clone());
            }
        }

        Ok(product)
    }

    async fn delete(&self, id: &ProductId) -> Result<bool, StoreError> {
        let mut products = self.products.write().await;
        let before = products.len();
        products.retain(|p| p.id.as_ref() != Some(id));
        Ok(products.len() != before)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.products.write().await.clear();
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
