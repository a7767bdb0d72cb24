//! Full materialization.
//!
//! The whole listing is collected before anything is rendered. There is no
//! pacing and no backpressure: memory grows with the collection, so this is
//! only suitable for small listings. Above the configured threshold a
//! warning is logged on every request.

use futures::TryStreamExt;
use product_stream_core::Product;

use crate::store::{ProductStream, StoreError};

/// Collect every item, preserving source order.
///
/// # Errors
///
/// Returns the first store error; nothing has been rendered at that point.
pub async fn materialize(
    items: ProductStream,
    warn_threshold: usize,
) -> Result<Vec<Product>, StoreError> {
    let products: Vec<Product> = items.try_collect().await?;

    if products.len() > warn_threshold {
        tracing::warn!(
            items = products.len(),
            threshold = warn_threshold,
            "materialized listing exceeds threshold, prefer a streamed route"
        );
    }

    Ok(products)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use futures::stream;

    use super::*;
    use crate::delivery::source::tests::{product, source_of};

    #[tokio::test]
    async fn test_materialize_keeps_order() {
        let items = source_of(vec![
            product("Televisor", 45689),
            product("Radio", 8900),
            product("Laptop", 78912),
        ]);
        let products = materialize(items, 2000).await.unwrap();
        let names: Vec<&str> = products.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Televisor", "Radio", "Laptop"]);
    }

    #[tokio::test]
    async fn test_materialize_above_threshold_still_succeeds() {
        let items = source_of((0..10).map(|i| product(&format!("P{i}"), 100)).collect());
        let products = materialize(items, 3).await.unwrap();
        assert_eq!(products.len(), 10);
    }

    #[tokio::test]
    async fn test_materialize_fails_on_store_error() {
        let items: ProductStream = Box::pin(stream::iter(vec![
            Ok(product("Radio", 8900)),
            Err(StoreError::Unavailable("timeout".into())),
        ]));
        let result = materialize(items, 2000).await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }
}
