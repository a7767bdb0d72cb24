//! Item source and transform stage.

use futures::TryStreamExt;

use crate::store::{ProductStore, ProductStream};

/// Open a lazy listing of every product in the store.
///
/// Nothing is read until the returned stream is polled.
pub fn item_source(store: &dyn ProductStore) -> ProductStream {
    store.find_all()
}

/// Upper-case every product name as it passes through.
///
/// Stateless and lazy: each item is transformed once, when it is pulled.
/// Store errors pass through untouched.
pub fn normalize_names(items: ProductStream) -> ProductStream {
    Box::pin(items.map_ok(|product| {
        let product = product.with_uppercase_name();
        tracing::trace!(name = %product.name, "normalized product");
        product
    }))
}
