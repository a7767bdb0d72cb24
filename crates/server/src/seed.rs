//! Demonstration data loaded at startup.

use product_stream_core::{Price, Product, ProductName};

use crate::store::{ProductStore, StoreError};

/// Name and price in cents of every demonstration product.
pub const DEMO_PRODUCTS: [(&str, i64); 6] = [
    ("Televisor", 45689),
    ("Radio", 8900),
    ("Laptop", 78912),
    ("Tablet", 45000),
    ("Impresora", 30000),
    ("Celular", 15000),
];

/// Clear the store and insert the demonstration products in order.
///
/// # Errors
///
/// Returns the first store error. Products saved before it stay saved.
pub async fn seed_demo_products(store: &dyn ProductStore) -> Result<Vec<Product>, StoreError> {
    store.clear().await?;

    let mut saved = Vec::with_capacity(DEMO_PRODUCTS.len());
    for (name, cents) in DEMO_PRODUCTS {
        let product = Product::new(
            ProductName::parse(name).map_err(|e| StoreError::DataCorruption(e.to_string()))?,
            Price::from_cents(cents).map_err(|e| StoreError::DataCorruption(e.to_string()))?,
        );
        let product = store.save(product).await?;
        tracing::info!(
            id = %product.id.as_ref().map(ToString::to_string).unwrap_or_default(),
            name = %product.name,
            "Insert"
        );
        saved.push(product);
    }

    Ok(saved)
}
