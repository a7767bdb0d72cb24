//! JSON API handlers.

use axum::{
    Json,
    extract::{Path, State},
};
use futures::TryStreamExt;
use tracing::instrument;

use product_stream_core::{Product, ProductId};

use crate::delivery::{item_source, normalize_names};
use crate::error::{AppError, Result};
use crate::state::AppState;

/// All products with upper-cased names.
///
/// # Errors
///
/// Returns `AppError::Store` if the listing cannot be read.
#[instrument(skip(state))]
pub async fn index(State(state): State<AppState>) -> Result<Json<Vec<Product>>> {
    let products: Vec<Product> = normalize_names(item_source(state.store()))
        .inspect_ok(|product| tracing::info!(name = %product.name, "api product"))
        .try_collect()
        .await?;
    Ok(Json(products))
}

/// One product as stored.
///
/// # Errors
///
/// Returns `AppError::NotFound` if no product has this id.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Product>> {
    let id = ProductId::new(id);
    let product = state
        .store()
        .find_by_id(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;

    tracing::info!(name = %product.name, "api product");
    Ok(Json(product))
}
