//! Listing handlers, one per delivery strategy.

use std::num::NonZeroUsize;

use axum::{
    extract::{Query, State},
    response::Response,
};
use tracing::instrument;

use crate::delivery::{
    ChunkedDelivery, DataDriver, Strategy, item_source, materialize, normalize_names,
};
use crate::error::Result;
use crate::render::{
    ListingQuery, ListingTemplate, PageHeader, ProductView, chunked_body, data_driven_body,
    html_stream,
};
use crate::state::AppState;

/// Render the whole listing at once.
///
/// # Errors
///
/// Returns `AppError::Store` if the listing cannot be read.
#[instrument(skip(state, query), fields(strategy = %Strategy::Full))]
pub async fn listar(
    State(state): State<AppState>,
    Query(query): Query<ListingQuery>,
) -> Result<ListingTemplate> {
    let items = normalize_names(item_source(state.store()));
    let products = materialize(items, state.streaming().full_warn_threshold).await?;

    for product in &products {
        tracing::info!(name = %product.name, "listing product");
    }

    let page = PageHeader::listing(query.into_notice());
    Ok(ListingTemplate {
        title: page.title,
        notice: page.notice,
        products: products.iter().map(ProductView::from).collect(),
        strategy: Strategy::Full.as_str(),
    })
}

/// Stream the listing in fixed-size batches, paced by the client.
#[instrument(skip(state, query), fields(strategy = %Strategy::DataDriver))]
pub async fn listar_datadriver(
    State(state): State<AppState>,
    Query(query): Query<ListingQuery>,
) -> Response {
    let config = state.streaming();
    let driver = DataDriver::new(config.batch_size, config.item_delay);
    let puller = driver.start(normalize_names(item_source(state.store())));

    html_stream(data_driven_body(
        PageHeader::listing(query.into_notice()),
        puller,
    ))
}

/// Stream the replayed listing in large byte chunks.
///
/// # Errors
///
/// Returns `AppError::Store` if the listing cannot be read.
#[instrument(skip(state, query), fields(strategy = %Strategy::Chunked))]
pub async fn listar_full(
    State(state): State<AppState>,
    Query(query): Query<ListingQuery>,
) -> Result<Response> {
    let chunk_bytes = state.streaming().full_chunk_bytes;
    chunked_listing(&state, query, chunk_bytes).await
}

/// Stream the replayed listing in small byte chunks.
///
/// # Errors
///
/// Returns `AppError::Store` if the listing cannot be read.
#[instrument(skip(state, query), fields(strategy = %Strategy::Chunked))]
pub async fn listar_chunked(
    State(state): State<AppState>,
    Query(query): Query<ListingQuery>,
) -> Result<Response> {
    let chunk_bytes = state.streaming().chunked_chunk_bytes;
    chunked_listing(&state, query, chunk_bytes).await
}

async fn chunked_listing(
    state: &AppState,
    query: ListingQuery,
    chunk_bytes: NonZeroUsize,
) -> Result<Response> {
    let config = state.streaming();
    let delivery = ChunkedDelivery::new(chunk_bytes, config.repeat);
    let cursor = delivery
        .load(normalize_names(item_source(state.store())))
        .await?;

    Ok(html_stream(chunked_body(
        PageHeader::listing(query.into_notice()),
        cursor,
        delivery.chunk_bytes(),
        config.buffer_chunks.get(),
    )))
}
