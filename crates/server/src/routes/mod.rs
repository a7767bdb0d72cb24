//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check (store ping)
//!
//! # Listings
//! GET  /                       - Same as /listar
//! GET  /listar                 - Full materialization
//! GET  /listar-datadriver      - Element-count-driven streaming
//! GET  /listar-full            - Byte-chunked streaming, large chunks
//! GET  /listar-chunked         - Byte-chunked streaming, small chunks
//!
//! # Form
//! GET  /form                   - Empty form
//! GET  /form/{id}              - Edit form (redirects if missing)
//! POST /form                   - Save, then redirect to /listar
//! POST /form/cancel            - Drop pending edit
//! GET  /eliminar/{id}          - Delete, then redirect to /listar
//!
//! # JSON API
//! GET  /api/productos          - All products, names upper-cased
//! GET  /api/productos/{id}     - One product or 404
//! ```

pub mod api;
pub mod form;
pub mod health;
pub mod listing;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the listing routes router.
pub fn listing_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(listing::listar))
        .route("/listar", get(listing::listar))
        .route("/listar-datadriver", get(listing::listar_datadriver))
        .route("/listar-full", get(listing::listar_full))
        .route("/listar-chunked", get(listing::listar_chunked))
}

/// Create the form routes router.
pub fn form_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(form::crear).post(form::guardar))
        .route("/cancel", post(form::cancelar))
        .route("/{id}", get(form::editar))
}

/// Create the JSON API routes router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(api::index))
        .route("/{id}", get(api::show))
}

/// Create all routes for the server.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .merge(listing_routes())
        .nest("/form", form_routes())
        .route("/eliminar/{id}", get(form::eliminar))
        .nest("/api/productos", api_routes())
}
