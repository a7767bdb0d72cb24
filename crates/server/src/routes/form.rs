//! Product form and delete handlers.
//!
//! `GET /form/{id}` stores the loaded product in the edit session and
//! `POST /form` applies the submitted fields to it, so the saved document
//! keeps its identifier and creation timestamp.

use axum::{
    Form,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use product_stream_core::{Price, Product, ProductId, ProductName};

use crate::error::Result;
use crate::models::EditSession;
use crate::render::FormTemplate;
use crate::state::AppState;

const MSG_SAVED: &str = "Producto guardado con éxito";
const MSG_DELETED: &str = "Producto eliminado con éxito";
const MSG_MISSING: &str = "No existe el producto";

/// Submitted form fields.
#[derive(Debug, Deserialize)]
pub struct ProductForm {
    pub name: String,
    pub price: String,
}

impl ProductForm {
    /// Validate both fields, collecting every message.
    fn parse(&self) -> std::result::Result<(ProductName, Price), Vec<String>> {
        let name = ProductName::parse(&self.name);
        let price = Price::parse(&self.price);
        match (name, price) {
            (Ok(name), Ok(price)) => Ok((name, price)),
            (name, price) => Err(name
                .err()
                .map(|e| format!("nombre: {e}"))
                .into_iter()
                .chain(price.err().map(|e| format!("precio: {e}")))
                .collect()),
        }
    }
}

/// Redirect to the full listing with a `success` or `error` indicator.
fn redirect_to_listing(kind: &str, message: &str) -> Redirect {
    Redirect::to(&format!(
        "/listar?{kind}={}",
        urlencoding::encode(message)
    ))
}

/// Show an empty form and drop any pending edit.
///
/// # Errors
///
/// Returns `AppError::Session` if the session store fails.
#[instrument(skip(session))]
pub async fn crear(session: Session) -> Result<FormTemplate> {
    EditSession::new(&session).clear().await?;
    Ok(FormTemplate::create())
}

/// Load a product into the edit session and show it.
///
/// A missing product redirects to the listing with an error indicator.
///
/// # Errors
///
/// Returns `AppError::Store` or `AppError::Session` on backend failure.
#[instrument(skip(state, session))]
pub async fn editar(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> Result<Response> {
    let Some(product) = state.store().find_by_id(&ProductId::new(id)).await? else {
        return Ok(redirect_to_listing("error", MSG_MISSING).into_response());
    };

    EditSession::new(&session).begin(&product).await?;
    Ok(FormTemplate::edit(&product).into_response())
}

/// Save the submitted product.
///
/// Invalid input re-renders the form with 422. On success the edit session
/// is cleared and the client is sent to the listing.
///
/// # Errors
///
/// Returns `AppError::Store` or `AppError::Session` on backend failure.
#[instrument(skip(state, session, form))]
pub async fn guardar(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<ProductForm>,
) -> Result<Response> {
    let edit = EditSession::new(&session);
    let pending = edit.current().await?;

    let (name, price) = match form.parse() {
        Ok(fields) => fields,
        Err(errors) => {
            let mut template = pending
                .as_ref()
                .map_or_else(FormTemplate::create, FormTemplate::edit);
            template.name = form.name;
            template.price = form.price;
            template.errors = errors;
            return Ok((StatusCode::UNPROCESSABLE_ENTITY, template).into_response());
        }
    };

    let product = match pending {
        Some(mut product) => {
            product.name = name;
            product.price = price;
            product
        }
        None => Product::new(name, price),
    };

    let saved = state.store().save(product).await?;
    edit.clear().await?;

    tracing::info!(
        id = %saved.id.as_ref().map(ToString::to_string).unwrap_or_default(),
        name = %saved.name,
        "product saved"
    );
    Ok(redirect_to_listing("success", MSG_SAVED).into_response())
}

/// Abandon the pending edit.
///
/// # Errors
///
/// Returns `AppError::Session` if the session store fails.
#[instrument(skip(session))]
pub async fn cancelar(session: Session) -> Result<Redirect> {
    EditSession::new(&session).clear().await?;
    Ok(Redirect::to("/listar"))
}

/// Delete a product and return to the listing.
///
/// # Errors
///
/// Returns `AppError::Store` on backend failure.
#[instrument(skip(state))]
pub async fn eliminar(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Redirect> {
    let id = ProductId::new(id);
    if state.store().delete(&id).await? {
        tracing::info!(%id, "product deleted");
        Ok(redirect_to_listing("success", MSG_DELETED))
    } else {
        Ok(redirect_to_listing("error", MSG_MISSING))
    }
}
