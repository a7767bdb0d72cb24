//! Edit session.
//!
//! The product being edited lives in the HTTP session between `GET /form/{id}`
//! and `POST /form`, so a resubmitted form updates the same document and
//! keeps its identifier and creation timestamp.

use tower_sessions::Session;

use product_stream_core::Product;

/// Session keys.
pub mod keys {
    /// Key for the product currently being edited.
    pub const EDITING_PRODUCT: &str = "editing_product";
}

/// Typed access to the pending edit of one HTTP session.
pub struct EditSession<'a> {
    session: &'a Session,
}

impl<'a> EditSession<'a> {
    #[must_use]
    pub const fn new(session: &'a Session) -> Self {
        Self { session }
    }

    /// The product being edited, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    pub async fn current(&self) -> Result<Option<Product>, tower_sessions::session::Error> {
        self.session.get(keys::EDITING_PRODUCT).await
    }

    /// Start editing `product`, replacing any pending edit.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    pub async fn begin(&self, product: &Product) -> Result<(), tower_sessions::session::Error> {
        self.session.insert(keys::EDITING_PRODUCT, product).await
    }

    /// Drop the pending edit.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    pub async fn clear(&self) -> Result<(), tower_sessions::session::Error> {
        self.session
            .remove::<Product>(keys::EDITING_PRODUCT)
            .await
            .map(|_| ())
    }
}
