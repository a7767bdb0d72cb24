//! The catalogue document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Price, ProductId, ProductName};

/// A product document.
///
/// `id` and `created_at` are assigned by the document store on the first
/// save. A product without an `id` has never been persisted; once set, the
/// store never changes either field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Store-assigned identifier, absent until the first save.
    pub id: Option<ProductId>,
    /// Display name.
    pub name: ProductName,
    /// Unit price.
    pub price: Price,
    /// Creation timestamp, set once on the first save.
    pub created_at: Option<DateTime<Utc>>,
}

impl Product {
    /// Create a product that has not been persisted yet.
    #[must_use]
    pub const fn new(name: ProductName, price: Price) -> Self {
        Self {
            id: None,
            name,
            price,
            created_at: None,
        }
    }

    /// Returns `true` if the product has been saved at least once.
    #[must_use]
    pub const fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Returns a copy with the name upper-cased.
    ///
    /// Idempotent: applying it twice yields the same product as once.
    #[must_use]
    pub fn with_uppercase_name(mut self) -> Self {
        self.name = self.name.to_uppercase();
        self
    }
}
