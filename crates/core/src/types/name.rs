//! Product name type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`ProductName`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProductNameError {
    /// The input is empty or only whitespace.
    #[error("product name cannot be empty")]
    Empty,
    /// The input is too long.
    #[error("product name must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
}

/// A product name.
///
/// ## Constraints
///
/// - Leading and trailing whitespace is removed
/// - Must not be empty after trimming
/// - At most 255 characters, counted on the upper-cased form so that
///   [`ProductName::to_uppercase`] stays within the limit
///
/// ## Examples
///
/// ```
/// use product_stream_core::ProductName;
///
/// let name = ProductName::parse("  Televisor ").unwrap();
/// assert_eq!(name.as_str(), "Televisor");
/// assert_eq!(name.to_uppercase().as_str(), "TELEVISOR");
///
/// assert!(ProductName::parse("   ").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct ProductName(String);

impl ProductName {
    /// Maximum length of a product name, in characters.
    pub const MAX_LENGTH: usize = 255;

    /// Parse a `ProductName` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed input is empty, or if it is longer
    /// than [`Self::MAX_LENGTH`] characters once upper-cased.
    pub fn parse(s: &str) -> Result<Self, ProductNameError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ProductNameError::Empty);
        }

        // Upper-casing maps every char to one or more chars (ß -> SS).
        let upper_len: usize = trimmed.chars().map(|c| c.to_uppercase().len()).sum();
        if upper_len > Self::MAX_LENGTH {
            return Err(ProductNameError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the upper-cased name.
    ///
    /// Upper-casing never empties a name and [`Self::parse`] already
    /// measured the upper-cased length.
    #[must_use]
    pub fn to_uppercase(&self) -> Self {
        Self(self.0.to_uppercase())
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the name and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ProductName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ProductName {
    type Err = ProductNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ProductName {
    type Error = ProductNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ProductName> for String {
    fn from(name: ProductName) -> Self {
        name.0
    }
}

impl AsRef<str> for ProductName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for ProductName {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for ProductName {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::parse(&s)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for ProductName {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}
