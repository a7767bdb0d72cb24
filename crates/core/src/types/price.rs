//! Type-safe price representation using decimal arithmetic.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing a [`Price`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// The amount is below zero.
    #[error("price cannot be negative (got {0})")]
    Negative(Decimal),
    /// The input is not a decimal number.
    #[error("price is not a valid number: {0}")]
    Invalid(String),
    /// The amount has more than two decimal places.
    #[error("price must have at most 2 decimal places (got {0})")]
    TooPrecise(Decimal),
    /// The amount does not fit the stored column.
    #[error("price must be at most 9999999999.99 (got {0})")]
    TooLarge(Decimal),
}

/// A non-negative price with at most two decimal places, no larger than
/// [`Price::MAX`].
///
/// Serializes as a decimal string (`"456.89"`) so no precision is lost in
/// JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

impl Price {
    /// A zero price.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Largest storable price, the range of a `NUMERIC(12, 2)` column.
    ///
    /// `999_999_999_999` hundredths, split into the low and middle words.
    pub const MAX: Self = Self(Decimal::from_parts(0xD4A5_0FFF, 0xE8, 0, false, 2));

    /// Create a new price.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Negative`] if `amount` is below zero,
    /// [`PriceError::TooPrecise`] if it has more than two decimal places and
    /// [`PriceError::TooLarge`] if it exceeds [`Self::MAX`].
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative(amount));
        }
        if amount.normalize().scale() > 2 {
            return Err(PriceError::TooPrecise(amount));
        }
        if amount > Self::MAX.0 {
            return Err(PriceError::TooLarge(amount));
        }
        Ok(Self(amount))
    }

    /// Create a price from an integer number of cents.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Negative`] if `cents` is below zero.
    pub fn from_cents(cents: i64) -> Result<Self, PriceError> {
        Self::new(Decimal::new(cents, 2))
    }

    /// Parse a price from user input such as `"89.00"` or `"89,5"`.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Invalid`] if the input is not a number, and
    /// otherwise the same errors as [`Self::new`].
    pub fn parse(s: &str) -> Result<Self, PriceError> {
        let normalized = s.trim().replace(',', ".");
        let amount = normalized
            .parse::<Decimal>()
            .map_err(|_| PriceError::Invalid(s.trim().to_owned()))?;
        Self::new(amount)
    }

    /// Get the decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl TryFrom<Decimal> for Price {
    type Error = PriceError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Price {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <Decimal as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <Decimal as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Price {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let amount = <Decimal as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::new(amount)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Price {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <Decimal as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display_two_decimals() {
        assert_eq!(Price::from_cents(8900).unwrap().to_string(), "89.00");
        assert_eq!(Price::from_cents(45689).unwrap().to_string(), "456.89");
        assert_eq!(Price::ZERO.to_string(), "0.00");
    }

    #[test]
    fn test_negative_rejected() {
        assert!(matches!(
            Price::from_cents(-1),
            Err(PriceError::Negative(_))
        ));
    }

    #[test]
    fn test_parse() {
        assert_eq!(Price::parse("89.00").unwrap(), Price::from_cents(8900).unwrap());
        assert_eq!(Price::parse(" 12,5 ").unwrap().to_string(), "12.50");
        assert!(matches!(Price::parse("abc"), Err(PriceError::Invalid(_))));
        assert!(matches!(Price::parse("-3"), Err(PriceError::Negative(_))));
    }

    #[test]
    fn test_parse_matches_column_range() {
        assert!(matches!(
            Price::parse("1.239"),
            Err(PriceError::TooPrecise(_))
        ));
        assert_eq!(Price::parse("1.230").unwrap().to_string(), "1.23");

        assert_eq!(Price::MAX.to_string(), "9999999999.99");
        assert_eq!(Price::parse("9999999999.99").unwrap(), Price::MAX);
        assert!(matches!(
            Price::parse("10000000000"),
            Err(PriceError::TooLarge(_))
        ));
        assert!(Price::from_cents(i64::MAX).is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let price = Price::from_cents(45689).unwrap();
        let json = serde_json::to_string(&price).unwrap();
        assert_eq!(json, "\"456.89\"");

        let parsed: Price = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, price);

        let negative: Result<Price, _> = serde_json::from_str("\"-1.00\"");
        assert!(negative.is_err());
    }
}
