//! Core types for Product Stream.
//!
//! This module provides type-safe wrappers for the catalogue domain.

pub mod id;
pub mod name;
pub mod price;
pub mod product;

pub use id::ProductId;
pub use name::{ProductName, ProductNameError};
pub use price::{Price, PriceError};
pub use product::Product;
