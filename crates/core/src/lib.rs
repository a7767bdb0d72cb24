//! Product Stream Core - Shared domain types.
//!
//! This crate provides the types shared by the server and its tests:
//! - [`Product`] - A catalogue document as stored in the document store
//! - [`ProductId`] - Store-assigned identifier
//! - [`ProductName`] - Non-empty, trimmed product name
//! - [`Price`] - Non-negative decimal price
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access, no HTTP.
//! The optional `postgres` feature adds `sqlx` encode/decode support.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
