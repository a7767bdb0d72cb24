//! Types the HTTP layer keeps outside the store.

pub mod session;

pub use session::EditSession;
