//! Delivery of a product listing to the render sink.
//!
//! A listing flows through four stages:
//!
//! ```text
//! item source -> name normalization -> delivery strategy -> render sink -> network
//! ```
//!
//! The strategy decides when the render sink may pull more items:
//!
//! - [`full`] - collect everything, render once. No backpressure.
//! - [`data_driver`] - fixed-size batches over a bounded channel; the producer
//!   waits for the consumer.
//! - [`chunked`] - one store round trip, replayed N times; the sink flushes by
//!   byte count at row boundaries.
//!
//! Every streamed delivery owns exactly one pull cursor. Dropping the
//! response body drops the cursor, which stops the producer.

pub mod chunked;
pub mod data_driver;
pub mod full;
pub mod source;

use thiserror::Error;

use crate::store::StoreError;

pub use chunked::{ChunkedDelivery, ReplayCursor};
pub use data_driver::{BatchPuller, DataDriver, DriverEvent, DriverState};
pub use full::materialize;
pub use source::{item_source, normalize_names};

/// Errors that end a delivery session.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The document store failed while the listing was being produced.
    #[error(transparent)]
    StoreUnavailable(#[from] StoreError),

    /// A template failed to render.
    #[error("render error: {0}")]
    Render(#[from] askama::Error),

    /// The client went away; the pull cursor was cancelled.
    #[error("consumer disconnected")]
    ConsumerDisconnected,
}

/// Which delivery discipline a response uses, for logs and spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Full,
    DataDriver,
    Chunked,
}

impl Strategy {
    /// Stable name used in tracing fields.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::DataDriver => "data_driver",
            Self::Chunked => "chunked",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
