//! Byte-chunked streaming.
//!
//! The store is read once. The normalized items are held in memory and
//! replayed `repeat` times to produce a large body; the render sink emits
//! rows into a buffer and flushes whenever the buffer reaches the chunk
//! size. Flushes happen only between rows, never inside one.

use std::num::NonZeroUsize;
use std::sync::Arc;

use futures::TryStreamExt;
use product_stream_core::Product;

use crate::store::{ProductStream, StoreError};

/// Parameters of a byte-chunked delivery.
#[derive(Debug, Clone, Copy)]
pub struct ChunkedDelivery {
    chunk_bytes: NonZeroUsize,
    repeat: NonZeroUsize,
}

impl ChunkedDelivery {
    #[must_use]
    pub const fn new(chunk_bytes: NonZeroUsize, repeat: NonZeroUsize) -> Self {
        Self {
            chunk_bytes,
            repeat,
        }
    }

    /// Minimum size of every chunk except the last.
    #[must_use]
    pub const fn chunk_bytes(&self) -> usize {
        self.chunk_bytes.get()
    }

    #[must_use]
    pub const fn repeat(&self) -> usize {
        self.repeat.get()
    }

    /// Read the source once and prepare the replay.
    ///
    /// # Errors
    ///
    /// Returns the first store error. Nothing has been sent at that point.
    pub async fn load(&self, items: ProductStream) -> Result<ReplayCursor, StoreError> {
        let products: Vec<Product> = items.try_collect().await?;
        tracing::debug!(
            items = products.len(),
            repeat = self.repeat.get(),
            "loaded chunked listing"
        );
        Ok(ReplayCursor::new(products.into(), self.repeat.get()))
    }
}

/// Iterates a loaded listing `repeat` times in source order.
#[derive(Debug, Clone)]
pub struct ReplayCursor {
    items: Arc<[Product]>,
    repeat: usize,
    cycle: usize,
    index: usize,
}

impl ReplayCursor {
    #[must_use]
    pub const fn new(items: Arc<[Product]>, repeat: usize) -> Self {
        Self {
            items,
            repeat,
            cycle: 0,
            index: 0,
        }
    }

    /// Total number of rows the cursor yields from the start.
    #[must_use]
    pub fn total(&self) -> usize {
        self.items.len() * self.repeat
    }
}

impl Iterator for ReplayCursor {
    type Item = Product;

    fn next(&mut self) -> Option<Product> {
        if self.cycle >= self.repeat {
            return None;
        }
        let product = self.items.get(self.index)?.clone();

        self.index += 1;
        if self.index == self.items.len() {
            self.index = 0;
            self.cycle += 1;
        }
        Some(product)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let done = self.cycle * self.items.len() + self.index;
        let remaining = self.total().saturating_sub(done);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ReplayCursor {}
