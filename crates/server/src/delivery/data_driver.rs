//! Element-count-driven streaming.
//!
//! A producer task pulls items from the source and pushes them into a
//! bounded channel with capacity `B`. The consumer side ([`BatchPuller`])
//! receives up to `B` items at a time, hands them to the render sink and
//! only asks for the next batch after the sink has flushed. When the sink is
//! slow the channel fills and the producer waits in `send`, so at most about
//! `2B` items are ever pulled ahead of what was written.
//!
//! ```text
//! Idle -> Pulling -> Emitting -> AwaitingConsumerReady -> Pulling ...
//!                 \-> Done (source exhausted)
//!                 \-> Failed (store error)
//! ```

use std::num::NonZeroUsize;
use std::time::Duration;

use futures::StreamExt;
use product_stream_core::Product;
use tokio::sync::mpsc;
use tracing::Instrument;

use super::DeliveryError;
use crate::store::{ProductStream, StoreError};

/// Position of a [`BatchPuller`] in its delivery session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// Created, nothing requested yet.
    Idle,
    /// Waiting for the next batch from the producer.
    Pulling,
    /// A batch was handed to the sink.
    Emitting,
    /// The sink flushed the last batch and may request more.
    AwaitingConsumerReady,
    /// The source is exhausted and the end marker was emitted.
    Done,
    /// The store failed; no further batches follow.
    Failed,
}

impl DriverState {
    /// Returns `true` once no further events can be produced.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// What the sink receives from [`BatchPuller::next_event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverEvent {
    /// Between 1 and `B` items in source order.
    Batch(Vec<Product>),
    /// End of stream. Emitted exactly once.
    End,
}

/// Builds pull sessions with a fixed batch size and optional pacing.
#[derive(Debug, Clone, Copy)]
pub struct DataDriver {
    batch_size: NonZeroUsize,
    item_delay: Option<Duration>,
}

impl DataDriver {
    #[must_use]
    pub const fn new(batch_size: NonZeroUsize, item_delay: Option<Duration>) -> Self {
        Self {
            batch_size,
            item_delay,
        }
    }

    /// Spawn the producer for `items` and return the consumer handle.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn start(&self, items: ProductStream) -> BatchPuller {
        let capacity = self.batch_size.get();
        let (tx, rx) = mpsc::channel(capacity);
        let delay = self.item_delay;

        tokio::spawn(
            async move {
                if let Err(e) = produce(items, delay, tx).await {
                    tracing::debug!(error = %e, "data driver producer stopped");
                }
            }
            .in_current_span(),
        );

        BatchPuller {
            rx,
            batch_size: capacity,
            pending_error: None,
            state: DriverState::Idle,
            batches: 0,
            items: 0,
        }
    }
}

/// Forward items into the channel until the source ends, fails or the
/// consumer goes away.
async fn produce(
    mut items: ProductStream,
    delay: Option<Duration>,
    tx: mpsc::Sender<Result<Product, StoreError>>,
) -> Result<(), DeliveryError> {
    loop {
        let next = tokio::select! {
            biased;
            () = tx.closed() => return Err(DeliveryError::ConsumerDisconnected),
            next = items.next() => next,
        };

        let Some(item) = next else {
            return Ok(());
        };

        if let Some(delay) = delay {
            tokio::select! {
                biased;
                () = tx.closed() => return Err(DeliveryError::ConsumerDisconnected),
                () = tokio::time::sleep(delay) => {}
            }
        }

        let failed = item.is_err();
        if tx.send(item).await.is_err() {
            return Err(DeliveryError::ConsumerDisconnected);
        }
        if failed {
            return Ok(());
        }
    }
}

/// Consumer half of a data-driven delivery session.
///
/// Dropping it closes the channel and the producer stops pulling.
#[derive(Debug)]
pub struct BatchPuller {
    rx: mpsc::Receiver<Result<Product, StoreError>>,
    batch_size: usize,
    /// Store error received while a partial batch was still unsent.
    pending_error: Option<StoreError>,
    state: DriverState,
    batches: usize,
    items: usize,
}

impl BatchPuller {
    #[must_use]
    pub const fn state(&self) -> DriverState {
        self.state
    }

    /// Number of batches handed out so far.
    #[must_use]
    pub const fn batches_emitted(&self) -> usize {
        self.batches
    }

    /// Number of items handed out so far.
    #[must_use]
    pub const fn items_emitted(&self) -> usize {
        self.items
    }

    /// Pull the next batch.
    ///
    /// Returns `None` after [`DriverEvent::End`] or an error has been
    /// returned.
    pub async fn next_event(&mut self) -> Option<Result<DriverEvent, DeliveryError>> {
        if self.state.is_terminal() {
            return None;
        }
        if let Some(e) = self.pending_error.take() {
            return Some(Err(self.fail(e)));
        }
        self.state = DriverState::Pulling;

        let mut batch = Vec::with_capacity(self.batch_size);
        while batch.len() < self.batch_size {
            match self.rx.recv().await {
                Some(Ok(product)) => batch.push(product),
                Some(Err(e)) if batch.is_empty() => return Some(Err(self.fail(e))),
                Some(Err(e)) => {
                    // Items already received go out before the failure.
                    self.rx.close();
                    self.pending_error = Some(e);
                    break;
                }
                None => break,
            }
        }

        if batch.is_empty() {
            self.state = DriverState::Done;
            tracing::debug!(
                batches = self.batches,
                items = self.items,
                "data-driven delivery complete"
            );
            return Some(Ok(DriverEvent::End));
        }

        self.batches += 1;
        self.items += batch.len();
        self.state = DriverState::Emitting;
        Some(Ok(DriverEvent::Batch(batch)))
    }

    fn fail(&mut self, e: StoreError) -> DeliveryError {
        tracing::warn!(
            error = %e,
            batches = self.batches,
            items = self.items,
            "store failed during data-driven delivery"
        );
        self.state = DriverState::Failed;
        self.rx.close();
        e.into()
    }

    /// Signal that the last batch reached the network.
    pub fn mark_flushed(&mut self) {
        if self.state == DriverState::Emitting {
            self.state = DriverState::AwaitingConsumerReady;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::stream;

    use super::*;
    use crate::delivery::source::tests::{product, source_of};

    fn driver(batch_size: usize) -> DataDriver {
        DataDriver::new(NonZeroUsize::new(batch_size).unwrap(), None)
    }

    fn numbered(count: usize) -> Vec<Product> {
        (0..count).map(|i| product(&format!("P{i}"), 100)).collect()
    }

    async fn drain(puller: &mut BatchPuller) -> (Vec<Vec<Product>>, usize) {
        let mut batches = Vec::new();
        let mut ends = 0;
        while let Some(event) = puller.next_event().await {
            match event.unwrap() {
                DriverEvent::Batch(batch) => {
                    batches.push(batch);
                    puller.mark_flushed();
                }
                DriverEvent::End => ends += 1,
            }
        }
        (batches, ends)
    }

    #[tokio::test]
    async fn test_two_items_one_batch() {
        let items = source_of(vec![product("Televisor", 45689), product("Radio", 8900)]);
        let mut puller = driver(2).start(items);
        assert_eq!(puller.state(), DriverState::Idle);

        let first = puller.next_event().await.unwrap().unwrap();
        let DriverEvent::Batch(batch) = first else {
            panic!("expected a batch");
        };
        assert_eq!(batch.len(), 2);
        assert_eq!(puller.state(), DriverState::Emitting);

        puller.mark_flushed();
        assert_eq!(puller.state(), DriverState::AwaitingConsumerReady);

        assert_eq!(puller.next_event().await.unwrap().unwrap(), DriverEvent::End);
        assert_eq!(puller.state(), DriverState::Done);
        assert!(puller.next_event().await.is_none());
    }

    #[tokio::test]
    async fn test_batches_cover_source_in_order() {
        let products = numbered(7);
        let mut puller = driver(2).start(source_of(products.clone()));

        let (batches, ends) = drain(&mut puller).await;
        assert_eq!(ends, 1);
        assert_eq!(batches.len(), 4);
        assert!(batches.iter().all(|b| !b.is_empty() && b.len() <= 2));

        let flat: Vec<Product> = batches.into_iter().flatten().collect();
        assert_eq!(flat, products);
        assert_eq!(puller.items_emitted(), 7);
        assert_eq!(puller.batches_emitted(), 4);
    }

    #[tokio::test]
    async fn test_empty_source_emits_only_end() {
        let mut puller = driver(2).start(source_of(Vec::new()));
        let (batches, ends) = drain(&mut puller).await;
        assert!(batches.is_empty());
        assert_eq!(ends, 1);
    }

    #[tokio::test]
    async fn test_store_error_fails_session() {
        let items: ProductStream = Box::pin(stream::iter(vec![
            Ok(product("Televisor", 45689)),
            Ok(product("Radio", 8900)),
            Err(StoreError::Unavailable("connection reset".into())),
        ]));
        let mut puller = driver(2).start(items);

        assert!(matches!(
            puller.next_event().await,
            Some(Ok(DriverEvent::Batch(_)))
        ));
        puller.mark_flushed();
        assert!(matches!(
            puller.next_event().await,
            Some(Err(DeliveryError::StoreUnavailable(_)))
        ));
        assert_eq!(puller.state(), DriverState::Failed);
        assert!(puller.next_event().await.is_none());
    }

    #[tokio::test]
    async fn test_partial_batch_emitted_before_store_error() {
        let items: ProductStream = Box::pin(stream::iter(vec![
            Ok(product("Televisor", 45689)),
            Ok(product("Radio", 8900)),
            Ok(product("Laptop", 78912)),
            Err(StoreError::Unavailable("connection reset".into())),
        ]));
        let mut puller = driver(2).start(items);

        let mut names = Vec::new();
        let mut failed = false;
        while let Some(event) = puller.next_event().await {
            match event {
                Ok(DriverEvent::Batch(batch)) => {
                    names.push(
                        batch
                            .iter()
                            .map(|p| p.name.as_str().to_owned())
                            .collect::<Vec<_>>(),
                    );
                    puller.mark_flushed();
                }
                Ok(DriverEvent::End) => panic!("no end marker after a store error"),
                Err(e) => {
                    assert!(matches!(e, DeliveryError::StoreUnavailable(_)));
                    failed = true;
                }
            }
        }

        assert!(failed);
        assert_eq!(names, vec![vec!["Televisor", "Radio"], vec!["Laptop"]]);
        assert_eq!(puller.items_emitted(), 3);
        assert_eq!(puller.state(), DriverState::Failed);
    }

    #[tokio::test]
    async fn test_producer_waits_for_consumer() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&pulled);
        let items: ProductStream = Box::pin(stream::iter(numbered(100)).map(move |p| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(p)
        }));

        let batch_size = 2;
        let mut puller = driver(batch_size).start(items);

        let mut consumed = 0;
        for _ in 0..3 {
            if let Some(Ok(DriverEvent::Batch(batch))) = puller.next_event().await {
                consumed += batch.len();
                puller.mark_flushed();
            }
            // Give the producer every chance to run ahead.
            tokio::time::sleep(Duration::from_millis(20)).await;
            assert!(pulled.load(Ordering::SeqCst) <= consumed + 2 * batch_size);
        }
        assert_eq!(consumed, 6);
    }

    #[tokio::test]
    async fn test_dropping_puller_stops_producer() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&pulled);
        let items: ProductStream = Box::pin(stream::iter(numbered(1000)).map(move |p| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(p)
        }));

        let mut puller = driver(2).start(items);
        let _ = puller.next_event().await;
        drop(puller);

        tokio::time::sleep(Duration::from_millis(20)).await;
        let after_drop = pulled.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(pulled.load(Ordering::SeqCst), after_drop);
        assert!(after_drop < 1000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_item_delay_paces_producer() {
        let driver = DataDriver::new(
            NonZeroUsize::new(2).unwrap(),
            Some(Duration::from_secs(1)),
        );
        let started = tokio::time::Instant::now();
        let mut puller = driver.start(source_of(numbered(2)));

        let (batches, _) = drain(&mut puller).await;
        assert_eq!(batches.len(), 1);
        assert!(started.elapsed() >= Duration::from_secs(2));
    }

    mod properties {
        use proptest::prelude::*;

        use super::*;

        fn run_session(batch_size: usize, len: usize) -> (Vec<Vec<Product>>, usize) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async {
                let mut puller = driver(batch_size).start(source_of(numbered(len)));
                drain(&mut puller).await
            })
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 64,
                ..ProptestConfig::default()
            })]

            #[test]
            fn batches_partition_source(batch_size in 1usize..=5, len in 0usize..=12) {
                let (batches, ends) = run_session(batch_size, len);

                prop_assert_eq!(ends, 1);
                prop_assert_eq!(batches.len(), len.div_ceil(batch_size));
                prop_assert!(batches.iter().all(|b| !b.is_empty() && b.len() <= batch_size));

                let flat: Vec<Product> = batches.into_iter().flatten().collect();
                prop_assert_eq!(flat, numbered(len));
            }
        }
    }
}

