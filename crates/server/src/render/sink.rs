//! Incremental HTML bodies for the streamed listings.
//!
//! Both streamed bodies are built from whole fragments (head, rows, tail).
//! A fragment is rendered completely into memory before any of it is handed
//! to the network, so a chunk boundary never falls inside a row.
//!
//! A delivery failure after the headers were sent is yielded as an `Err`
//! from the body stream. Hyper then aborts the connection instead of
//! finishing the chunked encoding, so the client sees an interrupted
//! response rather than a short but well-formed page.

use askama::Template;
use axum::{
    body::Body,
    http::header,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::Instrument;

use product_stream_core::Product;

use super::views::{ListingTail, PageHeader, ProductRow, ProductView};
use crate::delivery::{BatchPuller, DeliveryError, DriverEvent, Strategy};
use crate::error::report_stream_error;

/// Content type of every rendered page.
pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

type BodyChunk = Result<Bytes, DeliveryError>;

/// Upper bound on what a chunker reserves up front.
const MAX_PREALLOC_BYTES: usize = 64 * 1024;

/// Collects rendered fragments and cuts them into chunks of at least
/// `chunk_bytes`, only ever between fragments.
#[derive(Debug)]
pub struct ByteChunker {
    buf: String,
    chunk_bytes: usize,
}

impl ByteChunker {
    #[must_use]
    pub fn new(chunk_bytes: usize) -> Self {
        Self {
            buf: String::with_capacity(
                chunk_bytes
                    .saturating_add(chunk_bytes / 4)
                    .min(MAX_PREALLOC_BYTES),
            ),
            chunk_bytes,
        }
    }

    /// Append one rendered fragment; returns a chunk once the threshold is
    /// reached.
    ///
    /// # Errors
    ///
    /// Returns the template error if the fragment fails to render.
    pub fn push<T: Template>(&mut self, fragment: &T) -> Result<Option<Bytes>, askama::Error> {
        fragment.render_into(&mut self.buf)?;
        if self.buf.len() >= self.chunk_bytes {
            Ok(Some(self.take()))
        } else {
            Ok(None)
        }
    }

    /// Whatever is left in the buffer.
    #[must_use]
    pub fn finish(mut self) -> Option<Bytes> {
        if self.buf.is_empty() {
            None
        } else {
            Some(self.take())
        }
    }

    fn take(&mut self) -> Bytes {
        let capacity = self.buf.capacity();
        Bytes::from(std::mem::replace(
            &mut self.buf,
            String::with_capacity(capacity),
        ))
    }
}

/// Render a batch of products as one chunk.
fn render_rows(batch: &[Product]) -> Result<Bytes, askama::Error> {
    let mut buf = String::new();
    for product in batch {
        let view = ProductView::from(product);
        ProductRow { product: &view }.render_into(&mut buf)?;
    }
    Ok(Bytes::from(buf))
}

/// Body for the element-count-driven listing.
///
/// The head goes out first, then one chunk per batch. The next batch is
/// only requested after hyper has polled for more, which is the consumer
/// readiness signal.
pub fn data_driven_body(
    page: PageHeader,
    mut puller: BatchPuller,
) -> impl Stream<Item = BodyChunk> + Send + 'static {
    async_stream::stream! {
        match page.head(Strategy::DataDriver).render() {
            Ok(head) => yield Ok(Bytes::from(head)),
            Err(e) => {
                yield Err(DeliveryError::from(e));
                return;
            }
        }

        while let Some(event) = puller.next_event().await {
            match event {
                Ok(DriverEvent::Batch(batch)) => match render_rows(&batch) {
                    Ok(rows) => {
                        yield Ok(rows);
                        puller.mark_flushed();
                    }
                    Err(e) => {
                        yield Err(DeliveryError::from(e));
                        return;
                    }
                },
                Ok(DriverEvent::End) => match ListingTail.render() {
                    Ok(tail) => yield Ok(Bytes::from(tail)),
                    Err(e) => yield Err(DeliveryError::from(e)),
                },
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }
    }
}

/// Body for the byte-chunked listings.
///
/// `cursor` is normally a [`ReplayCursor`](crate::delivery::ReplayCursor).
/// A producer task renders its rows and feeds chunks through a
/// channel holding at most `buffer_chunks` of them. A slow client leaves
/// the producer waiting on `send`; a gone client ends it.
#[must_use]
pub fn chunked_body<I>(
    page: PageHeader,
    cursor: I,
    chunk_bytes: usize,
    buffer_chunks: usize,
) -> ReceiverStream<BodyChunk>
where
    I: ExactSizeIterator<Item = Product> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(buffer_chunks);

    tokio::spawn(
        async move {
            match feed_chunks(&page, cursor, chunk_bytes, &tx).await {
                Ok(()) | Err(DeliveryError::ConsumerDisconnected) => {}
                Err(e) => {
                    // Ignore send failure; the client may already be gone.
                    let _ = tx.send(Err(e)).await;
                }
            }
        }
        .in_current_span(),
    );

    ReceiverStream::new(rx)
}

async fn feed_chunks<I>(
    page: &PageHeader,
    cursor: I,
    chunk_bytes: usize,
    tx: &mpsc::Sender<BodyChunk>,
) -> Result<(), DeliveryError>
where
    I: ExactSizeIterator<Item = Product>,
{
    let mut chunker = ByteChunker::new(chunk_bytes);
    let total = cursor.len();
    let mut chunks = 0usize;

    if let Some(chunk) = chunker.push(&page.head(Strategy::Chunked))? {
        send_chunk(tx, chunk).await?;
        chunks += 1;
    }

    for product in cursor {
        let view = ProductView::from(&product);
        if let Some(chunk) = chunker.push(&ProductRow { product: &view })? {
            send_chunk(tx, chunk).await?;
            chunks += 1;
        }
    }

    if let Some(chunk) = chunker.push(&ListingTail)? {
        send_chunk(tx, chunk).await?;
        chunks += 1;
    }
    if let Some(chunk) = chunker.finish() {
        send_chunk(tx, chunk).await?;
        chunks += 1;
    }

    tracing::debug!(rows = total, chunks, chunk_bytes, "chunked delivery complete");
    Ok(())
}

async fn send_chunk(tx: &mpsc::Sender<BodyChunk>, chunk: Bytes) -> Result<(), DeliveryError> {
    tx.send(Ok(chunk)).await.map_err(|_| {
        tracing::debug!("client disconnected, stopping chunked delivery");
        DeliveryError::ConsumerDisconnected
    })
}

/// Wrap a body stream into an HTML response.
///
/// Errors are reported here because the client only sees the connection
/// drop.
pub fn html_stream<S>(body: S) -> Response
where
    S: Stream<Item = BodyChunk> + Send + 'static,
{
    let body = body.inspect_err(report_stream_error);
    (
        [(header::CONTENT_TYPE, HTML_CONTENT_TYPE)],
        Body::from_stream(body),
    )
        .into_response()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::num::NonZeroUsize;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use futures::{StreamExt, stream};

    use super::*;
    use crate::delivery::source::tests::{product, source_of};
    use crate::delivery::{DataDriver, ReplayCursor, normalize_names};
    use crate::store::{ProductStream, StoreError};

    const ROW: &str = r#"<tr class="product""#;

    fn demo() -> Vec<Product> {
        vec![
            product("Televisor", 45689),
            product("Radio", 8900),
            product("Laptop", 78912),
        ]
    }

    fn as_text(chunk: &Bytes) -> &str {
        std::str::from_utf8(chunk).unwrap()
    }

    #[test]
    fn test_chunker_flushes_at_fragment_boundaries() {
        let view = ProductView::from(&product("Radio", 8900));
        let mut chunker = ByteChunker::new(300);
        let mut chunks = Vec::new();
        for _ in 0..20 {
            if let Some(chunk) = chunker.push(&ProductRow { product: &view }).unwrap() {
                chunks.push(chunk);
            }
        }
        chunks.extend(chunker.finish());

        let rows: usize = chunks.iter().map(|c| as_text(c).matches(ROW).count()).sum();
        assert_eq!(rows, 20);
        for chunk in &chunks[..chunks.len() - 1] {
            assert!(chunk.len() >= 300);
        }
        for chunk in &chunks {
            let text = as_text(chunk);
            assert_eq!(text.matches("<tr").count(), text.matches("</tr>").count());
        }
    }

    #[test]
    fn test_chunker_accepts_huge_threshold() {
        let view = ProductView::from(&product("Radio", 8900));
        let mut chunker = ByteChunker::new(usize::MAX);
        for _ in 0..3 {
            assert!(chunker.push(&ProductRow { product: &view }).unwrap().is_none());
        }
        let rest = chunker.finish().unwrap();
        assert_eq!(as_text(&rest).matches(ROW).count(), 3);
    }

    #[tokio::test]
    async fn test_chunked_body_replays_whole_rows() {
        let repeat = 50;
        let items: Arc<[Product]> = demo().into();
        let cursor = ReplayCursor::new(items, repeat);

        let chunks: Vec<Bytes> = chunked_body(PageHeader::listing(None), cursor, 1024, 2)
            .map(Result::unwrap)
            .collect()
            .await;

        assert!(chunks.len() > 1);
        for chunk in &chunks[..chunks.len() - 1] {
            assert!(chunk.len() >= 1024);
        }

        let mut body = String::new();
        for chunk in &chunks {
            let text = as_text(chunk);
            assert_eq!(text.matches("<tr").count(), text.matches("</tr>").count());
            body.push_str(text);
        }
        assert_eq!(body.matches(ROW).count(), repeat * 3);
        assert!(body.starts_with("<!DOCTYPE html>"));
        assert!(body.trim_end().ends_with("</html>"));
    }

    #[tokio::test]
    async fn test_chunked_body_stops_when_client_leaves() {
        let rendered = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&rendered);
        let items: Arc<[Product]> = demo().into();
        let cursor = ReplayCursor::new(items, 5000).inspect(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let total = 5000 * 3;
        let mut body = chunked_body(PageHeader::listing(None), cursor, 256, 1);

        assert!(body.next().await.unwrap().is_ok());
        drop(body);

        // The producer task owns the only other handle to the counter.
        let finished = tokio::time::timeout(Duration::from_secs(5), async {
            while Arc::strong_count(&rendered) > 1 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(finished.is_ok(), "producer still running after disconnect");

        let after_drop = rendered.load(Ordering::SeqCst);
        assert!(after_drop < total);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(rendered.load(Ordering::SeqCst), after_drop);
    }

    #[tokio::test]
    async fn test_data_driven_body_one_chunk_per_batch() {
        let driver = DataDriver::new(NonZeroUsize::new(2).unwrap(), None);
        let items = normalize_names(source_of(vec![
            product("Televisor", 45689),
            product("Radio", 8900),
        ]));

        let chunks: Vec<Bytes> = data_driven_body(PageHeader::listing(None), driver.start(items))
            .map(Result::unwrap)
            .collect()
            .await;

        // head, one batch, tail
        assert_eq!(chunks.len(), 3);
        let rows = as_text(&chunks[1]);
        assert_eq!(rows.matches(ROW).count(), 2);
        assert!(rows.contains("TELEVISOR"));
        assert!(rows.contains("RADIO"));
        assert!(as_text(&chunks[2]).contains("</html>"));
    }

    #[tokio::test]
    async fn test_data_driven_body_aborts_on_store_error() {
        let driver = DataDriver::new(NonZeroUsize::new(2).unwrap(), None);
        let items: ProductStream = Box::pin(stream::iter(vec![
            Ok(product("Televisor", 45689)),
            Ok(product("Radio", 8900)),
            Err(StoreError::Unavailable("connection reset".into())),
        ]));

        let chunks: Vec<BodyChunk> =
            data_driven_body(PageHeader::listing(None), driver.start(items))
                .collect()
                .await;

        assert_eq!(chunks.len(), 3);
        assert!(chunks[0].is_ok());
        assert!(chunks[1].is_ok());
        assert!(matches!(
            chunks[2],
            Err(DeliveryError::StoreUnavailable(_))
        ));
        let flushed: String = chunks[..2]
            .iter()
            .map(|c| as_text(c.as_ref().unwrap()).to_string())
            .collect();
        assert!(!flushed.contains("</html>"));
    }

    #[tokio::test]
    async fn test_data_driven_body_flushes_partial_batch_before_error() {
        let driver = DataDriver::new(NonZeroUsize::new(2).unwrap(), None);
        let items: ProductStream = Box::pin(stream::iter(vec![
            Ok(product("Televisor", 45689)),
            Ok(product("Radio", 8900)),
            Ok(product("Laptop", 78912)),
            Err(StoreError::Unavailable("connection reset".into())),
        ]));

        let chunks: Vec<BodyChunk> =
            data_driven_body(PageHeader::listing(None), driver.start(items))
                .collect()
                .await;

        // head, two batches, error
        assert_eq!(chunks.len(), 4);
        assert!(as_text(chunks[2].as_ref().unwrap()).contains("Laptop"));
        assert!(chunks[3].is_err());
    }
}
