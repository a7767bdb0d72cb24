//! Integration tests for Product Stream.
//!
//! Every test serves the real router on `127.0.0.1:0` and talks to it over
//! HTTP with `reqwest`.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p product-stream-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `listings` - the four listing routes and their delivery strategies
//! - `form` - create, edit, cancel and delete
//! - `api` - JSON API and health checks

use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{StreamExt, stream};
use reqwest::Client;

use product_stream_core::{Product, ProductId};
use product_stream_server::{
    app,
    config::ServerConfig,
    seed::seed_demo_products,
    state::AppState,
    store::{MemoryProductStore, ProductStore, ProductStream, StoreError},
};

/// Replays used by the chunked routes in tests.
pub const TEST_REPEAT: usize = 20;

/// Configuration for tests: no artificial delay and a short replay.
#[must_use]
pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.streaming.item_delay = None;
    config.streaming.repeat = NonZeroUsize::new(TEST_REPEAT).unwrap_or(NonZeroUsize::MIN);
    config.streaming.full_chunk_bytes = NonZeroUsize::new(2048).unwrap_or(NonZeroUsize::MIN);
    config.streaming.chunked_chunk_bytes = NonZeroUsize::new(512).unwrap_or(NonZeroUsize::MIN);
    config
}

/// A running server and a client pointed at it.
pub struct TestContext {
    pub client: Client,
    pub base_url: String,
}

impl TestContext {
    /// Serve the router over `store` on an ephemeral port.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound or the client cannot be built.
    pub async fn spawn(store: Arc<dyn ProductStore>, config: ServerConfig) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Failed to read local address");

        let router = app(AppState::new(config, store));
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                panic!("test server failed: {e}");
            }
        });

        let client = Client::builder()
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: format!("http://{addr}"),
        }
    }

    /// Serve an in-memory store holding the demonstration products.
    ///
    /// # Panics
    ///
    /// Panics if seeding fails.
    pub async fn seeded() -> Self {
        let store = MemoryProductStore::new();
        seed_demo_products(&store)
            .await
            .expect("Failed to seed test store");
        Self::spawn(Arc::new(store), test_config()).await
    }

    /// Absolute URL for `path`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

/// Store whose listing yields `fail_after` products and then an error.
///
/// Lookups and writes delegate to an inner in-memory store; the readiness
/// ping always fails.
pub struct FailingStore {
    inner: MemoryProductStore,
    fail_after: usize,
}

impl FailingStore {
    /// Wrap a store seeded with the demonstration products.
    ///
    /// # Panics
    ///
    /// Panics if seeding fails.
    pub async fn seeded(fail_after: usize) -> Self {
        let inner = MemoryProductStore::new();
        seed_demo_products(&inner)
            .await
            .expect("Failed to seed test store");
        Self { inner, fail_after }
    }
}

#[async_trait]
impl ProductStore for FailingStore {
    fn find_all(&self) -> ProductStream {
        let error = stream::once(async {
            Err(StoreError::Unavailable("connection reset by peer".into()))
        });
        Box::pin(self.inner.find_all().take(self.fail_after).chain(error))
    }

    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, StoreError> {
        self.inner.find_by_id(id).await
    }

    async fn save(&self, product: Product) -> Result<Product, StoreError> {
        self.inner.save(product).await
    }

    async fn delete(&self, id: &ProductId) -> Result<bool, StoreError> {
        self.inner.delete(id).await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.inner.clear().await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("ping failed".into()))
    }
}
