//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::{ServerConfig, StreamingConfig};
use crate::store::ProductStore;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`; gives handlers the streaming settings and
/// the document store.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    store: Arc<dyn ProductStore>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(config: ServerConfig, store: Arc<dyn ProductStore>) -> Self {
        Self {
            inner: Arc::new(AppStateInner { config, store }),
        }
    }

    /// Get a reference to the streaming configuration.
    #[must_use]
    pub fn streaming(&self) -> &StreamingConfig {
        &self.inner.config.streaming
    }

    /// Get a reference to the document store.
    #[must_use]
    pub fn store(&self) -> &dyn ProductStore {
        self.inner.store.as_ref()
    }
}
