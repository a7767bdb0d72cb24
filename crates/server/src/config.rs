//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All variables are optional.
//!
//! ## Server
//! - `PRODUCT_STREAM_HOST` - Bind address (default: 127.0.0.1)
//! - `PRODUCT_STREAM_PORT` - Listen port (default: 8080)
//! - `PRODUCT_STREAM_DATABASE_URL` - `PostgreSQL` connection string; falls back
//!   to `DATABASE_URL`. Without either, an in-memory store is used.
//! - `PRODUCT_STREAM_SEED` - Clear and seed the demonstration products on
//!   startup (default: true)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//!
//! ## Streaming
//! - `PRODUCT_STREAM_FULL_WARN_THRESHOLD` - Item count above which the
//!   materialized listing logs a warning (default: 2000)
//! - `PRODUCT_STREAM_BATCH_SIZE` - Items per batch on `/listar-datadriver`
//!   (default: 2)
//! - `PRODUCT_STREAM_ITEM_DELAY_MS` - Artificial delay per item on
//!   `/listar-datadriver`, 0 disables it (default: 1000)
//! - `PRODUCT_STREAM_REPEAT` - Replays of the listing on the chunked routes
//!   (default: 5000)
//! - `PRODUCT_STREAM_FULL_CHUNK_BYTES` - Flush threshold for `/listar-full`
//!   (default: 8192)
//! - `PRODUCT_STREAM_CHUNKED_CHUNK_BYTES` - Flush threshold for
//!   `/listar-chunked` (default: 1024)
//! - `PRODUCT_STREAM_BUFFER_CHUNKS` - Rendered chunks buffered ahead of the
//!   client on the chunked routes (default: 4)

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Server application configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// `PostgreSQL` connection URL (contains password); `None` selects the
    /// in-memory store
    pub database_url: Option<SecretString>,
    /// Whether to reset the store to the demonstration products on startup
    pub seed_on_startup: bool,
    /// Delivery strategy tuning
    pub streaming: StreamingConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Tuning knobs for the three delivery strategies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamingConfig {
    /// Item count above which full materialization logs a warning.
    pub full_warn_threshold: usize,
    /// Items per batch in element-count-driven streaming.
    pub batch_size: NonZeroUsize,
    /// Artificial per-item delay in element-count-driven streaming.
    pub item_delay: Option<Duration>,
    /// How many times the chunked routes replay the listing.
    pub repeat: NonZeroUsize,
    /// Flush threshold in bytes for `/listar-full`.
    pub full_chunk_bytes: NonZeroUsize,
    /// Flush threshold in bytes for `/listar-chunked`.
    pub chunked_chunk_bytes: NonZeroUsize,
    /// Rendered chunks that may wait in the response channel.
    pub buffer_chunks: NonZeroUsize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            full_warn_threshold: 2000,
            batch_size: NonZeroUsize::new(2).unwrap_or(NonZeroUsize::MIN),
            item_delay: Some(Duration::from_secs(1)),
            repeat: NonZeroUsize::new(5000).unwrap_or(NonZeroUsize::MIN),
            full_chunk_bytes: NonZeroUsize::new(8192).unwrap_or(NonZeroUsize::MIN),
            chunked_chunk_bytes: NonZeroUsize::new(1024).unwrap_or(NonZeroUsize::MIN),
            buffer_chunks: NonZeroUsize::new(4).unwrap_or(NonZeroUsize::MIN),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8080,
            database_url: None,
            seed_on_startup: true,
            streaming: StreamingConfig::default(),
            sentry_dsn: None,
            sentry_environment: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let host = parse_or(&lookup, "PRODUCT_STREAM_HOST", defaults.host)?;
        let port = parse_or(&lookup, "PRODUCT_STREAM_PORT", defaults.port)?;
        let database_url = lookup("PRODUCT_STREAM_DATABASE_URL")
            .or_else(|| lookup("DATABASE_URL"))
            .filter(|url| !url.trim().is_empty())
            .map(SecretString::from);
        let seed_on_startup = parse_or(&lookup, "PRODUCT_STREAM_SEED", defaults.seed_on_startup)?;
        let streaming = StreamingConfig::from_lookup(&lookup)?;

        Ok(Self {
            host,
            port,
            database_url,
            seed_on_startup,
            streaming,
            sentry_dsn: lookup("SENTRY_DSN"),
            sentry_environment: lookup("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl StreamingConfig {
    fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let delay_ms = parse_or(
            lookup,
            "PRODUCT_STREAM_ITEM_DELAY_MS",
            defaults
                .item_delay
                .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
        )?;

        Ok(Self {
            full_warn_threshold: parse_or(
                lookup,
                "PRODUCT_STREAM_FULL_WARN_THRESHOLD",
                defaults.full_warn_threshold,
            )?,
            batch_size: parse_or(lookup, "PRODUCT_STREAM_BATCH_SIZE", defaults.batch_size)?,
            item_delay: (delay_ms > 0).then(|| Duration::from_millis(delay_ms)),
            repeat: parse_or(lookup, "PRODUCT_STREAM_REPEAT", defaults.repeat)?,
            full_chunk_bytes: parse_or(
                lookup,
                "PRODUCT_STREAM_FULL_CHUNK_BYTES",
                defaults.full_chunk_bytes,
            )?,
            chunked_chunk_bytes: parse_or(
                lookup,
                "PRODUCT_STREAM_CHUNKED_CHUNK_BYTES",
                defaults.chunked_chunk_bytes,
            )?,
            buffer_chunks: parse_or(
                lookup,
                "PRODUCT_STREAM_BUFFER_CHUNKS",
                defaults.buffer_chunks,
            )?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse a variable if present, otherwise return the default.
fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}
