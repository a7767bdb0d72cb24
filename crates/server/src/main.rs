//! Product Stream server.
//!
//! Serves the product catalogue and its streamed listings.
//!
//! # Architecture
//!
//! - Axum web framework
//! - Askama templates for server-side rendering
//! - In-memory document store, or `PostgreSQL` when a database URL is set
//! - Bounded channels between store cursors and response bodies

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use product_stream_server::{
    app,
    config::ServerConfig,
    seed::seed_demo_products,
    state::AppState,
    store::{MemoryProductStore, PgProductStore, ProductStore},
};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ServerConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

/// Connect the configured document store.
async fn connect_store(config: &ServerConfig) -> Arc<dyn ProductStore> {
    match &config.database_url {
        Some(url) => {
            let store = PgProductStore::connect(url)
                .await
                .expect("Failed to connect to database");
            store.migrate().await.expect("Failed to run migrations");
            tracing::info!("PostgreSQL product store ready");
            Arc::new(store)
        }
        None => {
            tracing::info!("No database configured, using in-memory product store");
            Arc::new(MemoryProductStore::new())
        }
    }
}

#[tokio::main]
async fn main() {
    // Load configuration from environment (needed for Sentry init)
    let config = ServerConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    // Initialize tracing with EnvFilter and Sentry integration
    // Defaults to info level for our crate if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "product_stream_server=info,tower_http=debug".into());

    // JSON lines when PRODUCT_STREAM_LOG_FORMAT=json, text otherwise
    let json_logs = std::env::var("PRODUCT_STREAM_LOG_FORMAT").is_ok_and(|f| f == "json");
    let json_layer =
        json_logs.then(|| tracing_subscriber::fmt::layer().json().flatten_event(true));
    let text_layer = (!json_logs).then(tracing_subscriber::fmt::layer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let store = connect_store(&config).await;

    if config.seed_on_startup {
        let seeded = seed_demo_products(store.as_ref())
            .await
            .expect("Failed to seed demonstration products");
        tracing::info!(count = seeded.len(), "Store seeded");
    }

    let addr = config.socket_addr();
    let state = AppState::new(config, store);

    tracing::info!("product-stream listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
