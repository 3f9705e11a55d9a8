//! Autosalon Storefront - public car catalog and admin back-office.
//!
//! This binary serves the site on port 3000 by default.
//!
//! # Architecture
//!
//! - Axum web framework, Askama templates for server-side rendering
//! - Hosted backend (REST tables, auth, storage, functions) as the source of truth
//! - [`autosalon_sync::CarsContext`] keeps cars, orders and favorites in memory
//! - A background probe drives the network monitor; coming back online
//!   triggers one full resync
//!
//! # Security
//!
//! The back-office gate only protects rendering. The backend's row-level
//! access rules must still restrict writes to signed-in staff.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::net::SocketAddr;
use std::sync::Arc;

use autosalon_storefront::config::{ConfigError, StorefrontConfig};
use autosalon_storefront::{AppState, app};
use autosalon_sync::network::spawn_probe;
use autosalon_sync::{
    CarsContext, FunctionsClient, FunctionsError, NetworkMonitor, RemoteError, RemoteStore,
    RestClient, SettingsStore,
};
use sentry::integrations::tracing as sentry_tracing;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Failures that stop the server from starting.
#[derive(Debug, Error)]
enum StartupError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("backend client: {0}")]
    Remote(#[from] RemoteError),

    #[error("functions client: {0}")]
    Functions(#[from] FunctionsError),

    #[error("server: {0}")]
    Io(#[from] std::io::Error),
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
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

fn init_tracing() {
    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "autosalon_storefront=info,autosalon_sync=info,tower_http=debug".into()
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    // Load configuration from environment (needed for Sentry init)
    let config = StorefrontConfig::from_env()?;

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);
    init_tracing();

    let shutdown = CancellationToken::new();

    let remote: Arc<dyn RemoteStore> = Arc::new(RestClient::new(config.backend.remote_config())?);
    let functions = FunctionsClient::new(&config.backend.remote_config())?;
    let settings = SettingsStore::load(config.settings_path.clone());
    let context = CarsContext::new(Arc::clone(&remote));

    // Assume online until the first probe says otherwise
    let monitor = NetworkMonitor::new(true);
    let probe = spawn_probe(
        monitor.clone(),
        remote,
        config.probe_interval,
        shutdown.child_token(),
    );
    let watcher = context.watch_network(&monitor, shutdown.child_token());

    // Initial load runs in the background; the first page view waits for it
    // only if it has not started yet
    let init_context = context.clone();
    let init_token = shutdown.child_token();
    tokio::spawn(async move { init_context.init(&init_token).await });

    let addr = config.socket_addr();
    let state = AppState::new(config, context, monitor, functions, settings, shutdown.clone());

    let app = app(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("storefront listening on {}", addr);

    let server_shutdown = shutdown.clone();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_signal().await;
        server_shutdown.cancel();
    })
    .await?;

    // Background tasks observe the cancelled token and exit
    shutdown.cancel();
    let _ = tokio::join!(probe, watcher);
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
