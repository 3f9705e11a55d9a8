//! Application state shared across handlers.

use std::sync::Arc;

use autosalon_sync::{CarsContext, FunctionsClient, NetworkMonitor, SettingsStore};
use tokio_util::sync::CancellationToken;

use crate::config::StorefrontConfig;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`. Shared lists live in the [`CarsContext`];
/// handlers read clones and change them only through its operations.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    context: CarsContext,
    monitor: NetworkMonitor,
    functions: FunctionsClient,
    settings: SettingsStore,
    shutdown: CancellationToken,
}

impl AppState {
    #[must_use]
    pub fn new(
        config: StorefrontConfig,
        context: CarsContext,
        monitor: NetworkMonitor,
        functions: FunctionsClient,
        settings: SettingsStore,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                context,
                monitor,
                functions,
                settings,
                shutdown,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// The in-memory view of cars, orders and favorites.
    #[must_use]
    pub fn context(&self) -> &CarsContext {
        &self.inner.context
    }

    #[must_use]
    pub fn monitor(&self) -> &NetworkMonitor {
        &self.inner.monitor
    }

    #[must_use]
    pub fn functions(&self) -> &FunctionsClient {
        &self.inner.functions
    }

    #[must_use]
    pub fn settings(&self) -> &SettingsStore {
        &self.inner.settings
    }

    /// Token for one request's backend calls; fires on server shutdown.
    #[must_use]
    pub fn request_token(&self) -> CancellationToken {
        self.inner.shutdown.child_token()
    }
}
