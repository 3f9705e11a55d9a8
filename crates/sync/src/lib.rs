//! Autosalon Sync - keeps the site's in-memory view of the hosted backend fresh.
//!
//! # Architecture
//!
//! ```text
//! NetworkMonitor ──transitions──▶ CarsContext ◀── storefront handlers
//!                                   │
//!                      FavoritesSync / OrdersSync
//!                                   │
//!                           dyn RemoteStore (RestClient | InMemoryStore)
//! ```
//!
//! The hosted backend is the source of truth. [`CarsContext`] mirrors cars,
//! orders and favorites in memory, reloads them on demand and does one full
//! resync whenever the [`NetworkMonitor`] reports that the backend became
//! reachable again. Every async operation takes a
//! [`tokio_util::sync::CancellationToken`] and never commits results once the
//! token is cancelled.
//!
//! # Modules
//!
//! - [`remote`] - Remote data client trait and its REST implementation
//! - [`functions`] - Serverless function client (AI assistant, Telegram notify)
//! - [`network`] - Network status monitor
//! - [`hooks`] - Favorites and orders synchronization hooks
//! - [`context`] - The cars context aggregating everything above
//! - [`catalog`] - Filtering, sorting, pagination and the compare list
//! - [`transfer`] - JSON import/export of the car list
//! - [`settings`] - Site settings persisted as a JSON file

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod catalog;
pub mod context;
pub mod error;
pub mod functions;
pub mod hooks;
pub mod network;
pub mod remote;
pub mod settings;
pub mod transfer;

pub use catalog::{CatalogFilter, CatalogSort, CompareList, Page};
pub use context::{CarsContext, ContextEvent, FavoritesWrite, LoadState, ReloadTrigger, ToggleResult};
pub use error::{RemoteError, SyncError};
pub use functions::{FunctionsClient, FunctionsError, NotifyResponse};
pub use hooks::{FavoritesSync, OrdersSync};
pub use network::{ConnectivityEvent, NetworkMonitor, NetworkTransition};
pub use remote::{AuthSession, RemoteConfig, RemoteStore, RestClient};
pub use settings::{SettingsError, SettingsStore, SiteSettings};
pub use transfer::ImportReport;

#[cfg(any(test, feature = "test-utils"))]
pub use remote::memory::InMemoryStore;
