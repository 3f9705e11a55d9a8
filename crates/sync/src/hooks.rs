//! Favorites and orders synchronization hooks.
//!
//! Thin wrappers around [`RemoteStore`] that load and save one collection
//! each. The `load_*` variants fail open: a remote error is logged and an
//! empty collection is returned so the public catalog keeps rendering. The
//! `try_*` variants return the error for callers that keep cached state.
//!
//! Every call races the remote request against a [`CancellationToken`]; a
//! cancelled call drops the in-flight request and reports
//! [`SyncError::Cancelled`].

use std::future::Future;
use std::sync::Arc;

use autosalon_core::{FavoriteOwner, FavoriteSet, Order};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::error::{RemoteError, SyncError};
use crate::remote::RemoteStore;

/// Run a remote call unless `cancel` fires first.
///
/// # Errors
///
/// Returns [`SyncError::Cancelled`] if the token fired, otherwise the remote error.
pub async fn cancellable<T>(
    cancel: &CancellationToken,
    call: impl Future<Output = Result<T, RemoteError>>,
) -> Result<T, SyncError> {
    if cancel.is_cancelled() {
        return Err(SyncError::Cancelled);
    }
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(SyncError::Cancelled),
        result = call => result.map_err(SyncError::from),
    }
}

/// Loads and saves a visitor's favorite set.
#[derive(Clone)]
pub struct FavoritesSync {
    remote: Arc<dyn RemoteStore>,
}

impl FavoritesSync {
    #[must_use]
    pub fn new(remote: Arc<dyn RemoteStore>) -> Self {
        Self { remote }
    }

    /// Fetch the owner's favorite set.
    ///
    /// # Errors
    ///
    /// Returns the remote error or [`SyncError::Cancelled`].
    pub async fn try_load_favorites(
        &self,
        owner: &FavoriteOwner,
        cancel: &CancellationToken,
    ) -> Result<FavoriteSet, SyncError> {
        cancellable(cancel, self.remote.fetch_favorites(owner)).await
    }

    /// Fetch the owner's favorite set, or an empty set on any failure.
    #[instrument(skip(self, cancel), fields(owner = %owner))]
    pub async fn load_favorites(
        &self,
        owner: &FavoriteOwner,
        cancel: &CancellationToken,
    ) -> FavoriteSet {
        match self.try_load_favorites(owner, cancel).await {
            Ok(ids) => ids,
            Err(SyncError::Cancelled) => {
                debug!("Favorites load cancelled");
                FavoriteSet::new()
            }
            Err(e) => {
                warn!(error = %e, "Failed to load favorites, using empty set");
                FavoriteSet::new()
            }
        }
    }

    /// Replace the owner's remote favorite set.
    ///
    /// # Errors
    ///
    /// Returns the remote error or [`SyncError::Cancelled`].
    pub async fn try_save_favorites(
        &self,
        owner: &FavoriteOwner,
        ids: &FavoriteSet,
        cancel: &CancellationToken,
    ) -> Result<(), SyncError> {
        cancellable(cancel, self.remote.replace_favorites(owner, ids)).await
    }

    /// Replace the owner's remote favorite set, reporting success.
    #[instrument(skip(self, ids, cancel), fields(owner = %owner, count = ids.len()))]
    pub async fn save_favorites(
        &self,
        owner: &FavoriteOwner,
        ids: &FavoriteSet,
        cancel: &CancellationToken,
    ) -> bool {
        match self.try_save_favorites(owner, ids, cancel).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Failed to save favorites");
                false
            }
        }
    }
}

/// Loads the order list for the back-office.
#[derive(Clone)]
pub struct OrdersSync {
    remote: Arc<dyn RemoteStore>,
}

impl OrdersSync {
    #[must_use]
    pub fn new(remote: Arc<dyn RemoteStore>) -> Self {
        Self { remote }
    }

    /// Fetch all orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns the remote error or [`SyncError::Cancelled`].
    pub async fn try_load_orders(&self, cancel: &CancellationToken) -> Result<Vec<Order>, SyncError> {
        let mut orders = cancellable(cancel, self.remote.fetch_orders()).await?;
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    /// Fetch all orders, or an empty list on any failure.
    #[instrument(skip(self, cancel))]
    pub async fn load_orders(&self, cancel: &CancellationToken) -> Vec<Order> {
        match self.try_load_orders(cancel).await {
            Ok(orders) => orders,
            Err(SyncError::Cancelled) => {
                debug!("Orders load cancelled");
                Vec::new()
            }
            Err(e) => {
                warn!(error = %e, "Failed to load orders, using empty list");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use autosalon_core::CarId;

    use super::*;
    use crate::remote::memory::InMemoryStore;

    fn setup() -> (Arc<InMemoryStore>, FavoritesSync) {
        let store = Arc::new(InMemoryStore::new());
        let sync = FavoritesSync::new(store.clone());
        (store, sync)
    }

    #[tokio::test]
    async fn test_save_then_load_roundtrip() {
        let (_, sync) = setup();
        let owner = FavoriteOwner::new("visitor-a");
        let cancel = CancellationToken::new();
        let ids: FavoriteSet = [CarId::generate(), CarId::generate()].into_iter().collect();

        assert!(sync.save_favorites(&owner, &ids, &cancel).await);
        assert_eq!(sync.load_favorites(&owner, &cancel).await, ids);
    }

    #[tokio::test]
    async fn test_load_fails_open() {
        let (store, sync) = setup();
        let owner = FavoriteOwner::new("visitor-a");
        let cancel = CancellationToken::new();
        store
            .replace_favorites(&owner, &std::iter::once(CarId::generate()).collect())
            .await
            .unwrap();

        store.set_offline(true);
        assert!(sync.load_favorites(&owner, &cancel).await.is_empty());
        assert!(sync.try_load_favorites(&owner, &cancel).await.is_err());
    }

    #[tokio::test]
    async fn test_save_reports_failure() {
        let (store, sync) = setup();
        store.set_offline(true);
        let ok = sync
            .save_favorites(
                &FavoriteOwner::new("visitor-a"),
                &FavoriteSet::new(),
                &CancellationToken::new(),
            )
            .await;
        assert!(!ok);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_in_flight_call() {
        let (store, sync) = setup();
        store.set_latency(Some(Duration::from_secs(30)));
        let cancel = CancellationToken::new();

        let owner = FavoriteOwner::new("visitor-a");
        let call = sync.try_load_favorites(&owner, &cancel);
        let canceller = async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            cancel.cancel();
        };
        let (result, ()) = tokio::join!(call, canceller);
        assert!(matches!(result, Err(SyncError::Cancelled)));
    }

    #[tokio::test]
    async fn test_already_cancelled_token_skips_remote() {
        let store = Arc::new(InMemoryStore::new());
        let orders = OrdersSync::new(store.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(orders.load_orders(&cancel).await.is_empty());
        assert_eq!(store.calls("fetch_orders"), 0);
    }
}
