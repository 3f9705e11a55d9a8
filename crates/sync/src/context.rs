//! The cars context: one in-memory view of cars, orders and favorites.
//!
//! All shared lists are mutated here and nowhere else; handlers get clones
//! and request changes through the operations below.
//!
//! # Consistency
//!
//! - Car reloads carry a generation number. A response that arrives after a
//!   newer reload started (or after an import replaced the list) is dropped.
//! - Favorite writes are applied locally first and tagged with a pending
//!   write token. When the remote call resolves, the write is kept
//!   ([`FavoritesWrite::Committed`]), undone ([`FavoritesWrite::RolledBack`])
//!   or ignored because a newer write replaced it
//!   ([`FavoritesWrite::Superseded`]).
//! - A cancelled operation never commits its result.
//!
//! - An owner's favorites are never written on top of a set that failed to
//!   load. Owners idle longer than a session are dropped from the mirror.
//!
//! Concurrent writers are still last-writer-wins at the backend.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use autosalon_core::{
    Car, CarDraft, CarId, DeleteOutcome, FavoriteOwner, FavoriteSet, NewOrder, Order, OrderId,
    OrderStatus,
};
use chrono::Utc;
use moka::future::Cache;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock, broadcast};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::{RemoteError, SyncError};
use crate::hooks::{FavoritesSync, OrdersSync, cancellable};
use crate::network::NetworkMonitor;
use crate::remote::RemoteStore;
use crate::transfer::{self, ImportReport};

const EVENT_BUFFER: usize = 64;

/// Matches the storefront session expiry (30 days of inactivity).
pub const FAVORITES_IDLE: Duration = Duration::from_secs(30 * 24 * 60 * 60);

const FAVORITES_CAPACITY: u64 = 100_000;

/// Favorite sets fetched at once during a resync.
const RESYNC_CONCURRENCY: usize = 8;

/// Lifecycle of the car list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum LoadState {
    Uninitialized,
    Loading,
    Ready,
    Error(String),
}

impl LoadState {
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Error(_) => "error",
        }
    }
}

/// What asked for a car reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadTrigger {
    Mount,
    Navigation,
    Reconnect,
    /// The visitor pressed the refresh button.
    Manual,
}

impl ReloadTrigger {
    /// Only an explicit refresh or a reconnect leaves the error state.
    const fn retries_after_error(self) -> bool {
        matches!(self, Self::Manual | Self::Reconnect)
    }
}

/// Resolution of a favorites write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FavoritesWrite {
    /// The backend accepted the write and the local value stands.
    Committed,
    /// The backend call failed or was cancelled; the previous local value was restored.
    RolledBack,
    /// A newer write for the same owner started before this one resolved.
    Superseded,
}

/// Result of toggling one favorite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ToggleResult {
    /// Membership after the write resolved.
    pub is_favorite: bool,
    pub write: FavoritesWrite,
}

/// Change notifications for UI consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextEvent {
    CarsReloaded { count: usize },
    CarsChanged,
    OrdersChanged { count: usize },
    FavoritesChanged { owner: FavoriteOwner },
    /// A full resync after reconnect finished.
    Resynced,
}

#[derive(Default)]
struct FavoriteMirror {
    ids: FavoriteSet,
    pending: Option<u64>,
    /// Set once `ids` matched the backend, by a load or a committed write.
    loaded: bool,
}

type SharedMirror = Arc<Mutex<FavoriteMirror>>;

struct ContextState {
    cars: Vec<Car>,
    orders: Vec<Order>,
    load_state: LoadState,
}

struct ContextInner {
    remote: Arc<dyn RemoteStore>,
    favorites_sync: FavoritesSync,
    orders_sync: OrdersSync,
    state: RwLock<ContextState>,
    favorites: Cache<FavoriteOwner, SharedMirror>,
    cars_generation: AtomicU64,
    orders_generation: AtomicU64,
    write_tokens: AtomicU64,
    events: broadcast::Sender<ContextEvent>,
}

/// Shared in-memory view of the backend. Cheap to clone.
#[derive(Clone)]
pub struct CarsContext {
    inner: Arc<ContextInner>,
}

impl CarsContext {
    #[must_use]
    pub fn new(remote: Arc<dyn RemoteStore>) -> Self {
        Self::with_favorites_idle(remote, FAVORITES_IDLE)
    }

    /// Like [`Self::new`], dropping an owner's mirrored favorites after
    /// `idle` without access.
    #[must_use]
    pub fn with_favorites_idle(remote: Arc<dyn RemoteStore>, idle: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let favorites = Cache::builder()
            .max_capacity(FAVORITES_CAPACITY)
            .time_to_idle(idle)
            .build();
        Self {
            inner: Arc::new(ContextInner {
                favorites_sync: FavoritesSync::new(Arc::clone(&remote)),
                orders_sync: OrdersSync::new(Arc::clone(&remote)),
                remote,
                state: RwLock::new(ContextState {
                    cars: Vec::new(),
                    orders: Vec::new(),
                    load_state: LoadState::Uninitialized,
                }),
                favorites,
                cars_generation: AtomicU64::new(0),
                orders_generation: AtomicU64::new(0),
                write_tokens: AtomicU64::new(0),
                events,
            }),
        }
    }

    /// The remote store behind this context.
    #[must_use]
    pub fn remote(&self) -> &Arc<dyn RemoteStore> {
        &self.inner.remote
    }

    fn emit(&self, event: ContextEvent) {
        // Nobody listening is fine
        let _ = self.inner.events.send(event);
    }

    /// Receive change notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ContextEvent> {
        self.inner.events.subscribe()
    }

    // =========================================================================
    // Cars
    // =========================================================================

    /// Initial load of cars and orders, concurrently.
    #[instrument(skip_all)]
    pub async fn init(&self, cancel: &CancellationToken) {
        let (state, orders) = tokio::join!(
            self.reload_cars(ReloadTrigger::Mount, cancel),
            self.load_orders(cancel)
        );
        info!(state = state.as_str(), orders = orders, "Cars context initialized");
    }

    /// Reload the car list and return the resulting load state.
    ///
    /// While in [`LoadState::Error`], only [`ReloadTrigger::Manual`] and
    /// [`ReloadTrigger::Reconnect`] start a new load.
    #[instrument(skip(self, cancel))]
    pub async fn reload_cars(&self, trigger: ReloadTrigger, cancel: &CancellationToken) -> LoadState {
        let (generation, previous) = {
            let mut state = self.inner.state.write().await;
            if matches!(state.load_state, LoadState::Error(_)) && !trigger.retries_after_error() {
                debug!("Car list in error state, waiting for manual refresh");
                return state.load_state.clone();
            }
            let generation = self.inner.cars_generation.fetch_add(1, Ordering::SeqCst) + 1;
            let previous = std::mem::replace(&mut state.load_state, LoadState::Loading);
            (generation, previous)
        };

        let result = cancellable(cancel, self.inner.remote.fetch_cars()).await;

        let mut state = self.inner.state.write().await;
        if self.inner.cars_generation.load(Ordering::SeqCst) != generation {
            debug!(generation, "Discarding stale car list");
            return state.load_state.clone();
        }

        match result {
            Ok(cars) => {
                let count = cars.len();
                state.cars = cars;
                state.load_state = LoadState::Ready;
                drop(state);
                debug!(count, "Car list reloaded");
                self.emit(ContextEvent::CarsReloaded { count });
                LoadState::Ready
            }
            Err(SyncError::Cancelled) => {
                debug!("Car reload cancelled");
                state.load_state = previous;
                state.load_state.clone()
            }
            Err(e) => {
                warn!(error = %e, "Failed to load cars");
                state.load_state = LoadState::Error(e.to_string());
                state.load_state.clone()
            }
        }
    }

    /// Manual refresh, the only way out of the error state besides reconnect.
    pub async fn refresh(&self, cancel: &CancellationToken) -> LoadState {
        self.reload_cars(ReloadTrigger::Manual, cancel).await
    }

    pub async fn cars(&self) -> Vec<Car> {
        self.inner.state.read().await.cars.clone()
    }

    pub async fn car(&self, id: CarId) -> Option<Car> {
        self.inner
            .state
            .read()
            .await
            .cars
            .iter()
            .find(|car| car.id == id)
            .cloned()
    }

    pub async fn load_state(&self) -> LoadState {
        self.inner.state.read().await.load_state.clone()
    }

    /// Record a view of `id` and return the in-memory car.
    ///
    /// Returns `None` when the car is not in the current list; in that case
    /// no view is recorded. A failed remote increment is logged only.
    #[instrument(skip(self, cancel))]
    pub async fn view_car(&self, id: CarId, cancel: &CancellationToken) -> Option<Car> {
        self.car(id).await?;

        match cancellable(cancel, self.inner.remote.increment_views(id)).await {
            Ok(()) => {
                let mut state = self.inner.state.write().await;
                let car = state.cars.iter_mut().find(|car| car.id == id)?;
                car.views += 1;
                Some(car.clone())
            }
            Err(e) => {
                if !e.is_cancelled() {
                    warn!(error = %e, "Failed to record car view");
                }
                self.car(id).await
            }
        }
    }

    /// Replace the local copy of a car after the backend accepted it.
    fn replace_local(cars: &mut Vec<Car>, car: Car) {
        match cars.iter_mut().find(|c| c.id == car.id) {
            Some(existing) => *existing = car,
            None => cars.insert(0, car),
        }
    }

    /// Validate and update an existing car.
    ///
    /// # Errors
    ///
    /// Returns validation errors, the remote error, or [`SyncError::Cancelled`].
    #[instrument(skip(self, car, cancel), fields(car_id = %car.id))]
    pub async fn update_car(&self, car: Car, cancel: &CancellationToken) -> Result<Car, SyncError> {
        car.to_draft().validate()?;
        let stored = match cancellable(cancel, self.inner.remote.update_car(&car)).await {
            Ok(stored) => stored,
            Err(SyncError::Remote(RemoteError::NotFound(what))) => {
                return Err(SyncError::NotFound(what));
            }
            Err(e) => return Err(e),
        };

        Self::replace_local(&mut self.inner.state.write().await.cars, stored);
        self.emit(ContextEvent::CarsChanged);
        info!("Car updated");
        Ok(car)
    }

    /// Validate a draft and create a car from it.
    ///
    /// # Errors
    ///
    /// Returns validation errors, the remote error, or [`SyncError::Cancelled`].
    #[instrument(skip(self, draft, cancel), fields(brand = %draft.brand, model = %draft.model))]
    pub async fn add_car(&self, draft: CarDraft, cancel: &CancellationToken) -> Result<Car, SyncError> {
        draft.validate()?;
        let car = draft.into_car(CarId::generate(), Utc::now());
        let stored = cancellable(cancel, self.inner.remote.insert_car(&car)).await?;

        self.inner.state.write().await.cars.insert(0, stored.clone());
        self.emit(ContextEvent::CarsChanged);
        info!(car_id = %stored.id, "Car added");
        Ok(stored)
    }

    /// Delete a car. A car the backend does not know is [`DeleteOutcome::NotFound`].
    #[instrument(skip(self, cancel))]
    pub async fn delete_car(&self, id: CarId, cancel: &CancellationToken) -> DeleteOutcome {
        let outcome = match cancellable(cancel, self.inner.remote.delete_car(id)).await {
            Ok(true) => DeleteOutcome::Success,
            Ok(false) | Err(SyncError::Remote(RemoteError::NotFound(_))) => DeleteOutcome::NotFound,
            Err(e) => {
                warn!(error = %e, "Failed to delete car");
                return DeleteOutcome::Failure(e.to_string());
            }
        };

        // The local copy goes either way: deleted now, or already gone remotely
        let removed = {
            let mut state = self.inner.state.write().await;
            let before = state.cars.len();
            state.cars.retain(|car| car.id != id);
            state.cars.len() != before
        };
        if removed {
            self.emit(ContextEvent::CarsChanged);
        }
        info!(outcome = %outcome, "Car delete resolved");
        outcome
    }

    /// Export the in-memory car list as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub async fn export_cars_data(&self) -> Result<String, SyncError> {
        let state = self.inner.state.read().await;
        Ok(transfer::export_cars(&state.cars)?)
    }

    /// Import cars from a JSON array.
    ///
    /// Every valid record is upserted remotely. The in-memory list is then
    /// replaced by the records that made it; earlier successes are never
    /// rolled back when a later record fails. A cancelled import stops at the
    /// current record and leaves the in-memory list untouched.
    #[instrument(skip(self, data, cancel), fields(bytes = data.len()))]
    pub async fn import_cars_data(&self, data: &str, cancel: &CancellationToken) -> ImportReport {
        let mut report = ImportReport::default();
        let records = match transfer::parse_import(data, Utc::now()) {
            Ok(records) => records,
            Err(message) => {
                warn!(error = %message, "Rejected import file");
                report.errors.push(message);
                return report;
            }
        };

        report.total = records.len();
        let mut imported = Vec::with_capacity(records.len());
        let mut cancelled = false;

        for (index, record) in records.into_iter().enumerate() {
            let car = match record {
                Ok(car) => car,
                Err(reason) => {
                    report.record_failure(index, reason);
                    continue;
                }
            };
            if cancelled {
                report.record_failure(index, SyncError::Cancelled);
                continue;
            }
            match cancellable(cancel, self.inner.remote.upsert_car(&car)).await {
                Ok(stored) => {
                    report.successful += 1;
                    imported.push(stored);
                }
                Err(e) => {
                    cancelled = e.is_cancelled();
                    report.record_failure(index, e);
                }
            }
        }

        if cancelled {
            warn!(successful = report.successful, "Import cancelled, in-memory list kept");
            return report;
        }

        imported.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let count = imported.len();
        {
            let mut state = self.inner.state.write().await;
            // Invalidate any reload still in flight
            self.inner.cars_generation.fetch_add(1, Ordering::SeqCst);
            state.cars = imported;
            state.load_state = LoadState::Ready;
        }
        self.emit(ContextEvent::CarsReloaded { count });
        info!(
            total = report.total,
            successful = report.successful,
            failed = report.failed,
            "Import finished"
        );
        report
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// Reload the order list, keeping the cached list if the backend fails.
    /// Returns the number of orders held afterwards.
    #[instrument(skip_all)]
    pub async fn load_orders(&self, cancel: &CancellationToken) -> usize {
        let generation = self.inner.orders_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let result = self.inner.orders_sync.try_load_orders(cancel).await;

        let mut state = self.inner.state.write().await;
        if self.inner.orders_generation.load(Ordering::SeqCst) != generation {
            debug!(generation, "Discarding stale order list");
            return state.orders.len();
        }
        match result {
            Ok(orders) => {
                let count = orders.len();
                state.orders = orders;
                drop(state);
                self.emit(ContextEvent::OrdersChanged { count });
                count
            }
            Err(SyncError::Cancelled) => state.orders.len(),
            Err(e) => {
                warn!(error = %e, "Failed to load orders, keeping cached list");
                state.orders.len()
            }
        }
    }

    pub async fn orders(&self) -> Vec<Order> {
        self.inner.state.read().await.orders.clone()
    }

    /// Orders still waiting for a first response, for the admin badge.
    pub async fn new_order_count(&self) -> usize {
        self.inner
            .state
            .read()
            .await
            .orders
            .iter()
            .filter(|order| order.status == OrderStatus::New)
            .count()
    }

    /// Store a customer inquiry.
    ///
    /// # Errors
    ///
    /// Returns validation errors, [`SyncError::NotFound`] for an unknown car,
    /// the remote error, or [`SyncError::Cancelled`].
    #[instrument(skip(self, order, cancel), fields(car_id = %order.car_id))]
    pub async fn submit_order(&self, order: NewOrder, cancel: &CancellationToken) -> Result<Order, SyncError> {
        order.validate()?;
        if self.car(order.car_id).await.is_none() {
            return Err(SyncError::NotFound(format!("car {}", order.car_id)));
        }

        let stored = cancellable(cancel, self.inner.remote.insert_order(&order)).await?;
        let count = {
            let mut state = self.inner.state.write().await;
            self.inner.orders_generation.fetch_add(1, Ordering::SeqCst);
            state.orders.insert(0, stored.clone());
            state.orders.len()
        };
        self.emit(ContextEvent::OrdersChanged { count });
        info!(order_id = %stored.id, "Order submitted");
        Ok(stored)
    }

    /// Move an order to `status`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotFound`] for an unknown order, the remote
    /// error, or [`SyncError::Cancelled`].
    #[instrument(skip(self, cancel))]
    pub async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        cancel: &CancellationToken,
    ) -> Result<Order, SyncError> {
        let stored = match cancellable(cancel, self.inner.remote.update_order_status(id, status)).await {
            Ok(stored) => stored,
            Err(SyncError::Remote(RemoteError::NotFound(what))) => {
                return Err(SyncError::NotFound(what));
            }
            Err(e) => return Err(e),
        };

        let count = {
            let mut state = self.inner.state.write().await;
            self.inner.orders_generation.fetch_add(1, Ordering::SeqCst);
            match state.orders.iter_mut().find(|order| order.id == id) {
                Some(existing) => *existing = stored.clone(),
                None => state.orders.insert(0, stored.clone()),
            }
            state.orders.len()
        };
        self.emit(ContextEvent::OrdersChanged { count });
        info!(status = %status, "Order status updated");
        Ok(stored)
    }

    // =========================================================================
    // Favorites
    // =========================================================================

    async fn mirror(&self, owner: &FavoriteOwner) -> SharedMirror {
        self.inner
            .favorites
            .get_with(owner.clone(), async { SharedMirror::default() })
            .await
    }

    /// Local view of an owner's favorites, without touching the backend.
    async fn cached_favorites(&self, owner: &FavoriteOwner) -> FavoriteSet {
        match self.inner.favorites.get(owner).await {
            Some(mirror) => mirror.lock().await.ids.clone(),
            None => FavoriteSet::new(),
        }
    }

    /// Store a set fetched from the backend. A pending local write wins.
    async fn apply_loaded(&self, owner: &FavoriteOwner, ids: FavoriteSet) -> FavoriteSet {
        let mirror = self.mirror(owner).await;
        let mut mirror = mirror.lock().await;
        if mirror.pending.is_some() {
            debug!("Write pending, keeping local favorites");
            return mirror.ids.clone();
        }
        mirror.loaded = true;
        if mirror.ids == ids {
            return ids;
        }
        mirror.ids = ids.clone();
        drop(mirror);
        self.emit(ContextEvent::FavoritesChanged {
            owner: owner.clone(),
        });
        ids
    }

    /// The owner's favorites once they have loaded, fetching them if they
    /// never have.
    async fn loaded_favorites(
        &self,
        owner: &FavoriteOwner,
        cancel: &CancellationToken,
    ) -> Result<FavoriteSet, SyncError> {
        if let Some(mirror) = self.inner.favorites.get(owner).await {
            let mirror = mirror.lock().await;
            if mirror.loaded || mirror.pending.is_some() {
                return Ok(mirror.ids.clone());
            }
        }
        let ids = self.inner.favorites_sync.try_load_favorites(owner, cancel).await?;
        Ok(self.apply_loaded(owner, ids).await)
    }

    /// Reload an owner's favorites and return the mirrored set.
    ///
    /// On failure the cached mirror is kept, and an owner that never loaded
    /// gets no mirror at all.
    #[instrument(skip(self, cancel), fields(owner = %owner))]
    pub async fn refresh_favorites(&self, owner: &FavoriteOwner, cancel: &CancellationToken) -> FavoriteSet {
        match self.inner.favorites_sync.try_load_favorites(owner, cancel).await {
            Ok(ids) => self.apply_loaded(owner, ids).await,
            Err(e) => {
                if !e.is_cancelled() {
                    warn!(error = %e, "Failed to refresh favorites, keeping cached set");
                }
                self.cached_favorites(owner).await
            }
        }
    }

    /// Mirrored favorites of `owner`, loading them until a load succeeds.
    ///
    /// A failed load reads as the cached (possibly empty) set.
    pub async fn favorites(&self, owner: &FavoriteOwner, cancel: &CancellationToken) -> FavoriteSet {
        match self.loaded_favorites(owner, cancel).await {
            Ok(ids) => ids,
            Err(e) => {
                if !e.is_cancelled() {
                    warn!(owner = %owner, error = %e, "Failed to load favorites");
                }
                self.cached_favorites(owner).await
            }
        }
    }

    /// Replace an owner's favorites: apply locally, push remotely, then
    /// commit or roll back.
    #[instrument(skip(self, ids, cancel), fields(owner = %owner, count = ids.len()))]
    pub async fn set_favorites(
        &self,
        owner: &FavoriteOwner,
        ids: FavoriteSet,
        cancel: &CancellationToken,
    ) -> FavoritesWrite {
        let token = self.inner.write_tokens.fetch_add(1, Ordering::SeqCst) + 1;
        let mirror = self.mirror(owner).await;
        let previous = {
            let mut mirror = mirror.lock().await;
            mirror.pending = Some(token);
            std::mem::replace(&mut mirror.ids, ids.clone())
        };
        self.emit(ContextEvent::FavoritesChanged {
            owner: owner.clone(),
        });

        let result = self
            .inner
            .favorites_sync
            .try_save_favorites(owner, &ids, cancel)
            .await;

        let mut mirror = mirror.lock().await;
        if mirror.pending != Some(token) {
            debug!(token, "Favorites write superseded");
            return FavoritesWrite::Superseded;
        }
        mirror.pending = None;

        match result {
            Ok(()) => {
                mirror.loaded = true;
                FavoritesWrite::Committed
            }
            Err(e) => {
                if e.is_cancelled() {
                    debug!("Favorites write cancelled, rolling back");
                } else {
                    warn!(error = %e, "Failed to save favorites, rolling back");
                }
                mirror.ids = previous;
                drop(mirror);
                self.emit(ContextEvent::FavoritesChanged {
                    owner: owner.clone(),
                });
                FavoritesWrite::RolledBack
            }
        }
    }

    /// Flip one car in an owner's favorites.
    ///
    /// The write starts from the backend's set. If that set cannot be
    /// loaded, nothing is written and the result is
    /// [`FavoritesWrite::RolledBack`].
    pub async fn toggle_favorite(
        &self,
        owner: &FavoriteOwner,
        id: CarId,
        cancel: &CancellationToken,
    ) -> ToggleResult {
        let mut ids = match self.loaded_favorites(owner, cancel).await {
            Ok(ids) => ids,
            Err(e) => {
                if !e.is_cancelled() {
                    warn!(owner = %owner, error = %e, "Favorites not loaded, skipping toggle");
                }
                return ToggleResult {
                    is_favorite: self.cached_favorites(owner).await.contains(id),
                    write: FavoritesWrite::RolledBack,
                };
            }
        };
        let wanted = ids.toggle(id);
        let write = self.set_favorites(owner, ids, cancel).await;
        let is_favorite = match write {
            FavoritesWrite::Committed => wanted,
            FavoritesWrite::RolledBack => !wanted,
            FavoritesWrite::Superseded => self.favorites(owner, cancel).await.contains(id),
        };
        ToggleResult { is_favorite, write }
    }

    // =========================================================================
    // Reconnect
    // =========================================================================

    /// Owners with a mirror that has not idled out.
    async fn live_favorite_owners(&self) -> Vec<FavoriteOwner> {
        self.inner.favorites.run_pending_tasks().await;
        self.inner
            .favorites
            .iter()
            .map(|(owner, _)| FavoriteOwner::clone(&owner))
            .collect()
    }

    /// Refresh `owners`, at most [`RESYNC_CONCURRENCY`] at a time.
    async fn refresh_owners(&self, owners: Vec<FavoriteOwner>, cancel: &CancellationToken) {
        let mut owners = owners.into_iter();
        let mut tasks = JoinSet::new();
        loop {
            while tasks.len() < RESYNC_CONCURRENCY
                && let Some(owner) = owners.next()
            {
                let context = self.clone();
                let cancel = cancel.clone();
                tasks.spawn(async move {
                    context.refresh_favorites(&owner, &cancel).await;
                });
            }
            let Some(joined) = tasks.join_next().await else {
                break;
            };
            if let Err(e) = joined {
                warn!(error = %e, "Favorites refresh task failed");
            }
        }
    }

    /// Reload orders, cars and the favorites of every live owner, then
    /// publish [`ContextEvent::Resynced`].
    #[instrument(skip_all)]
    pub async fn full_resync(&self, cancel: &CancellationToken) {
        let owners = self.live_favorite_owners().await;
        let favorite_owners = owners.len();

        let (orders, cars) = tokio::join!(
            self.load_orders(cancel),
            self.reload_cars(ReloadTrigger::Reconnect, cancel)
        );
        self.refresh_owners(owners, cancel).await;

        info!(
            orders,
            cars = cars.as_str(),
            favorite_owners,
            "Full resync finished"
        );
        self.emit(ContextEvent::Resynced);
    }

    /// Run one [`Self::full_resync`] per offline-to-online transition until
    /// `cancel` fires. Going offline triggers nothing.
    pub fn watch_network(&self, monitor: &NetworkMonitor, cancel: CancellationToken) -> JoinHandle<()> {
        let mut transitions = monitor.subscribe();
        let monitor = monitor.clone();
        let context = self.clone();

        tokio::spawn(async move {
            loop {
                let received = tokio::select! {
                    () = cancel.cancelled() => break,
                    received = transitions.recv() => received,
                };
                match received {
                    Ok(transition) if transition.online => {
                        info!("Back online, resyncing");
                        context.full_resync(&cancel).await;
                    }
                    Ok(_) => debug!("Went offline, nothing to do"),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "Missed network transitions");
                        if monitor.is_online() {
                            context.full_resync(&cancel).await;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!("Network watcher stopped");
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use autosalon_core::{BodyType, CarPrice, Drivetrain, Engine, FuelType, Transmission};
    use rust_decimal::Decimal;

    use super::*;
    use crate::network::ConnectivityEvent;
    use crate::remote::memory::InMemoryStore;

    fn draft(brand: &str) -> CarDraft {
        CarDraft {
            brand: brand.into(),
            model: "Model".into(),
            year: 2022,
            engine: Engine {
                displacement: 2.0,
                power: 180,
                fuel_type: FuelType::Petrol,
            },
            transmission: Transmission::Automatic,
            drivetrain: Drivetrain::Awd,
            body_type: BodyType::Crossover,
            price: CarPrice::new(Decimal::new(2_500_000, 0), Decimal::ZERO),
            images: vec![],
            is_new: false,
            mileage: 15_000,
            color: None,
            description: None,
        }
    }

    fn seeded(count: usize) -> (Arc<InMemoryStore>, CarsContext, Vec<Car>) {
        let cars: Vec<Car> = (0..count)
            .map(|i| draft(&format!("Brand{i}")).into_car(CarId::generate(), Utc::now()))
            .collect();
        let store = Arc::new(InMemoryStore::new().with_cars(cars.clone()));
        let context = CarsContext::new(store.clone());
        (store, context, cars)
    }

    #[tokio::test]
    async fn test_init_loads_cars_and_orders() {
        let (store, context, _) = seeded(3);
        assert_eq!(context.load_state().await, LoadState::Uninitialized);
        context.init(&CancellationToken::new()).await;

        assert_eq!(context.load_state().await, LoadState::Ready);
        assert_eq!(context.cars().await.len(), 3);
        assert_eq!(store.calls("fetch_orders"), 1);
    }

    #[tokio::test]
    async fn test_error_state_only_left_by_manual_or_reconnect() {
        let (store, context, _) = seeded(1);
        let cancel = CancellationToken::new();
        store.set_offline(true);

        let state = context.reload_cars(ReloadTrigger::Mount, &cancel).await;
        assert!(matches!(state, LoadState::Error(_)));

        store.set_offline(false);
        let state = context.reload_cars(ReloadTrigger::Navigation, &cancel).await;
        assert!(matches!(state, LoadState::Error(_)));
        assert_eq!(store.calls("fetch_cars"), 1);

        assert_eq!(context.refresh(&cancel).await, LoadState::Ready);
        assert_eq!(context.cars().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_reload_does_not_commit() {
        let (store, context, _) = seeded(2);
        let cancel = CancellationToken::new();
        store.set_latency(Some(Duration::from_secs(10)));

        let reload = context.reload_cars(ReloadTrigger::Mount, &cancel);
        let canceller = async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            cancel.cancel();
        };
        let (state, ()) = tokio::join!(reload, canceller);

        assert_eq!(state, LoadState::Uninitialized);
        assert!(context.cars().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_reload_is_discarded() {
        let (store, context, _) = seeded(1);
        store.set_latency(Some(Duration::from_secs(10)));
        let slow_cancel = CancellationToken::new();
        let slow = {
            let context = context.clone();
            tokio::spawn(async move { context.reload_cars(ReloadTrigger::Mount, &slow_cancel).await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;

        // A newer reload finishes first, then the backend loses the car
        store.set_latency(None);
        context
            .add_car(draft("Fresh"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(
            context.reload_cars(ReloadTrigger::Manual, &CancellationToken::new()).await,
            LoadState::Ready
        );
        let fresh = context.cars().await[0].id;
        assert!(store.delete_car(fresh).await.unwrap());

        // The slow response reflects the delete but is older than the manual reload
        slow.await.unwrap();
        assert_eq!(context.cars().await.len(), 2);
    }

    #[tokio::test]
    async fn test_view_car_increments_and_returns_car() {
        let (store, context, cars) = seeded(1);
        let cancel = CancellationToken::new();
        context.init(&cancel).await;

        let viewed = context.view_car(cars[0].id, &cancel).await.unwrap();
        assert_eq!(viewed.views, 1);
        assert_eq!(store.stored_cars()[0].views, 1);

        assert!(context.view_car(CarId::generate(), &cancel).await.is_none());
        assert_eq!(store.calls("increment_views"), 1);
    }

    #[tokio::test]
    async fn test_add_car_validates() {
        let (store, context, _) = seeded(0);
        let err = context
            .add_car(draft(""), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidCar(_)));
        assert_eq!(store.calls("insert_car"), 0);
    }

    #[tokio::test]
    async fn test_update_car_returns_input_and_updates_list() {
        let (_, context, cars) = seeded(1);
        let cancel = CancellationToken::new();
        context.init(&cancel).await;

        let mut car = cars[0].clone();
        car.price.discount = Decimal::new(100_000, 0);
        let updated = context.update_car(car.clone(), &cancel).await.unwrap();
        assert_eq!(updated, car);
        assert_eq!(context.car(car.id).await.unwrap().price.discount, car.price.discount);
    }

    #[tokio::test]
    async fn test_update_unknown_car_is_not_found() {
        let (_, context, _) = seeded(0);
        let car = draft("Ghost").into_car(CarId::generate(), Utc::now());
        let err = context
            .update_car(car, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_outcomes() {
        let (store, context, cars) = seeded(1);
        let cancel = CancellationToken::new();
        context.init(&cancel).await;

        assert_eq!(context.delete_car(CarId::generate(), &cancel).await, DeleteOutcome::NotFound);

        store.fail_next("delete_car", RemoteError::Unreachable("timeout".into()));
        assert!(matches!(
            context.delete_car(cars[0].id, &cancel).await,
            DeleteOutcome::Failure(_)
        ));
        assert_eq!(context.cars().await.len(), 1);

        assert_eq!(context.delete_car(cars[0].id, &cancel).await, DeleteOutcome::Success);
        assert!(context.cars().await.is_empty());
    }

    #[tokio::test]
    async fn test_set_favorites_commits() {
        let (store, context, cars) = seeded(2);
        let owner = FavoriteOwner::new("visitor-1");
        let cancel = CancellationToken::new();

        let ids: FavoriteSet = cars.iter().map(|car| car.id).collect();
        assert_eq!(
            context.set_favorites(&owner, ids.clone(), &cancel).await,
            FavoritesWrite::Committed
        );
        assert_eq!(context.favorites(&owner, &cancel).await, ids);
        assert_eq!(store.stored_favorites(&owner), ids);
    }

    #[tokio::test]
    async fn test_set_favorites_rolls_back_on_failure() {
        let (store, context, cars) = seeded(2);
        let owner = FavoriteOwner::new("visitor-1");
        let cancel = CancellationToken::new();

        let first: FavoriteSet = std::iter::once(cars[0].id).collect();
        context.set_favorites(&owner, first.clone(), &cancel).await;

        store.set_offline(true);
        let result = context.toggle_favorite(&owner, cars[1].id, &cancel).await;
        assert_eq!(result.write, FavoritesWrite::RolledBack);
        assert!(!result.is_favorite);
        assert_eq!(context.favorites(&owner, &cancel).await, first);
    }

    #[tokio::test(start_paused = true)]
    async fn test_older_favorites_write_is_superseded() {
        let (store, context, cars) = seeded(2);
        let owner = FavoriteOwner::new("visitor-1");
        store.set_latency(Some(Duration::from_secs(5)));

        let older = {
            let context = context.clone();
            let owner = owner.clone();
            let ids: FavoriteSet = std::iter::once(cars[0].id).collect();
            tokio::spawn(async move {
                context
                    .set_favorites(&owner, ids, &CancellationToken::new())
                    .await
            })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;

        let newer: FavoriteSet = std::iter::once(cars[1].id).collect();
        let newer_write = context
            .set_favorites(&owner, newer.clone(), &CancellationToken::new())
            .await;

        assert_eq!(older.await.unwrap(), FavoritesWrite::Superseded);
        assert_eq!(newer_write, FavoritesWrite::Committed);
        assert_eq!(context.favorites(&owner, &CancellationToken::new()).await, newer);
    }

    #[tokio::test]
    async fn test_refresh_favorites_keeps_cache_when_offline() {
        let (store, context, cars) = seeded(1);
        let owner = FavoriteOwner::new("visitor-1");
        let cancel = CancellationToken::new();
        let ids: FavoriteSet = std::iter::once(cars[0].id).collect();
        context.set_favorites(&owner, ids.clone(), &cancel).await;

        store.set_offline(true);
        assert_eq!(context.refresh_favorites(&owner, &cancel).await, ids);
    }

    fn unavailable() -> RemoteError {
        RemoteError::Rejected {
            status: 503,
            message: "service unavailable".into(),
        }
    }

    #[tokio::test]
    async fn test_failed_first_favorites_load_is_retried() {
        let (store, context, cars) = seeded(2);
        let owner = FavoriteOwner::new("visitor-1");
        let cancel = CancellationToken::new();
        let saved: FavoriteSet = cars.iter().map(|car| car.id).collect();
        store.replace_favorites(&owner, &saved).await.unwrap();

        store.fail_next("fetch_favorites", unavailable());
        assert!(context.favorites(&owner, &cancel).await.is_empty());
        assert!(context.live_favorite_owners().await.is_empty());

        assert_eq!(context.favorites(&owner, &cancel).await, saved);
        assert_eq!(store.calls("fetch_favorites"), 2);
    }

    #[tokio::test]
    async fn test_toggle_after_failed_load_keeps_saved_favorites() {
        let (store, context, cars) = seeded(3);
        let owner = FavoriteOwner::new("visitor-1");
        let cancel = CancellationToken::new();
        let saved: FavoriteSet = cars[..2].iter().map(|car| car.id).collect();
        store.replace_favorites(&owner, &saved).await.unwrap();

        store.fail_next("fetch_favorites", unavailable());
        assert!(context.favorites(&owner, &cancel).await.is_empty());

        store.fail_next("fetch_favorites", unavailable());
        let result = context.toggle_favorite(&owner, cars[2].id, &cancel).await;
        assert_eq!(result.write, FavoritesWrite::RolledBack);
        assert!(!result.is_favorite);
        assert_eq!(store.stored_favorites(&owner), saved);
        assert_eq!(store.calls("replace_favorites"), 1);

        let result = context.toggle_favorite(&owner, cars[2].id, &cancel).await;
        assert_eq!(result.write, FavoritesWrite::Committed);
        assert!(result.is_favorite);
        let stored = store.stored_favorites(&owner);
        assert_eq!(stored.len(), 3);
        assert!(cars.iter().all(|car| stored.contains(car.id)));
    }

    #[tokio::test]
    async fn test_idle_favorites_are_dropped_and_skipped_on_resync() {
        let store = Arc::new(InMemoryStore::new());
        let context = CarsContext::with_favorites_idle(store.clone(), Duration::from_millis(100));
        let cancel = CancellationToken::new();
        let gone = FavoriteOwner::new("visitor-gone");
        let active = FavoriteOwner::new("visitor-active");

        context.favorites(&gone, &cancel).await;
        tokio::time::sleep(Duration::from_millis(300)).await;
        context.favorites(&active, &cancel).await;

        assert_eq!(context.live_favorite_owners().await, vec![active]);

        let before = store.calls("fetch_favorites");
        context.full_resync(&cancel).await;
        assert_eq!(store.calls("fetch_favorites"), before + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resync_refreshes_owners_concurrently() {
        let (store, context, _) = seeded(1);
        let cancel = CancellationToken::new();
        for i in 0..20 {
            context
                .favorites(&FavoriteOwner::new(format!("visitor-{i}")), &cancel)
                .await;
        }
        assert_eq!(store.calls("fetch_favorites"), 20);

        store.set_latency(Some(Duration::from_secs(1)));
        let started = tokio::time::Instant::now();
        context.full_resync(&cancel).await;

        assert_eq!(store.calls("fetch_favorites"), 40);
        // One round trip for cars and orders, three rounds of favorites
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_orders_lifecycle() {
        let (_, context, cars) = seeded(1);
        let cancel = CancellationToken::new();
        context.init(&cancel).await;

        let order = context
            .submit_order(
                NewOrder {
                    car_id: cars[0].id,
                    customer_name: "Maria".into(),
                    customer_phone: "+7 912 345 67 89".into(),
                    customer_email: None,
                    message: Some("Trade-in possible?".into()),
                },
                &cancel,
            )
            .await
            .unwrap();
        assert_eq!(context.new_order_count().await, 1);
        assert_eq!(order.car.as_ref().unwrap().id, cars[0].id);

        context
            .update_order_status(order.id, OrderStatus::Processing, &cancel)
            .await
            .unwrap();
        assert_eq!(context.new_order_count().await, 0);
        assert_eq!(context.orders().await[0].status, OrderStatus::Processing);
    }

    #[tokio::test]
    async fn test_order_for_unknown_car_is_rejected() {
        let (store, context, _) = seeded(0);
        let err = context
            .submit_order(
                NewOrder {
                    car_id: CarId::generate(),
                    customer_name: "Maria".into(),
                    customer_phone: "+79123456789".into(),
                    customer_email: None,
                    message: None,
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)));
        assert_eq!(store.calls("insert_order"), 0);
    }

    #[tokio::test]
    async fn test_load_orders_keeps_cache_on_failure() {
        let (store, context, cars) = seeded(1);
        let cancel = CancellationToken::new();
        context.init(&cancel).await;
        context
            .submit_order(
                NewOrder {
                    car_id: cars[0].id,
                    customer_name: "Maria".into(),
                    customer_phone: "+79123456789".into(),
                    customer_email: None,
                    message: None,
                },
                &cancel,
            )
            .await
            .unwrap();

        store.set_offline(true);
        assert_eq!(context.load_orders(&cancel).await, 1);
        assert_eq!(context.orders().await.len(), 1);
    }

    #[tokio::test]
    async fn test_one_resync_per_reconnect() {
        let (store, context, _) = seeded(1);
        let cancel = CancellationToken::new();
        context.init(&cancel).await;
        context
            .refresh_favorites(&FavoriteOwner::new("visitor-1"), &cancel)
            .await;

        let monitor = NetworkMonitor::new(true);
        let mut events = context.subscribe();
        let watcher = context.watch_network(&monitor, cancel.clone());

        let cars_before = store.calls("fetch_cars");
        let orders_before = store.calls("fetch_orders");
        let favorites_before = store.calls("fetch_favorites");

        monitor.handle_event(ConnectivityEvent::Unreachable);
        monitor.handle_event(ConnectivityEvent::Unreachable);
        monitor.handle_event(ConnectivityEvent::Reachable);
        monitor.handle_event(ConnectivityEvent::Reachable);

        loop {
            if events.recv().await.unwrap() == ContextEvent::Resynced {
                break;
            }
        }

        assert_eq!(store.calls("fetch_cars"), cars_before + 1);
        assert_eq!(store.calls("fetch_orders"), orders_before + 1);
        assert_eq!(store.calls("fetch_favorites"), favorites_before + 1);

        cancel.cancel();
        watcher.await.unwrap();
    }
}
