//! In-process [`RemoteStore`] used by tests.
//!
//! Behaves like the hosted backend for every table, and lets tests take the
//! backend offline, inject one-shot failures, add latency and count calls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use autosalon_core::{
    AdminRole, Car, CarId, CarSummary, ChatMessage, Email, FavoriteOwner, FavoriteSet, MessageId,
    NewMessage, NewOrder, Order, OrderId, OrderStatus, UserId,
};
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};

use super::{AuthSession, IMAGE_BUCKET, MAX_IMAGE_BYTES, RemoteStore};
use crate::error::RemoteError;

struct Account {
    user_id: UserId,
    password: String,
    role: AdminRole,
}

#[derive(Default)]
struct MemoryState {
    cars: Vec<Car>,
    orders: Vec<Order>,
    favorites: HashMap<FavoriteOwner, FavoriteSet>,
    messages: Vec<ChatMessage>,
    accounts: HashMap<Email, Account>,
    images: HashMap<String, Vec<u8>>,
    calls: HashMap<&'static str, usize>,
    fail_next: HashMap<&'static str, RemoteError>,
}

/// Backend double keeping every table in memory.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
    offline: AtomicBool,
    latency: Mutex<Option<Duration>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with cars.
    #[must_use]
    pub fn with_cars(self, cars: impl IntoIterator<Item = Car>) -> Self {
        self.state().cars.extend(cars);
        self
    }

    /// Register a back-office account.
    #[must_use]
    pub fn with_account(self, email: &Email, password: &str, role: AdminRole) -> Self {
        self.state().accounts.insert(
            email.clone(),
            Account {
                user_id: UserId::generate(),
                password: password.to_string(),
                role,
            },
        );
        self
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every call fail with [`RemoteError::Unreachable`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Fail the next call of `operation` (e.g. `"fetch_cars"`) with `error`.
    pub fn fail_next(&self, operation: &'static str, error: RemoteError) {
        self.state().fail_next.insert(operation, error);
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock().unwrap_or_else(PoisonError::into_inner) = latency;
    }

    /// How many times `operation` was called.
    #[must_use]
    pub fn calls(&self, operation: &str) -> usize {
        self.state().calls.get(operation).copied().unwrap_or(0)
    }

    /// Snapshot of the stored cars.
    #[must_use]
    pub fn stored_cars(&self) -> Vec<Car> {
        self.state().cars.clone()
    }

    /// Snapshot of an owner's stored favorites.
    #[must_use]
    pub fn stored_favorites(&self, owner: &FavoriteOwner) -> FavoriteSet {
        self.state().favorites.get(owner).cloned().unwrap_or_default()
    }

    /// Record the call and apply offline mode, latency and injected failures.
    async fn enter(&self, operation: &'static str) -> Result<(), RemoteError> {
        *self.state().calls.entry(operation).or_insert(0) += 1;

        let latency = *self.latency.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if self.offline.load(Ordering::SeqCst) {
            return Err(RemoteError::Unreachable("in-memory backend is offline".into()));
        }
        self.state().fail_next.remove(operation).map_or(Ok(()), Err)
    }

    fn summary(cars: &[Car], id: CarId) -> Option<CarSummary> {
        cars.iter().find(|car| car.id == id).map(|car| CarSummary {
            id: car.id,
            brand: car.brand.clone(),
            model: car.model.clone(),
            thumbnail: car.thumbnail().map(str::to_string),
        })
    }
}

#[async_trait]
impl RemoteStore for InMemoryStore {
    async fn fetch_cars(&self) -> Result<Vec<Car>, RemoteError> {
        self.enter("fetch_cars").await?;
        let mut cars = self.state().cars.clone();
        cars.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(cars)
    }

    async fn insert_car(&self, car: &Car) -> Result<Car, RemoteError> {
        self.enter("insert_car").await?;
        let mut state = self.state();
        if state.cars.iter().any(|c| c.id == car.id) {
            return Err(RemoteError::Rejected {
                status: 409,
                message: "duplicate key value violates unique constraint".into(),
            });
        }
        state.cars.push(car.clone());
        Ok(car.clone())
    }

    async fn upsert_car(&self, car: &Car) -> Result<Car, RemoteError> {
        self.enter("upsert_car").await?;
        let mut state = self.state();
        match state.cars.iter_mut().find(|c| c.id == car.id) {
            Some(existing) => *existing = car.clone(),
            None => state.cars.push(car.clone()),
        }
        Ok(car.clone())
    }

    async fn update_car(&self, car: &Car) -> Result<Car, RemoteError> {
        self.enter("update_car").await?;
        let mut state = self.state();
        let existing = state
            .cars
            .iter_mut()
            .find(|c| c.id == car.id)
            .ok_or_else(|| RemoteError::NotFound(format!("car {}", car.id)))?;
        *existing = car.clone();
        Ok(car.clone())
    }

    async fn delete_car(&self, id: CarId) -> Result<bool, RemoteError> {
        self.enter("delete_car").await?;
        let mut state = self.state();
        let before = state.cars.len();
        state.cars.retain(|c| c.id != id);
        Ok(state.cars.len() != before)
    }

    async fn increment_views(&self, id: CarId) -> Result<(), RemoteError> {
        self.enter("increment_views").await?;
        if let Some(car) = self.state().cars.iter_mut().find(|c| c.id == id) {
            car.views += 1;
        }
        Ok(())
    }

    async fn fetch_favorites(&self, owner: &FavoriteOwner) -> Result<FavoriteSet, RemoteError> {
        self.enter("fetch_favorites").await?;
        Ok(self.stored_favorites(owner))
    }

    async fn replace_favorites(
        &self,
        owner: &FavoriteOwner,
        ids: &FavoriteSet,
    ) -> Result<(), RemoteError> {
        self.enter("replace_favorites").await?;
        self.state().favorites.insert(owner.clone(), ids.clone());
        Ok(())
    }

    async fn fetch_orders(&self) -> Result<Vec<Order>, RemoteError> {
        self.enter("fetch_orders").await?;
        let state = self.state();
        let mut orders: Vec<Order> = state
            .orders
            .iter()
            .cloned()
            .map(|mut order| {
                order.car = Self::summary(&state.cars, order.car_id);
                order
            })
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn insert_order(&self, order: &NewOrder) -> Result<Order, RemoteError> {
        self.enter("insert_order").await?;
        let mut state = self.state();
        let now = Utc::now();
        let stored = Order {
            id: OrderId::generate(),
            car_id: order.car_id,
            car: Self::summary(&state.cars, order.car_id),
            customer_name: order.customer_name.trim().to_string(),
            customer_phone: order.customer_phone.trim().to_string(),
            customer_email: order.customer_email.clone(),
            message: order.message.clone(),
            status: OrderStatus::New,
            created_at: now,
            updated_at: now,
        };
        state.orders.push(stored.clone());
        Ok(stored)
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, RemoteError> {
        self.enter("update_order_status").await?;
        let mut state = self.state();
        let order = state
            .orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or_else(|| RemoteError::NotFound(format!("order {id}")))?;
        order.status = status;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn fetch_messages(&self) -> Result<Vec<ChatMessage>, RemoteError> {
        self.enter("fetch_messages").await?;
        let mut messages = self.state().messages.clone();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(messages)
    }

    async fn insert_message(&self, message: &NewMessage) -> Result<ChatMessage, RemoteError> {
        self.enter("insert_message").await?;
        let stored = ChatMessage {
            id: MessageId::generate(),
            conversation_id: message.conversation_id.clone(),
            sender: message.sender,
            author: message.author.clone(),
            body: message.body.trim().to_string(),
            created_at: Utc::now(),
        };
        self.state().messages.push(stored.clone());
        Ok(stored)
    }

    async fn sign_in(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthSession, RemoteError> {
        self.enter("sign_in").await?;
        let state = self.state();
        match state.accounts.get(email) {
            Some(account) if account.password == password.expose_secret() => Ok(AuthSession {
                user_id: account.user_id,
                email: email.clone(),
                role: account.role,
                access_token: SecretString::from(format!("token-{}", account.user_id)),
            }),
            _ => Err(RemoteError::Rejected {
                status: 400,
                message: "Invalid login credentials".into(),
            }),
        }
    }

    async fn upload_image(
        &self,
        name: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, RemoteError> {
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(RemoteError::PayloadTooLarge {
                size: bytes.len(),
                max: MAX_IMAGE_BYTES,
            });
        }
        self.enter("upload_image").await?;
        self.state().images.insert(name.to_string(), bytes);
        Ok(format!("memory://{IMAGE_BUCKET}/{name}"))
    }

    async fn health(&self) -> Result<(), RemoteError> {
        self.enter("health").await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_offline_fails_every_call() {
        let store = InMemoryStore::new();
        store.set_offline(true);
        assert!(store.fetch_cars().await.unwrap_err().is_unreachable());
        assert_eq!(store.calls("fetch_cars"), 1);
        store.set_offline(false);
        assert!(store.fetch_cars().await.is_ok());
    }

    #[tokio::test]
    async fn test_fail_next_is_one_shot() {
        let store = InMemoryStore::new();
        store.fail_next("health", RemoteError::Unreachable("boom".into()));
        assert!(store.health().await.is_err());
        assert!(store.health().await.is_ok());
    }

    #[tokio::test]
    async fn test_sign_in_checks_password() {
        let email = Email::parse("admin@autosalon.example").unwrap();
        let store = InMemoryStore::new().with_account(&email, "secret", AdminRole::Admin);
        assert!(store
            .sign_in(&email, &SecretString::from("wrong"))
            .await
            .unwrap_err()
            .is_auth_failure());
        let session = store
            .sign_in(&email, &SecretString::from("secret"))
            .await
            .unwrap();
        assert_eq!(session.role, AdminRole::Admin);
    }
}
