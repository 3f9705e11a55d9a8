//! Remote data client for the hosted backend.
//!
//! [`RemoteStore`] is the seam between the site and the backend-as-a-service
//! platform: table CRUD over `vehicles`, `orders`, `favorites` and
//! `messages`, password sign-in and image storage. [`RestClient`] talks to
//! the platform over HTTP; `InMemoryStore` (feature `test-utils`) keeps
//! everything in process for tests.

#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
mod rest;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use autosalon_core::{
    AdminRole, Car, CarId, ChatMessage, Email, FavoriteOwner, FavoriteSet, NewMessage, NewOrder,
    Order, OrderId, OrderStatus, UserId,
};
use secrecy::SecretString;
use url::Url;

use crate::error::RemoteError;

pub use rest::RestClient;
pub(crate) use rest::{authenticated_client, error_from_response};

/// Public storage bucket holding car photos.
pub const IMAGE_BUCKET: &str = "car-images";

/// Size ceiling of the image bucket (10 MB).
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Connection settings for the hosted backend.
#[derive(Clone)]
pub struct RemoteConfig {
    /// Project base URL, always ending with `/`.
    url: Url,
    /// Public (anon) API key.
    pub anon_key: SecretString,
    /// Service key; when set it is used instead of the anon key.
    pub service_key: Option<SecretString>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl RemoteConfig {
    /// Default per-request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    #[must_use]
    pub fn new(mut url: Url, anon_key: SecretString) -> Self {
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Self {
            url,
            anon_key,
            service_key: None,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_service_key(mut self, key: Option<SecretString>) -> Self {
        self.service_key = key;
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Key sent with table requests.
    #[must_use]
    pub fn api_key(&self) -> &SecretString {
        self.service_key.as_ref().unwrap_or(&self.anon_key)
    }

    /// Resolve a path relative to the project URL.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` does not form a valid URL.
    pub fn endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
        self.url.join(path)
    }
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("url", &self.url.as_str())
            .field("anon_key", &"[REDACTED]")
            .field(
                "service_key",
                &self.service_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// A signed-in back-office user.
#[derive(Clone)]
pub struct AuthSession {
    pub user_id: UserId,
    pub email: Email,
    pub role: AdminRole,
    pub access_token: SecretString,
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("role", &self.role)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

/// Table, auth and storage operations of the hosted backend.
///
/// Implementations never retry; callers decide how to degrade.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// All cars, newest first.
    async fn fetch_cars(&self) -> Result<Vec<Car>, RemoteError>;

    /// Insert a new car and return the stored row.
    async fn insert_car(&self, car: &Car) -> Result<Car, RemoteError>;

    /// Insert or replace a car by id.
    async fn upsert_car(&self, car: &Car) -> Result<Car, RemoteError>;

    /// Update an existing car. Fails with [`RemoteError::NotFound`] if no row matched.
    async fn update_car(&self, car: &Car) -> Result<Car, RemoteError>;

    /// Delete a car, returning whether a row existed.
    async fn delete_car(&self, id: CarId) -> Result<bool, RemoteError>;

    /// Bump the view counter of a car.
    async fn increment_views(&self, id: CarId) -> Result<(), RemoteError>;

    async fn fetch_favorites(&self, owner: &FavoriteOwner) -> Result<FavoriteSet, RemoteError>;

    /// Replace the owner's whole favorite set.
    async fn replace_favorites(
        &self,
        owner: &FavoriteOwner,
        ids: &FavoriteSet,
    ) -> Result<(), RemoteError>;

    /// All orders joined with their car projection, newest first.
    async fn fetch_orders(&self) -> Result<Vec<Order>, RemoteError>;

    async fn insert_order(&self, order: &NewOrder) -> Result<Order, RemoteError>;

    async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, RemoteError>;

    /// Chat messages, oldest first.
    async fn fetch_messages(&self) -> Result<Vec<ChatMessage>, RemoteError>;

    async fn insert_message(&self, message: &NewMessage) -> Result<ChatMessage, RemoteError>;

    /// Password sign-in for back-office users.
    async fn sign_in(&self, email: &Email, password: &SecretString)
    -> Result<AuthSession, RemoteError>;

    /// Upload an image to the public bucket and return its public URL.
    async fn upload_image(
        &self,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, RemoteError>;

    /// Cheap reachability check.
    async fn health(&self) -> Result<(), RemoteError>;
}

/// Make an upload name safe for a storage path.
///
/// Keeps ASCII alphanumerics, `.`, `-` and `_`; everything else becomes `-`.
/// The result is prefixed with a random id so uploads never collide.
#[must_use]
pub fn storage_object_name(original: &str) -> String {
    let cleaned: String = original
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('-');
    let cleaned = if cleaned.is_empty() { "image" } else { cleaned };
    format!("{}-{cleaned}", uuid::Uuid::new_v4().simple())
}
