//! Session middleware configuration and the visitor identity.
//!
//! Sessions live in process memory: they hold only the anonymous visitor id,
//! the compare list and the signed-in admin. Favorites themselves persist in
//! the backend, keyed by the visitor id.

use autosalon_core::FavoriteOwner;
use autosalon_sync::CompareList;
use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::{Expiry, MemoryStore, Session, SessionManagerLayer};
use uuid::Uuid;

use crate::config::StorefrontConfig;
use crate::error::AppError;
use crate::models::session_keys;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "autosalon_session";

/// Session expiry time in seconds (30 days).
const SESSION_EXPIRY_SECONDS: i64 = 30 * 24 * 60 * 60;

/// Create the session layer with an in-memory store.
#[must_use]
pub fn create_session_layer(config: &StorefrontConfig) -> SessionManagerLayer<MemoryStore> {
    SessionManagerLayer::new(MemoryStore::default())
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.is_secure())
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}

/// The anonymous visitor behind a request.
///
/// A visitor id is created on first use and kept in the session; it owns the
/// visitor's favorites.
pub struct Visitor {
    pub owner: FavoriteOwner,
    pub session: Session,
}

impl Visitor {
    /// The visitor's compare list (empty if none yet).
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    pub async fn compare_list(&self) -> Result<CompareList, AppError> {
        Ok(self
            .session
            .get::<CompareList>(session_keys::COMPARE)
            .await?
            .unwrap_or_default())
    }

    /// Persist the compare list.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    pub async fn save_compare_list(&self, list: &CompareList) -> Result<(), AppError> {
        self.session.insert(session_keys::COMPARE, list).await?;
        Ok(())
    }
}

impl<S> FromRequestParts<S> for Visitor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AppError::Internal("session layer missing".to_string()))?;

        let id = match session.get::<String>(session_keys::VISITOR_ID).await? {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4().simple().to_string();
                session.insert(session_keys::VISITOR_ID, &id).await?;
                id
            }
        };

        Ok(Self {
            owner: FavoriteOwner::new(id),
            session,
        })
    }
}
