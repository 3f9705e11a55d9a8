//! Admin Access Gate: middleware and extractors for the back-office.
//!
//! Every `/admin/*` route except the login page sits behind
//! [`require_admin`]. Unauthenticated HTML requests are redirected to
//! `/admin/login`; `/admin/api/*` requests get 401. [`RequireRole`] adds a
//! per-handler role check answered with 403.
//!
//! This gate only protects rendering. The backend's access rules stay the
//! real authorization boundary for anything reachable through its API.

use std::marker::PhantomData;

use autosalon_core::AdminRole;
use axum::{
    extract::{FromRequestParts, Request},
    http::{StatusCode, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::models::{CurrentAdmin, session_keys};

/// Where unauthenticated back-office visitors are sent.
pub const LOGIN_PATH: &str = "/admin/login";

/// Prefix of back-office JSON endpoints.
pub const ADMIN_API_PREFIX: &str = "/admin/api/";

/// Error returned when a back-office route is hit without a signed-in admin.
#[derive(Debug)]
pub enum AdminAuthRejection {
    /// Redirect to login page (for HTML requests).
    RedirectToLogin,
    /// Unauthorized response (for API requests).
    Unauthorized,
    /// Signed in, but the role may not use this route.
    Forbidden,
}

impl AdminAuthRejection {
    fn unauthenticated(path: &str) -> Self {
        if path.starts_with(ADMIN_API_PREFIX) {
            Self::Unauthorized
        } else {
            Self::RedirectToLogin
        }
    }
}

impl IntoResponse for AdminAuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to(LOGIN_PATH).into_response(),
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
            Self::Forbidden => (
                StatusCode::FORBIDDEN,
                "Your role does not have access to this page",
            )
                .into_response(),
        }
    }
}

async fn session_admin(session: &Session) -> Option<CurrentAdmin> {
    session
        .get::<CurrentAdmin>(session_keys::CURRENT_ADMIN)
        .await
        .ok()
        .flatten()
}

/// Middleware guarding the back-office router.
///
/// On success the [`CurrentAdmin`] is inserted into request extensions for
/// the extractors below.
pub async fn require_admin(session: Session, mut request: Request, next: Next) -> Response {
    let Some(admin) = session_admin(&session).await else {
        tracing::debug!(path = %request.uri().path(), "Unauthenticated back-office request");
        return AdminAuthRejection::unauthenticated(request.uri().path()).into_response();
    };

    tracing::Span::current().record("admin", admin.email.as_str());
    request.extensions_mut().insert(admin);
    next.run(request).await
}

/// Extractor for the signed-in admin.
///
/// # Example
///
/// ```rust,ignore
/// async fn dashboard(RequireAdminAuth(admin): RequireAdminAuth) -> impl IntoResponse {
///     format!("Hello, {}!", admin.email)
/// }
/// ```
pub struct RequireAdminAuth(pub CurrentAdmin);

impl<S> FromRequestParts<S> for RequireAdminAuth
where
    S: Send + Sync,
{
    type Rejection = AdminAuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(admin) = parts.extensions.get::<CurrentAdmin>() {
            return Ok(Self(admin.clone()));
        }

        // Routes mounted outside the gate fall back to the session
        let session = parts
            .extensions
            .get::<Session>()
            .ok_or(AdminAuthRejection::Unauthorized)?;
        session_admin(session)
            .await
            .map(Self)
            .ok_or_else(|| AdminAuthRejection::unauthenticated(parts.uri.path()))
    }
}

/// A permission a back-office route requires.
pub trait RolePolicy: Send + Sync + 'static {
    fn allows(role: AdminRole) -> bool;
}

/// Create, edit, import and delete cars.
pub struct ManageInventory;

impl RolePolicy for ManageInventory {
    fn allows(role: AdminRole) -> bool {
        role.can_manage_inventory()
    }
}

/// Change site settings.
pub struct EditSettings;

impl RolePolicy for EditSettings {
    fn allows(role: AdminRole) -> bool {
        role.can_edit_settings()
    }
}

/// Extractor that requires a signed-in admin whose role passes `P`.
///
/// ```rust,ignore
/// async fn import(RequireRole(admin, ..): RequireRole<ManageInventory>) { /* ... */ }
/// ```
pub struct RequireRole<P: RolePolicy>(pub CurrentAdmin, pub PhantomData<P>);

impl<P, S> FromRequestParts<S> for RequireRole<P>
where
    P: RolePolicy,
    S: Send + Sync,
{
    type Rejection = AdminAuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequireAdminAuth(admin) = RequireAdminAuth::from_request_parts(parts, state).await?;
        if !P::allows(admin.role) {
            tracing::warn!(
                admin = %admin.email,
                role = %admin.role,
                path = %parts.uri.path(),
                "Back-office access denied"
            );
            return Err(AdminAuthRejection::Forbidden);
        }
        Ok(Self(admin, PhantomData))
    }
}

/// Store the signed-in admin, rotating the session id.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_admin(
    session: &Session,
    admin: &CurrentAdmin,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_ADMIN, admin).await
}

/// Remove the signed-in admin from the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_admin(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<CurrentAdmin>(session_keys::CURRENT_ADMIN)
        .await?;
    Ok(())
}
