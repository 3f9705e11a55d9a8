//! Back-office sign-in and sign-out.
//!
//! Credentials are checked by the hosted backend's auth service; only the
//! resulting identity and role are kept in the session.

use askama::Template;
use askama_web::WebTemplate;
use autosalon_core::Email;
use autosalon_sync::SyncError;
use axum::{
    Form, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use secrecy::SecretString;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::{clear_current_admin, login_rate_limiter, set_current_admin};
use crate::models::{CurrentAdmin, session_keys};
use crate::state::AppState;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/login.html")]
pub struct LoginTemplate {
    pub site_name: String,
    pub email: String,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Login routes, outside the access gate. Only the POST is rate limited.
pub fn router() -> Router<AppState> {
    Router::new().route(
        "/admin/login",
        get(login_page).merge(post(login).layer(login_rate_limiter())),
    )
}

async fn login_template(state: &AppState, email: String, error: Option<String>) -> LoginTemplate {
    LoginTemplate {
        site_name: state.settings().current().await.site_name,
        email,
        error,
    }
}

/// Render the login page, or go to the dashboard when already signed in.
///
/// GET /admin/login
pub async fn login_page(State(state): State<AppState>, session: Session) -> Response {
    if let Ok(Some(_)) = session
        .get::<CurrentAdmin>(session_keys::CURRENT_ADMIN)
        .await
    {
        return Redirect::to("/admin").into_response();
    }
    login_template(&state, String::new(), None)
        .await
        .into_response()
}

async fn rejected(state: &AppState, email: String) -> Response {
    let page = login_template(state, email, Some(INVALID_CREDENTIALS.to_string())).await;
    (StatusCode::UNAUTHORIZED, page).into_response()
}

/// Sign in with email and password.
///
/// POST /admin/login
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let Ok(email) = Email::parse(&form.email) else {
        return Ok(rejected(&state, form.email).await);
    };
    let password = SecretString::from(form.password);

    let auth = match state.context().remote().sign_in(&email, &password).await {
        Ok(auth) => auth,
        Err(e) if e.is_auth_failure() => {
            tracing::info!(email = %email, "Back-office sign-in rejected");
            return Ok(rejected(&state, email.to_string()).await);
        }
        Err(e) => return Err(AppError::Sync(SyncError::Remote(e))),
    };

    let admin = CurrentAdmin::from(&auth);
    set_current_admin(&session, &admin).await?;
    set_sentry_user(&admin.user_id, Some(admin.email.as_str()));
    tracing::info!(email = %admin.email, role = %admin.role, "Back-office sign-in");

    Ok(Redirect::to("/admin").into_response())
}

/// Sign out and return to the login page.
///
/// POST /admin/logout
pub async fn logout(session: Session) -> Result<Redirect, AppError> {
    clear_current_admin(&session).await?;
    clear_sentry_user();
    Ok(Redirect::to("/admin/login"))
}
