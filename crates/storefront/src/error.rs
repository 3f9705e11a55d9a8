//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server-side errors to
//! Sentry before responding to the client. Route handlers return
//! `Result<T, AppError>`.

use autosalon_sync::{FunctionsError, RemoteError, SettingsError, SyncError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Cars context or remote store operation failed.
    #[error("Backend error: {0}")]
    Sync(#[from] SyncError),

    /// Serverless function call failed.
    #[error("Function error: {0}")]
    Functions(#[from] FunctionsError),

    /// Site settings could not be saved.
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    /// Session store failure.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RemoteError> for AppError {
    fn from(err: RemoteError) -> Self {
        Self::Sync(err.into())
    }
}

/// HTTP status for a backend failure.
const fn remote_status(err: &RemoteError) -> StatusCode {
    match err {
        RemoteError::Unreachable(_) => StatusCode::SERVICE_UNAVAILABLE,
        RemoteError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
        RemoteError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        RemoteError::NotFound(_) => StatusCode::NOT_FOUND,
        RemoteError::Rejected { .. } | RemoteError::Decode(_) => StatusCode::BAD_GATEWAY,
    }
}

impl AppError {
    /// HTTP status this error renders as.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Sync(err) => match err {
                SyncError::Remote(remote) => remote_status(remote),
                SyncError::InvalidCar(_) | SyncError::InvalidOrder(_) => StatusCode::BAD_REQUEST,
                SyncError::NotFound(_) => StatusCode::NOT_FOUND,
                SyncError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
                SyncError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Functions(err) => match err {
                FunctionsError::EmptyQuestion | FunctionsError::QuestionTooLong { .. } => {
                    StatusCode::BAD_REQUEST
                }
                FunctionsError::Remote(remote) => remote_status(remote),
            },
            Self::Settings(SettingsError::Invalid(_)) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Settings(_) | Self::Session(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }

    /// Message safe to show to the client.
    fn public_message(&self) -> String {
        match self {
            Self::Sync(err @ (SyncError::InvalidCar(_) | SyncError::InvalidOrder(_))) => {
                err.to_string()
            }
            Self::Functions(
                err @ (FunctionsError::EmptyQuestion | FunctionsError::QuestionTooLong { .. }),
            ) => err.to_string(),
            Self::Settings(err @ SettingsError::Invalid(_)) => err.to_string(),
            Self::NotFound(_)
            | Self::Unauthorized(_)
            | Self::Forbidden(_)
            | Self::BadRequest(_) => self.to_string(),
            Self::Sync(SyncError::NotFound(what)) => format!("Not found: {what}"),
            Self::Sync(SyncError::Remote(RemoteError::PayloadTooLarge { .. }))
            | Self::Functions(FunctionsError::Remote(RemoteError::PayloadTooLarge { .. })) => {
                "File is too large".to_string()
            }
            _ => match self.status() {
                StatusCode::SERVICE_UNAVAILABLE => "Service temporarily unavailable".to_string(),
                StatusCode::TOO_MANY_REQUESTS => "Too many requests".to_string(),
                StatusCode::BAD_GATEWAY => "External service error".to_string(),
                _ => "Internal server error".to_string(),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry; an unreachable backend is expected and only logged
        if status == StatusCode::SERVICE_UNAVAILABLE {
            tracing::warn!(error = %self, "Backend unavailable");
        } else if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (status, self.public_message()).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context for a signed-in back-office user.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context on logout.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

#[cfg(test)]
mod tests {
    use autosalon_core::{CarValidationError, OrderValidationError};

    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("car".to_string());
        assert_eq!(err.to_string(), "Not found: car");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(get_status(AppError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(get_status(AppError::Forbidden("x".into())), StatusCode::FORBIDDEN);
        assert_eq!(
            get_status(SyncError::InvalidCar(vec![CarValidationError::MissingBrand]).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(SyncError::InvalidOrder(OrderValidationError::InvalidPhone).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(RemoteError::Unreachable("down".into()).into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            get_status(RemoteError::PayloadTooLarge { size: 11, max: 10 }.into()),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            get_status(FunctionsError::EmptyQuestion.into()),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_internal_details_hidden() {
        let err = AppError::Sync(SyncError::Remote(RemoteError::Rejected {
            status: 500,
            message: "relation \"vehicles\" does not exist".into(),
        }));
        assert_eq!(err.public_message(), "External service error");

        let err = AppError::Sync(SyncError::InvalidCar(vec![CarValidationError::MissingBrand]));
        assert_eq!(err.public_message(), "invalid car: brand is required");
    }
}
