//! Error types for talking to the hosted backend and for context operations.

use autosalon_core::{CarValidationError, OrderValidationError};
use thiserror::Error;

/// Failures of the remote data client.
///
/// The variants follow the three failure classes the site distinguishes:
/// the backend could not be reached, it rejected the request, or the local
/// input never made it out (size limits).
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// Network failure, timeout or backend down.
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    /// The backend answered with a non-success status.
    #[error("backend rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Rate limited by the backend.
    #[error("rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Upload exceeds the storage bucket limit.
    #[error("file is too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The addressed row does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The response body did not have the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl RemoteError {
    /// Whether this error means the backend could not be reached at all.
    #[must_use]
    pub const fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }

    /// Whether the backend refused the credentials or the permission check.
    #[must_use]
    pub const fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Rejected { status: 400 | 401 | 403, .. })
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Unreachable(err.to_string())
        }
    }
}

impl From<url::ParseError> for RemoteError {
    fn from(err: url::ParseError) -> Self {
        Self::Decode(format!("invalid endpoint URL: {err}"))
    }
}

/// Errors surfaced by [`crate::CarsContext`] operations.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// The car failed local validation and was not sent.
    #[error("invalid car: {}", join_errors(.0))]
    InvalidCar(Vec<CarValidationError>),

    #[error("invalid order: {0}")]
    InvalidOrder(#[from] OrderValidationError),

    #[error("not found: {0}")]
    NotFound(String),

    /// The caller cancelled the operation before it completed.
    #[error("operation cancelled")]
    Cancelled,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SyncError {
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<Vec<CarValidationError>> for SyncError {
    fn from(errors: Vec<CarValidationError>) -> Self {
        Self::InvalidCar(errors)
    }
}

/// Join validation errors into one human readable line.
#[must_use]
pub fn join_errors(errors: &[CarValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
