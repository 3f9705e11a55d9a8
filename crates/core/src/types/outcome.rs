//! Explicit results for remote mutations.

use serde::Serialize;

/// Result of deleting a car.
///
/// A row that does not exist remotely is reported as [`DeleteOutcome::NotFound`],
/// never as success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum DeleteOutcome {
    Success,
    NotFound,
    Failure(String),
}

impl DeleteOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl std::fmt::Display for DeleteOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => f.write_str("deleted"),
            Self::NotFound => f.write_str("not found"),
            Self::Failure(reason) => write!(f, "failed: {reason}"),
        }
    }
}
