//! Session-related types.
//!
//! Types stored in the session for visitor identity and back-office
//! authentication.

use autosalon_core::{AdminRole, Email, UserId};
use autosalon_sync::AuthSession;
use serde::{Deserialize, Serialize};

/// Session-stored back-office identity.
///
/// The access token is not kept; the backend's own access rules remain the
/// authorization boundary for every write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentAdmin {
    pub user_id: UserId,
    pub email: Email,
    pub role: AdminRole,
}

impl From<&AuthSession> for CurrentAdmin {
    fn from(session: &AuthSession) -> Self {
        Self {
            user_id: session.user_id,
            email: session.email.clone(),
            role: session.role,
        }
    }
}

/// Session keys.
pub mod keys {
    /// Key for the signed-in back-office user.
    pub const CURRENT_ADMIN: &str = "current_admin";

    /// Key for the anonymous visitor id that owns favorites.
    pub const VISITOR_ID: &str = "visitor_id";

    /// Key for the visitor's compare list.
    pub const COMPARE: &str = "compare";
}
