//! HTTP middleware stack for the storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, added in `main`)
//! 2. `TraceLayer` (request span)
//! 3. Request ID (unique ID per request, recorded in the span)
//! 4. Security headers (CSP, frame and referrer policies)
//! 5. Session layer (tower-sessions, in-memory store)
//! 6. Admin Access Gate (`/admin/*` except login)
//! 7. Rate limiting (governor) on login and public write endpoints

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{
    EditSettings, ManageInventory, RequireAdminAuth, RequireRole, clear_current_admin,
    require_admin, set_current_admin,
};
pub use rate_limit::{login_rate_limiter, public_write_rate_limiter};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::{Visitor, create_session_layer};
