//! Session-held models for the storefront.

pub mod session;

pub use session::{CurrentAdmin, keys as session_keys};
