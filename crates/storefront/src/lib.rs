//! Autosalon Storefront library.
//!
//! The public car catalog and the admin back-office, served by one axum
//! application. Built as a library so the router can be exercised in tests.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod filters;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;

pub use routes::app;
pub use state::AppState;
