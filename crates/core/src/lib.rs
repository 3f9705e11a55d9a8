//! Autosalon Core - Shared domain types.
//!
//! This crate provides the types used across all Autosalon components:
//! - `sync` - Remote data client, network monitor and the cars context
//! - `storefront` - Public catalog and the admin back-office
//!
//! # Architecture
//!
//! The core crate contains only types and validation - no I/O, no HTTP
//! clients, no async. This keeps it lightweight and usable from tests and
//! tooling alike.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, cars, orders, favorites, prices and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
