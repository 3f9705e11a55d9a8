//! Core types for Autosalon.
//!
//! This module provides type-safe wrappers for the dealership domain.

pub mod car;
pub mod email;
pub mod favorite;
pub mod id;
pub mod message;
pub mod order;
pub mod outcome;
pub mod price;
pub mod status;

pub use car::{BodyType, Car, CarDraft, CarValidationError, Drivetrain, Engine, FuelType, Transmission};
pub use email::{Email, EmailError};
pub use favorite::{FavoriteOwner, FavoriteSet};
pub use id::*;
pub use message::{ChatMessage, NewMessage};
pub use order::{CarSummary, NewOrder, Order, OrderValidationError};
pub use outcome::DeleteOutcome;
pub use price::{CarPrice, format_amount};
pub use status::*;
