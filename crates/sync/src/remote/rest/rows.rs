//! Flat row shapes of the backend tables.
//!
//! The REST layer exposes tables as flat JSON objects; nested domain types
//! are assembled in [`super::conversions`].

use autosalon_core::{
    BodyType, CarId, Drivetrain, FuelType, MessageSender, OrderId, OrderStatus, Transmission,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Row of the `vehicles` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarRow {
    pub id: CarId,
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub engine_displacement: f64,
    pub engine_power: i32,
    pub fuel_type: FuelType,
    pub transmission: Transmission,
    pub drivetrain: Drivetrain,
    pub body_type: BodyType,
    pub price_base: Decimal,
    #[serde(default)]
    pub price_discount: Decimal,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub is_new: bool,
    #[serde(default)]
    pub mileage: i64,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub views: i64,
    pub created_at: DateTime<Utc>,
}

/// Car projection embedded in order rows (`vehicles(id,brand,model,images)`).
#[derive(Debug, Clone, Deserialize)]
pub struct CarSummaryRow {
    pub id: CarId,
    pub brand: String,
    pub model: String,
    #[serde(default)]
    pub images: Vec<String>,
}

/// Row of the `orders` table with the embedded car.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderRow {
    pub id: OrderId,
    pub car_id: CarId,
    pub customer_name: String,
    pub customer_phone: String,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub vehicles: Option<CarSummaryRow>,
}

/// Insert payload for `orders`.
#[derive(Debug, Serialize)]
pub struct NewOrderRow<'a> {
    pub car_id: CarId,
    pub customer_name: &'a str,
    pub customer_phone: &'a str,
    pub customer_email: Option<&'a str>,
    pub message: Option<&'a str>,
    pub status: OrderStatus,
}

/// Patch payload for order status changes.
#[derive(Debug, Serialize)]
pub struct OrderStatusPatch {
    pub status: OrderStatus,
    pub updated_at: DateTime<Utc>,
}

/// Row of the `favorites` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FavoriteRow {
    pub owner_id: String,
    pub car_id: CarId,
}

/// Insert payload for `messages`.
#[derive(Debug, Serialize)]
pub struct NewMessageRow<'a> {
    pub conversation_id: &'a str,
    pub sender: MessageSender,
    pub author: &'a str,
    pub body: &'a str,
}

/// Password grant response of the auth endpoint.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub user: AuthUser,
}

#[derive(Debug, Deserialize)]
pub struct AuthUser {
    pub id: uuid::Uuid,
    pub email: String,
    #[serde(default)]
    pub app_metadata: AppMetadata,
}

/// Role claims are kept in `app_metadata`, which only the service key can write.
#[derive(Debug, Default, Deserialize)]
pub struct AppMetadata {
    #[serde(default)]
    pub role: Option<String>,
}

/// Error body returned by the REST and auth endpoints.
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default, alias = "msg", alias = "error_description")]
    pub message: Option<String>,
}
