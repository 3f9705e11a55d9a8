//! Conversions between backend rows and domain types.

use autosalon_core::{
    AdminRole, Car, CarPrice, CarSummary, Email, Engine, NewOrder, Order, UserId,
};
use secrecy::SecretString;

use super::rows::{CarRow, CarSummaryRow, NewOrderRow, OrderRow, TokenResponse};
use crate::error::RemoteError;
use crate::remote::AuthSession;

fn out_of_range(field: &str, value: impl std::fmt::Display) -> RemoteError {
    RemoteError::Decode(format!("{field} out of range: {value}"))
}

/// Convert a `vehicles` row into a [`Car`].
///
/// # Errors
///
/// Returns [`RemoteError::Decode`] if a numeric column does not fit the domain type.
pub fn convert_car(row: CarRow) -> Result<Car, RemoteError> {
    Ok(Car {
        id: row.id,
        brand: row.brand,
        model: row.model,
        year: u16::try_from(row.year).map_err(|_| out_of_range("year", row.year))?,
        engine: Engine {
            displacement: row.engine_displacement,
            power: u32::try_from(row.engine_power)
                .map_err(|_| out_of_range("engine_power", row.engine_power))?,
            fuel_type: row.fuel_type,
        },
        transmission: row.transmission,
        drivetrain: row.drivetrain,
        body_type: row.body_type,
        price: CarPrice::new(row.price_base, row.price_discount),
        images: row.images,
        is_new: row.is_new,
        mileage: u32::try_from(row.mileage).map_err(|_| out_of_range("mileage", row.mileage))?,
        color: row.color,
        description: row.description,
        views: u64::try_from(row.views).unwrap_or(0),
        created_at: row.created_at,
    })
}

/// Flatten a [`Car`] into a `vehicles` row.
#[must_use]
pub fn car_to_row(car: &Car) -> CarRow {
    CarRow {
        id: car.id,
        brand: car.brand.clone(),
        model: car.model.clone(),
        year: i32::from(car.year),
        engine_displacement: car.engine.displacement,
        engine_power: i32::try_from(car.engine.power).unwrap_or(i32::MAX),
        fuel_type: car.engine.fuel_type,
        transmission: car.transmission,
        drivetrain: car.drivetrain,
        body_type: car.body_type,
        price_base: car.price.base,
        price_discount: car.price.discount,
        images: car.images.clone(),
        is_new: car.is_new,
        mileage: i64::from(car.mileage),
        color: car.color.clone(),
        description: car.description.clone(),
        views: i64::try_from(car.views).unwrap_or(i64::MAX),
        created_at: car.created_at,
    }
}

fn convert_summary(row: CarSummaryRow) -> CarSummary {
    CarSummary {
        id: row.id,
        brand: row.brand,
        model: row.model,
        thumbnail: row.images.into_iter().next(),
    }
}

/// Convert an `orders` row with its embedded car.
///
/// An email the backend accepted but we cannot parse is dropped rather than
/// failing the whole order list.
#[must_use]
pub fn convert_order(row: OrderRow) -> Order {
    let customer_email = row.customer_email.as_deref().and_then(|raw| {
        Email::parse(raw)
            .inspect_err(|e| tracing::debug!(order = %row.id, error = %e, "Ignoring malformed customer email"))
            .ok()
    });

    Order {
        id: row.id,
        car_id: row.car_id,
        car: row.vehicles.map(convert_summary),
        customer_name: row.customer_name,
        customer_phone: row.customer_phone,
        customer_email,
        message: row.message,
        status: row.status,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

/// Insert payload for a customer inquiry.
#[must_use]
pub fn new_order_to_row(order: &NewOrder) -> NewOrderRow<'_> {
    NewOrderRow {
        car_id: order.car_id,
        customer_name: order.customer_name.trim(),
        customer_phone: order.customer_phone.trim(),
        customer_email: order.customer_email.as_ref().map(Email::as_str),
        message: order
            .message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty()),
        status: autosalon_core::OrderStatus::New,
    }
}

/// Build an [`AuthSession`] from a password grant response.
///
/// # Errors
///
/// Returns [`RemoteError::Rejected`] (403) when the account carries no
/// back-office role, and [`RemoteError::Decode`] when the email is malformed.
pub fn convert_session(token: TokenResponse) -> Result<AuthSession, RemoteError> {
    let role = token
        .user
        .app_metadata
        .role
        .as_deref()
        .and_then(|r| r.parse::<AdminRole>().ok())
        .ok_or_else(|| RemoteError::Rejected {
            status: 403,
            message: "account has no back-office role".to_string(),
        })?;

    let email = Email::parse(&token.user.email)
        .map_err(|e| RemoteError::Decode(format!("user email: {e}")))?;

    Ok(AuthSession {
        user_id: UserId::new(token.user.id),
        email,
        role,
        access_token: SecretString::from(token.access_token),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::remote::rest::rows::{AppMetadata, AuthUser};

    fn row() -> CarRow {
        serde_json::from_value(serde_json::json!({
            "id": "7f1f4a5e-8a53-4a43-9a8e-0a4b8ef0c001",
            "brand": "Kia",
            "model": "Sportage",
            "year": 2023,
            "engine_displacement": 2.0,
            "engine_power": 150,
            "fuel_type": "petrol",
            "transmission": "automatic",
            "drivetrain": "awd",
            "body_type": "crossover",
            "price_base": 3450000,
            "price_discount": "50000",
            "images": ["a.jpg", "b.jpg"],
            "is_new": true,
            "created_at": "2024-05-01T10:00:00Z"
        }))
        .unwrap()
    }

    #[test]
    fn test_convert_car_nests_engine_and_price() {
        let car = convert_car(row()).unwrap();
        assert_eq!(car.engine.power, 150);
        assert_eq!(car.price.final_price(), rust_decimal::Decimal::new(3_400_000, 0));
        assert_eq!(car.thumbnail(), Some("a.jpg"));
        assert_eq!(car.views, 0);
    }

    #[test]
    fn test_convert_car_rejects_negative_year() {
        let mut bad = row();
        bad.year = -1;
        assert!(matches!(convert_car(bad), Err(RemoteError::Decode(_))));
    }

    #[test]
    fn test_car_row_roundtrip_preserves_fields() {
        let car = convert_car(row()).unwrap();
        let back = convert_car(car_to_row(&car)).unwrap();
        assert_eq!(back, car);
    }

    #[test]
    fn test_session_requires_role() {
        let token = TokenResponse {
            access_token: "jwt".into(),
            user: AuthUser {
                id: uuid::Uuid::new_v4(),
                email: "viewer@autosalon.example".into(),
                app_metadata: AppMetadata::default(),
            },
        };
        let err = convert_session(token).unwrap_err();
        assert!(err.is_auth_failure());
    }
}
