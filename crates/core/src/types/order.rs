//! Customer inquiries about a car.
//!
//! Orders are append-only: customers create them, admins only move their
//! [`OrderStatus`] forward. Nothing deletes an order in normal operation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::email::Email;
use super::id::{CarId, OrderId};
use super::status::OrderStatus;

/// Minimal car projection joined onto orders for the admin list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarSummary {
    pub id: CarId,
    pub brand: String,
    pub model: String,
    pub thumbnail: Option<String>,
}

impl CarSummary {
    #[must_use]
    pub fn title(&self) -> String {
        format!("{} {}", self.brand, self.model)
    }
}

/// A stored inquiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub car_id: CarId,
    /// Joined car projection; `None` when the car was deleted since.
    pub car: Option<CarSummary>,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<Email>,
    pub message: Option<String>,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Rules a [`NewOrder`] can break.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderValidationError {
    #[error("name is required")]
    MissingName,
    #[error("phone number is invalid")]
    InvalidPhone,
    #[error("message is too long (max {max} characters)")]
    MessageTooLong { max: usize },
}

/// Inquiry as submitted by a customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub car_id: CarId,
    pub customer_name: String,
    pub customer_phone: String,
    #[serde(default)]
    pub customer_email: Option<Email>,
    #[serde(default)]
    pub message: Option<String>,
}

impl NewOrder {
    pub const MAX_MESSAGE: usize = 2000;

    /// Check the inquiry before it is sent to the backend.
    ///
    /// A phone number must contain between 7 and 15 digits; spaces, dashes,
    /// parentheses and a leading `+` are allowed.
    ///
    /// # Errors
    ///
    /// Returns the first violated rule.
    pub fn validate(&self) -> Result<(), OrderValidationError> {
        if self.customer_name.trim().is_empty() {
            return Err(OrderValidationError::MissingName);
        }

        let phone = self.customer_phone.trim();
        let phone_ok = phone
            .chars()
            .enumerate()
            .all(|(i, c)| c.is_ascii_digit() || matches!(c, ' ' | '-' | '(' | ')') || (c == '+' && i == 0));
        let digits = phone.chars().filter(char::is_ascii_digit).count();
        if !phone_ok || !(7..=15).contains(&digits) {
            return Err(OrderValidationError::InvalidPhone);
        }

        if let Some(message) = &self.message
            && message.chars().count() > Self::MAX_MESSAGE
        {
            return Err(OrderValidationError::MessageTooLong {
                max: Self::MAX_MESSAGE,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn inquiry() -> NewOrder {
        NewOrder {
            car_id: CarId::generate(),
            customer_name: "Ivan Petrov".into(),
            customer_phone: "+7 (999) 123-45-67".into(),
            customer_email: Some(Email::parse("ivan@example.com").unwrap()),
            message: Some("Is a test drive possible on Saturday?".into()),
        }
    }

    #[test]
    fn test_valid_inquiry() {
        assert_eq!(inquiry().validate(), Ok(()));
    }

    #[test]
    fn test_rejects_blank_name() {
        let mut order = inquiry();
        order.customer_name = " ".into();
        assert_eq!(order.validate(), Err(OrderValidationError::MissingName));
    }

    #[test]
    fn test_rejects_bad_phone() {
        let mut order = inquiry();
        order.customer_phone = "call me".into();
        assert_eq!(order.validate(), Err(OrderValidationError::InvalidPhone));
        order.customer_phone = "12-34".into();
        assert_eq!(order.validate(), Err(OrderValidationError::InvalidPhone));
        order.customer_phone = "8+9991234567".into();
        assert_eq!(order.validate(), Err(OrderValidationError::InvalidPhone));
    }

    #[test]
    fn test_rejects_long_message() {
        let mut order = inquiry();
        order.message = Some("x".repeat(NewOrder::MAX_MESSAGE + 1));
        assert!(matches!(
            order.validate(),
            Err(OrderValidationError::MessageTooLong { .. })
        ));
    }
}
