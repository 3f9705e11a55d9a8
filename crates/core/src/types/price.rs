//! Car pricing with decimal arithmetic.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Listed price of a car: the base price and an absolute discount.
///
/// Amounts are in the dealership's currency units (no minor units).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CarPrice {
    /// Price before discount.
    pub base: Decimal,
    /// Absolute discount subtracted from `base`.
    #[serde(default)]
    pub discount: Decimal,
}

impl CarPrice {
    /// Create a new price.
    #[must_use]
    pub const fn new(base: Decimal, discount: Decimal) -> Self {
        Self { base, discount }
    }

    /// Price the customer pays, never below zero.
    #[must_use]
    pub fn final_price(&self) -> Decimal {
        (self.base - self.discount).max(Decimal::ZERO)
    }

    /// Whether a positive discount applies.
    #[must_use]
    pub fn has_discount(&self) -> bool {
        self.discount > Decimal::ZERO
    }

    /// Discount as a whole percentage of the base price.
    #[must_use]
    pub fn discount_percent(&self) -> u32 {
        if self.base <= Decimal::ZERO || !self.has_discount() {
            return 0;
        }
        let percent = (self.discount * Decimal::ONE_HUNDRED / self.base).round();
        percent.to_u32().unwrap_or(0)
    }
}

/// Format an amount with thousands separators and a currency symbol.
///
/// ```
/// use autosalon_core::format_amount;
/// use rust_decimal::Decimal;
///
/// assert_eq!(format_amount(Decimal::new(2_450_000, 0), "₽"), "2 450 000 ₽");
/// ```
#[must_use]
pub fn format_amount(amount: Decimal, symbol: &str) -> String {
    let rounded = amount.round().to_string();
    let (sign, digits) = rounded
        .strip_prefix('-')
        .map_or(("", rounded.as_str()), |rest| ("-", rest));

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(ch);
    }

    if symbol.is_empty() {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped} {symbol}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_final_price() {
        let price = CarPrice::new(Decimal::new(1_000_000, 0), Decimal::new(150_000, 0));
        assert_eq!(price.final_price(), Decimal::new(850_000, 0));
        assert!(price.has_discount());
        assert_eq!(price.discount_percent(), 15);
    }

    #[test]
    fn test_final_price_never_negative() {
        let price = CarPrice::new(Decimal::new(100, 0), Decimal::new(500, 0));
        assert_eq!(price.final_price(), Decimal::ZERO);
    }

    #[test]
    fn test_no_discount() {
        let price = CarPrice::new(Decimal::new(990_000, 0), Decimal::ZERO);
        assert!(!price.has_discount());
        assert_eq!(price.discount_percent(), 0);
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(Decimal::new(999, 0), "$"), "999 $");
        assert_eq!(format_amount(Decimal::new(1_000, 0), ""), "1 000");
        assert_eq!(format_amount(Decimal::new(12_345_678, 0), "₽"), "12 345 678 ₽");
        assert_eq!(format_amount(Decimal::new(-5_000, 0), "₽"), "-5 000 ₽");
    }
}
