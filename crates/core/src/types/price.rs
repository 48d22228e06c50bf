//! Type-safe price representation in Vietnamese dong.
//!
//! The dong has no minor unit in circulation, so prices are kept as whole numbers
//! using decimal arithmetic with a scale of zero.

use core::fmt;
use core::iter::Sum;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A price in VND.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(transparent))]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// A zero price.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// ISO 4217 currency code for every price in the system.
    pub const CURRENCY_CODE: &'static str = "VND";

    /// Create a price from a whole number of dong.
    #[must_use]
    pub fn from_dong(dong: i64) -> Self {
        Self(Decimal::from(dong))
    }

    /// Create a price from a decimal amount, rounding to whole dong.
    #[must_use]
    pub fn from_decimal(amount: Decimal) -> Self {
        Self(amount.round())
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// The amount as whole dong, or `None` if it does not fit in an `i64`.
    #[must_use]
    pub fn as_dong(&self) -> Option<i64> {
        use rust_decimal::prelude::ToPrimitive;
        self.0.round().to_i64()
    }

    /// Whether the price is negative.
    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Add two prices, returning `None` on overflow.
    #[must_use]
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }
}

impl fmt::Display for Price {
    /// Formats as `150.000 ₫` (dot thousands separator, as printed in Vietnam).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0.round().abs().to_string();
        let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
        for (i, c) in whole.chars().enumerate() {
            if i > 0 && (whole.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(c);
        }
        let sign = if self.is_negative() { "-" } else { "" };
        write!(f, "{sign}{grouped} ₫")
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        Self(iter.map(|p| p.0).sum())
    }
}

impl From<Decimal> for Price {
    fn from(amount: Decimal) -> Self {
        Self::from_decimal(amount)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_groups_thousands() {
        assert_eq!(Price::from_dong(0).to_string(), "0 ₫");
        assert_eq!(Price::from_dong(950).to_string(), "950 ₫");
        assert_eq!(Price::from_dong(150_000).to_string(), "150.000 ₫");
        assert_eq!(Price::from_dong(1_250_000).to_string(), "1.250.000 ₫");
        assert_eq!(Price::from_dong(-20_000).to_string(), "-20.000 ₫");
    }

    #[test]
    fn test_sum_and_checked_add() {
        let total: Price = [80_000, 50_000, 30_000]
            .into_iter()
            .map(Price::from_dong)
            .sum();
        assert_eq!(total, Price::from_dong(160_000));
        assert_eq!(
            Price::from_dong(1).checked_add(Price::from_dong(2)),
            Some(Price::from_dong(3))
        );
    }

    #[test]
    fn test_from_decimal_rounds() {
        let price = Price::from_decimal(Decimal::new(1_999_5, 1));
        assert_eq!(price.as_dong(), Some(2_000));
    }

    #[test]
    fn test_is_negative() {
        assert!(Price::from_dong(-1).is_negative());
        assert!(!Price::ZERO.is_negative());
        assert!(!Price::from_dong(10).is_negative());
    }
}
