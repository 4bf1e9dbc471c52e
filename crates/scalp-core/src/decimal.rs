//! Precision-safe decimal types for trading.
//!
//! Uses `rust_decimal` for exact decimal arithmetic, avoiding
//! floating-point rounding errors critical in financial calculations.
//!
//! Prediction-market outcome tokens quote in cents (0–100 of face value),
//! so the price type here is `Cents` rather than a free-form price.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Div, Mul, Sub};
use std::str::FromStr;

/// Price in cents of face value, with exact decimal precision.
///
/// Wraps `Decimal` to provide type safety and prevent mixing
/// prices with share quantities in calculations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cents(pub Decimal);

impl Cents {
    pub const ZERO: Self = Self(Decimal::ZERO);
    pub const ONE: Self = Self(Decimal::ONE);

    #[inline]
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    #[inline]
    pub fn inner(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// Convert to dollars (1 USD = 100 cents).
    #[inline]
    pub fn to_usd(&self) -> Decimal {
        self.0 / Decimal::from(100)
    }

    /// Calculate percentage difference from another price.
    #[inline]
    pub fn pct_from(&self, other: Cents) -> Option<Decimal> {
        if other.is_zero() {
            return None;
        }
        Some((self.0 - other.0) / other.0 * Decimal::from(100))
    }

    /// Absolute cents distance from another price.
    #[inline]
    pub fn distance_from(&self, other: Cents) -> Cents {
        Self((self.0 - other.0).abs())
    }
}

impl fmt::Display for Cents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}¢", self.0)
    }
}

impl FromStr for Cents {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

impl From<Decimal> for Cents {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}

impl Add for Cents {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Cents {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Mul<Decimal> for Cents {
    type Output = Self;

    fn mul(self, rhs: Decimal) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Div<Decimal> for Cents {
    type Output = Self;

    fn div(self, rhs: Decimal) -> Self::Output {
        Self(self.0 / rhs)
    }
}

/// Share quantity with exact decimal precision.
///
/// Wraps `Decimal` to provide type safety and prevent mixing
/// quantities with prices in calculations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Shares(pub Decimal);

impl Shares {
    pub const ZERO: Self = Self(Decimal::ZERO);
    pub const ONE: Self = Self(Decimal::ONE);

    #[inline]
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    #[inline]
    pub fn inner(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// Notional value in USD: shares × price-in-cents ÷ 100.
    #[inline]
    pub fn notional_usd(&self, price: Cents) -> Decimal {
        self.0 * price.0 / Decimal::from(100)
    }
}

impl fmt::Display for Shares {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Shares {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

impl From<Decimal> for Shares {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}

impl Add for Shares {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Shares {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Mul<Decimal> for Shares {
    type Output = Self;

    fn mul(self, rhs: Decimal) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Div<Decimal> for Shares {
    type Output = Self;

    fn div(self, rhs: Decimal) -> Self::Output {
        Self(self.0 / rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_cents_pct_from() {
        let entry = Cents::new(dec!(50));
        let current = Cents::new(dec!(60));

        let pct = current.pct_from(entry).unwrap();
        assert_eq!(pct, dec!(20));
    }

    #[test]
    fn test_cents_pct_from_zero_base() {
        let current = Cents::new(dec!(60));
        assert!(current.pct_from(Cents::ZERO).is_none());
    }

    #[test]
    fn test_cents_to_usd() {
        let price = Cents::new(dec!(55));
        assert_eq!(price.to_usd(), dec!(0.55));
    }

    #[test]
    fn test_notional_usd() {
        // 3 shares at 40¢ = $1.20
        let shares = Shares::new(dec!(3));
        let price = Cents::new(dec!(40));

        assert_eq!(shares.notional_usd(price), dec!(1.20));
    }

    #[test]
    fn test_distance_from_is_absolute() {
        let a = Cents::new(dec!(40));
        let b = Cents::new(dec!(45));
        assert_eq!(a.distance_from(b), Cents::new(dec!(5)));
        assert_eq!(b.distance_from(a), Cents::new(dec!(5)));
    }
}
