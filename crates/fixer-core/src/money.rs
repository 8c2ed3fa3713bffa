//! Eurodollar amounts.

use std::fmt;
use std::ops::{Add, Sub};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A eurodollar amount backed by `rust_decimal::Decimal`.
///
/// The game economy is single-currency: payments, contract costs, estimates,
/// and bonuses are all denominated in eurodollars. Fixed-point arithmetic
/// keeps wallet math exact.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Eurodollars(pub Decimal);

impl Eurodollars {
    /// Zero value.
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Create from a whole number of eurodollars.
    pub fn new(units: i64) -> Self {
        Self(Decimal::from(units))
    }

    /// Create from a `Decimal` value.
    pub fn from_decimal(d: Decimal) -> Self {
        Self(d)
    }

    /// Whether the value is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Whether the value is strictly greater than zero.
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Multiply by a rate factor (risk multipliers, efficiency cuts).
    pub fn scaled(self, factor: Decimal) -> Self {
        Self(self.0 * factor)
    }

    /// Multiply by a day count (contract cost accrual).
    pub fn times(self, count: u32) -> Self {
        Self(self.0 * Decimal::from(count))
    }

    /// Divide into `count` shares (payment-proportional bonuses).
    pub fn divided_by(self, count: u32) -> Self {
        if count == 0 {
            return Self::zero();
        }
        Self(self.0 / Decimal::from(count))
    }
}

impl Add for Eurodollars {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Eurodollars {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl fmt::Display for Eurodollars {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} eb", self.0)
    }
}
