//! Monetary type for Cashdesk balances and request amounts.
//!
//! All amounts are fixed-point decimals with two fractional digits, matching
//! the `NUMERIC(12,2)` columns in the store. Binary floats never touch a
//! balance.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of fractional digits carried by every amount.
pub const MONEY_SCALE: u32 = 2;

/// Largest value a `NUMERIC(12,2)` column can hold, in minor units.
const MAX_MINOR_UNITS: i64 = 999_999_999_999;

/// A non-negative monetary amount with two decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    /// The zero amount.
    pub const ZERO: Money = Money(Decimal::from_parts(0, 0, 0, false, MONEY_SCALE));

    /// Create a new amount, rejecting negative, over-precise and out-of-range values.
    pub fn new(value: Decimal) -> Result<Self, MoneyError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(MoneyError::Negative(value));
        }

        if value.normalize().scale() > MONEY_SCALE {
            return Err(MoneyError::TooPrecise(value));
        }

        if value > Self::max().0 {
            return Err(MoneyError::OutOfRange(value));
        }

        let mut value = value;
        value.rescale(MONEY_SCALE);
        Ok(Self(value))
    }

    /// Create from minor units (cents).
    pub fn from_minor(minor: i64) -> Result<Self, MoneyError> {
        Self::new(Decimal::new(minor, MONEY_SCALE))
    }

    /// Largest representable amount (`9999999999.99`).
    pub fn max() -> Self {
        Self(Decimal::new(MAX_MINOR_UNITS, MONEY_SCALE))
    }

    /// Get the decimal value.
    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Check if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Check if the amount is strictly positive.
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Add two amounts, failing if the sum leaves the representable range.
    pub fn checked_add(&self, other: Money) -> Result<Money, MoneyError> {
        Money::new(self.0 + other.0)
    }

    /// Subtract an amount, failing if the result would be negative.
    pub fn checked_sub(&self, other: Money) -> Result<Money, MoneyError> {
        Money::new(self.0 - other.0)
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str_exact(s.trim()).map_err(|e| MoneyError::Parse(e.to_string()))?;
        Money::new(value)
    }
}

impl TryFrom<Decimal> for Money {
    type Error = MoneyError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Money::new(value)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

/// Error when constructing or combining amounts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    /// Amount is below zero.
    #[error("amount {0} is negative")]
    Negative(Decimal),

    /// Amount carries more than two decimal places.
    #[error("amount {0} has more than 2 decimal places")]
    TooPrecise(Decimal),

    /// Amount exceeds the largest storable value.
    #[error("amount {0} exceeds the maximum of 9999999999.99")]
    OutOfRange(Decimal),

    /// Input is not a decimal number.
    #[error("invalid amount: {0}")]
    Parse(String),
}
