use crate::error::ValidationError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A non-negative monetary value in the till's single currency.
///
/// This is a wrapper around `rust_decimal::Decimal` so prices, totals and
/// cash amounts can never go below zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(value: Decimal) -> Result<Self, ValidationError> {
        if value >= Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(ValidationError::NegativeAmount)
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Subtracts `rhs`, clamping at zero instead of going negative.
    pub fn saturating_sub(self, rhs: Self) -> Self {
        if self.0 > rhs.0 {
            Self(self.0 - rhs.0)
        } else {
            Self::ZERO
        }
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn checked_add(self, rhs: Self) -> Result<Self, ValidationError> {
        self.0
            .checked_add(rhs.0)
            .map(Self)
            .ok_or(ValidationError::AmountOverflow)
    }

    /// Price of `quantity` units.
    pub fn checked_mul(self, quantity: u32) -> Result<Self, ValidationError> {
        self.0
            .checked_mul(Decimal::from(quantity))
            .map(Self)
            .ok_or(ValidationError::AmountOverflow)
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = ValidationError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}
