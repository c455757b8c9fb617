//! Payment amount value object.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ValidationError;

/// Decimal places the payment network settles in. Storage uses the same scale.
pub const AMOUNT_SCALE: u32 = 7;

/// Strictly positive amount in the payment network's currency.
///
/// Decimal rather than float so stored and reported amounts compare exactly.
/// At most [`AMOUNT_SCALE`] fractional digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    /// Creates an amount, rejecting zero, negative values, and anything
    /// finer than [`AMOUNT_SCALE`] decimal places.
    pub fn new(value: Decimal) -> Result<Self, ValidationError> {
        if value <= Decimal::ZERO {
            return Err(ValidationError::not_positive("amount", value));
        }
        let value = value.normalize();
        if value.scale() > AMOUNT_SCALE {
            return Err(ValidationError::invalid_format(
                "amount",
                format!("more than {} decimal places", AMOUNT_SCALE),
            ));
        }
        Ok(Self(value))
    }

    /// Parses an amount from its decimal string form.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let value = Decimal::from_str(s.trim())
            .map_err(|e| ValidationError::invalid_format("amount", e.to_string()))?;
        Self::new(value)
    }

    /// Converts a client float. Fails on NaN or infinity.
    ///
    /// Binary float noise below [`AMOUNT_SCALE`] places is rounded away, so
    /// `0.1 + 0.2` becomes `0.3`.
    pub fn from_f64(value: f64) -> Result<Self, ValidationError> {
        if !value.is_finite() {
            return Err(ValidationError::invalid_format("amount", "not a finite number"));
        }
        // Shortest round-trip form, so 3.14 stays 3.14.
        let exact = Decimal::from_str(&value.to_string())
            .map_err(|e| ValidationError::invalid_format("amount", e.to_string()))?;
        Self::new(exact.round_dp(AMOUNT_SCALE))
    }

    /// Returns the underlying decimal.
    pub fn value(&self) -> Decimal {
        self.0
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
        write!(f, "{}", self.0)
    }
}
