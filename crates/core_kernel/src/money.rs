//! Money types with precise decimal arithmetic
//!
//! Claim and premium amounts arrive as decimals with a currency. Scoring
//! works in `f64`, so the conversion is explicit and fallible.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Currency codes following ISO 4217
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    USD,
    EUR,
    GBP,
    CAD,
    AUD,
}

impl Currency {
    /// Returns the ISO 4217 code
    pub fn code(&self) -> &'static str {
        match self {
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::GBP => "GBP",
            Currency::CAD => "CAD",
            Currency::AUD => "AUD",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors that can occur during money operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Currency mismatch: cannot operate on {0} and {1}")]
    CurrencyMismatch(String, String),

    #[error("Amount {0} is not representable as a float")]
    NotRepresentable(String),
}

/// A monetary amount with associated currency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: Currency,
}

impl Money {
    /// Creates a new Money value, rounded to 4 decimal places
    pub fn new(amount: Decimal, currency: Currency) -> Self {
        Self {
            amount: amount.round_dp(4),
            currency,
        }
    }

    /// Creates a zero amount in the specified currency
    pub fn zero(currency: Currency) -> Self {
        Self {
            amount: dec!(0),
            currency,
        }
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn is_negative(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }

    /// Converts the amount to `f64` for numeric feature work
    pub fn to_f64(&self) -> Result<f64, MoneyError> {
        self.amount
            .to_f64()
            .filter(|v| v.is_finite())
            .ok_or_else(|| MoneyError::NotRepresentable(self.amount.to_string()))
    }

    /// Ratio `self / (other + 1)`, the smoothed form used for claim-to-premium
    pub fn smoothed_ratio_to(&self, other: &Money) -> Result<f64, MoneyError> {
        self.ensure_same_currency(other)?;
        Ok(self.to_f64()? / (other.to_f64()? + 1.0))
    }

    fn ensure_same_currency(&self, other: &Money) -> Result<(), MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch(
                self.currency.to_string(),
                other.currency.to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} {}", self.amount, self.currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_rounds_to_four_places() {
        let m = Money::new(dec!(10.123456), Currency::USD);
        assert_eq!(m.amount(), dec!(10.1235));
    }

    #[test]
    fn test_zero_is_not_negative() {
        assert!(!Money::zero(Currency::USD).is_negative());
        assert!(Money::new(dec!(-1), Currency::USD).is_negative());
    }

    #[test]
    fn test_smoothed_ratio() {
        let claim = Money::new(dec!(1000), Currency::USD);
        let premium = Money::new(dec!(99), Currency::USD);
        assert!((claim.smoothed_ratio_to(&premium).unwrap() - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_ratio_rejects_currency_mismatch() {
        let claim = Money::new(dec!(1000), Currency::USD);
        let premium = Money::new(dec!(99), Currency::EUR);
        assert!(matches!(
            claim.smoothed_ratio_to(&premium),
            Err(MoneyError::CurrencyMismatch(_, _))
        ));
    }
}
