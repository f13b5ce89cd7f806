//! Money arithmetic over `rust_decimal`.
//!
//! No `f64` anywhere on the pricing path. Every operation is checked and
//! reports overflow or currency mismatch as a [`PricingError`].

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::PricingError;

/// An amount in a single currency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    pub amount: Decimal,
    pub currency: String,
}

impl Money {
    pub fn new(amount: Decimal, currency: impl Into<String>) -> Self {
        Money {
            amount,
            currency: currency.into(),
        }
    }

    pub fn zero(currency: impl Into<String>) -> Self {
        Money::new(Decimal::ZERO, currency)
    }

    pub fn is_negative(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }

    /// Add a signed amount in this money's currency.
    pub fn checked_add_amount(&self, delta: Decimal) -> Result<Money, PricingError> {
        let amount = self
            .amount
            .checked_add(delta)
            .ok_or_else(|| PricingError::Overflow {
                message: format!("{} + {}", self.amount, delta),
            })?;
        Ok(Money::new(amount, self.currency.clone()))
    }

    /// Add two amounts of the same currency.
    pub fn checked_add(&self, other: &Money) -> Result<Money, PricingError> {
        if self.currency != other.currency {
            return Err(PricingError::CurrencyMismatch {
                expected: self.currency.clone(),
                found: other.currency.clone(),
            });
        }
        self.checked_add_amount(other.amount)
    }

    /// Multiply by a unit count.
    pub fn checked_mul(&self, quantity: u32) -> Result<Money, PricingError> {
        let amount = self
            .amount
            .checked_mul(Decimal::from(quantity))
            .ok_or_else(|| PricingError::Overflow {
                message: format!("{} x {}", self.amount, quantity),
            })?;
        Ok(Money::new(amount, self.currency.clone()))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usd(amount: i64) -> Money {
        Money::new(Decimal::from(amount), "USD")
    }

    #[test]
    fn add_rejects_mixed_currencies() {
        let err = usd(1).checked_add(&Money::new(Decimal::ONE, "EUR")).unwrap_err();
        assert_eq!(
            err,
            PricingError::CurrencyMismatch {
                expected: "USD".to_string(),
                found: "EUR".to_string()
            }
        );
    }

    #[test]
    fn mul_overflow_is_reported() {
        let huge = Money::new(Decimal::MAX, "USD");
        assert!(matches!(
            huge.checked_mul(2),
            Err(PricingError::Overflow { .. })
        ));
    }

    #[test]
    fn negative_zero_is_not_negative() {
        let m = Money::new(Decimal::new(-0, 2), "USD");
        assert!(!m.is_negative());
        assert!(usd(-1).is_negative());
    }

    #[test]
    fn display_keeps_scale() {
        let m = Money::new(Decimal::new(1999, 2), "USD");
        assert_eq!(m.to_string(), "19.99 USD");
    }
}
