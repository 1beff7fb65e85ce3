//! Monetary amounts using decimal arithmetic.
//!
//! Catalog prices and carrier quotes are decimals in the currency's standard
//! unit (rupees, dollars). The payment processor wants integer minor units,
//! so the conversion lives here and refuses amounts it cannot represent
//! exactly.

use core::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Errors converting a [`Money`] value.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// The amount has more fractional digits than the currency allows.
    #[error("amount {0} has sub-cent precision")]
    SubMinorUnit(Decimal),
    /// The amount does not fit into an `i64` of minor units.
    #[error("amount {0} is out of range")]
    OutOfRange(Decimal),
    /// Negative amounts cannot be charged.
    #[error("amount {0} is negative")]
    Negative(Decimal),
}

/// An amount together with its ISO 4217 currency code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// Amount in the currency's standard unit (e.g., dollars, not cents).
    pub amount: Decimal,
    /// ISO 4217 currency code, upper case.
    pub currency: String,
}

impl Money {
    /// Number of minor units per standard unit for two-decimal currencies.
    const MINOR_SCALE: u32 = 2;

    /// Create a new amount; the currency code is upper-cased.
    #[must_use]
    pub fn new(amount: Decimal, currency: &str) -> Self {
        Self {
            amount,
            currency: currency.to_ascii_uppercase(),
        }
    }

    /// Convert to integer minor units (e.g., cents).
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError`] if the amount is negative, carries sub-cent
    /// precision, or overflows an `i64`.
    pub fn to_minor_units(&self) -> Result<i64, MoneyError> {
        if self.amount.is_sign_negative() && !self.amount.is_zero() {
            return Err(MoneyError::Negative(self.amount));
        }
        let normalized = self.amount.normalize();
        if normalized.scale() > Self::MINOR_SCALE {
            return Err(MoneyError::SubMinorUnit(self.amount));
        }
        (normalized * Decimal::ONE_HUNDRED)
            .to_i64()
            .ok_or(MoneyError::OutOfRange(self.amount))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}",
            self.amount.round_dp(Self::MINOR_SCALE),
            self.currency
        )
    }
}

/// Round to whole minor units, half away from zero.
#[must_use]
pub fn round_amount(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(Money::MINOR_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Format a decimal amount with exactly two fractional digits.
#[must_use]
pub fn format_amount(amount: Decimal) -> String {
    let mut rounded = amount.round_dp(2);
    rounded.rescale(2);
    rounded.to_string()
}
