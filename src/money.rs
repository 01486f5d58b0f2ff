// 💶 Money - fixed-point amounts in cents
//
// Contributions and expenses are stored as INTEGER cents, never as floats,
// so sums and the derived balance are exact.

use crate::error::{Result, RosterError};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::str::FromStr;

/// Cents per whole unit
pub const CENTS_PER_UNIT: i64 = 100;

/// Signed amount in cents. Recorded entries are always positive; a balance
/// may go negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Whole units, e.g. `Money::from_units(50)` is 50.00
    pub fn from_units(units: i64) -> Self {
        Money(units * CENTS_PER_UNIT)
    }

    pub fn cents(&self) -> i64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Reject zero and negative amounts before any mutation happens.
    pub fn ensure_positive(self) -> Result<Money> {
        if self.is_positive() {
            Ok(self)
        } else {
            Err(RosterError::InvalidAmount(format!(
                "{} is not a positive amount",
                self
            )))
        }
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }

    /// Parse operator or sheet text: `50`, `12.5`, `12.50`, `-3.10`.
    /// At most two decimal places, no exponent, no thousands separators.
    pub fn parse(text: &str) -> Result<Money> {
        let invalid = |reason: String| RosterError::InvalidAmount(format!("{:?}: {}", text, reason));

        let trimmed = text.trim();
        if !trimmed.bytes().any(|b| b.is_ascii_digit()) {
            return Err(invalid("not a number".to_string()));
        }

        let amount = Decimal::from_str_exact(trimmed).map_err(|e| invalid(e.to_string()))?;
        if amount.scale() > 2 {
            return Err(invalid("more than two decimal places".to_string()));
        }

        amount
            .checked_mul(Decimal::from(CENTS_PER_UNIT))
            .and_then(|cents| cents.to_i64())
            .map(Money)
            .ok_or_else(|| invalid("amount too large".to_string()))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(
            f,
            "{}{}.{:02}",
            sign,
            abs / CENTS_PER_UNIT as u64,
            abs % CENTS_PER_UNIT as u64
        )
    }
}

impl FromStr for Money {
    type Err = RosterError;

    fn from_str(s: &str) -> Result<Self> {
        Money::parse(s)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        Money(iter.map(|m| m.0).sum())
    }
}

/// Serialized as the display string ("50.00") so JSON consumers never see cents.
impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
