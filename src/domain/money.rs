use crate::error::{DisbursementError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

/// A non-negative monetary amount in minor units (two decimal places) of the
/// reference currency.
///
/// Decimal major-unit figures only appear at the CSV boundary; everything
/// inside the engine works in whole cents.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Cents(u64);

impl Cents {
    pub const ZERO: Self = Self(0);

    pub fn new(cents: u64) -> Self {
        Self(cents)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// Converts a major-unit decimal such as `5000.25` into cents.
    ///
    /// Negative values and more than two fractional digits are rejected rather
    /// than rounded.
    pub fn from_decimal(value: Decimal) -> Result<Self> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(DisbursementError::Validation(format!(
                "amount must not be negative: {value}"
            )));
        }
        let scaled = value
            .checked_mul(Decimal::ONE_HUNDRED)
            .ok_or_else(|| DisbursementError::Validation(format!("amount out of range: {value}")))?;
        if !scaled.fract().is_zero() {
            return Err(DisbursementError::Validation(format!(
                "amount has more than two decimal places: {value}"
            )));
        }
        u64::try_from(scaled.trunc())
            .map(Self)
            .map_err(|_| DisbursementError::Validation(format!("amount out of range: {value}")))
    }

    pub fn to_decimal(self) -> Decimal {
        Decimal::from(self.0) / Decimal::ONE_HUNDRED
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }
}

impl FromStr for Cents {
    type Err = DisbursementError;

    fn from_str(s: &str) -> Result<Self> {
        let value = Decimal::from_str(s.trim())
            .map_err(|e| DisbursementError::Validation(format!("invalid amount '{s}': {e}")))?;
        Self::from_decimal(value)
    }
}

impl fmt::Display for Cents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.to_decimal())
    }
}

impl Add for Cents {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Cents {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sum for Cents {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

/// An ISO-4217-like currency code (`CNY`, `USDT`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub fn new(code: &str) -> Result<Self> {
        let code = code.trim();
        let valid = (2..=8).contains(&code.len())
            && code.chars().all(|c| c.is_ascii_alphanumeric());
        if valid {
            Ok(Self(code.to_ascii_uppercase()))
        } else {
            Err(DisbursementError::Validation(format!(
                "invalid currency code '{code}'"
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = DisbursementError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(&value)
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.0
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
