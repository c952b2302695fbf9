//! Money in integer minor units (paise/cents).
//!
//! Everything that crosses the wire is a decimal number in major units; all
//! arithmetic happens on `i64` minor units so sums never leak rounding error.
//! Conversions from floating point round half-up (`floor(x * 100 + 0.5)`).

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

use bigdecimal::{BigDecimal, ToPrimitive};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum MoneyError {
    #[error("amount is not a finite number: {0}")]
    NonFinite(f64),
    #[error("amount '{0}' is not a decimal number")]
    Parse(String),
    #[error("amount '{0}' is out of range")]
    OutOfRange(String),
}

/// Round a major-unit float to 2 decimals, half-up.
pub fn round2(value: f64) -> f64 {
    (value * 100.0 + 0.5).floor() / 100.0
}

fn half_up(value: f64) -> i64 {
    // `as` saturates at the i64 bounds
    (value + 0.5).floor() as i64
}

/// Arithmetic saturates at the `i64` bounds rather than overflowing; callers
/// that take amounts from requests bound them before pricing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub const fn as_cents(self) -> i64 {
        self.0
    }

    pub fn from_major(value: f64) -> Result<Self, MoneyError> {
        if !value.is_finite() {
            return Err(MoneyError::NonFinite(value));
        }
        Ok(Self(half_up(value * 100.0)))
    }

    pub fn as_major(self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Negative amounts collapse to zero.
    pub fn non_negative(self) -> Self {
        Self(self.0.max(0))
    }

    /// `self * quantity`, rounded half-up to the nearest minor unit.
    pub fn times(self, quantity: f64) -> Self {
        if !quantity.is_finite() {
            return Self::ZERO;
        }
        Self(half_up(self.0 as f64 * quantity))
    }

    /// `self / divisor`, rounded half-up. A zero divisor yields zero.
    pub fn divided_by(self, divisor: f64) -> Self {
        if divisor == 0.0 || !divisor.is_finite() {
            return Self::ZERO;
        }
        Self(half_up(self.0 as f64 / divisor))
    }

    /// `percent` of this amount, rounded half-up.
    pub fn percent(self, percent: f64) -> Self {
        self.times(percent / 100.0)
    }

    pub fn abs(self) -> Money {
        Money(self.0.saturating_abs())
    }

    pub fn abs_diff(self, other: Money) -> Money {
        Money(self.0.saturating_sub(other.0).saturating_abs())
    }

    /// Whole major units, rounded down; used for point redemption.
    pub fn whole_units(self) -> i64 {
        self.0.div_euclid(100)
    }

    pub fn from_whole_units(units: i64) -> Self {
        Self(units.saturating_mul(100))
    }
}

impl Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl Sub for Money {
    type Output = Money;
    fn sub(self, rhs: Money) -> Money {
        Money(self.0.saturating_sub(rhs.0))
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        self.0 = self.0.saturating_sub(rhs.0);
    }
}

impl Neg for Money {
    type Output = Money;
    fn neg(self) -> Money {
        Money(self.0.saturating_neg())
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.copied().sum()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let value = BigDecimal::from_str(trimmed).map_err(|_| MoneyError::Parse(trimmed.to_string()))?;
        Money::try_from(&value)
    }
}

impl TryFrom<&BigDecimal> for Money {
    type Error = MoneyError;

    fn try_from(value: &BigDecimal) -> Result<Self, Self::Error> {
        let scaled = value * BigDecimal::from(100);
        let truncated = scaled.with_scale(0);
        let remainder = &scaled - &truncated;
        let half = BigDecimal::new(5.into(), 1);
        let mut cents = truncated
            .to_i64()
            .ok_or_else(|| MoneyError::OutOfRange(value.to_string()))?;
        if remainder >= half {
            cents += 1;
        } else if remainder <= -half {
            cents -= 1;
        }
        Ok(Money(cents))
    }
}

impl From<Money> for BigDecimal {
    fn from(value: Money) -> Self {
        (BigDecimal::from(value.0) / BigDecimal::from(100)).with_scale(2)
    }
}

/// Normalize a stored numeric value to 2 decimal places, half-up.
pub fn normalize_scale(value: &BigDecimal) -> BigDecimal {
    match Money::try_from(value) {
        Ok(money) => money.into(),
        Err(_) => value.with_scale(2),
    }
}

/// Compare two amounts allowing a tolerance in minor units.
pub fn nearly_equal(a: Money, b: Money, cents_tolerance: i64) -> bool {
    a.abs_diff(b).as_cents() <= cents_tolerance
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_major())
    }
}

struct MoneyVisitor;

impl<'de> Visitor<'de> for MoneyVisitor {
    type Value = Money;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a decimal amount as a number or numeric string")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Money, E> {
        Ok(Money::from_cents(v.saturating_mul(100)))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Money, E> {
        let v = i64::try_from(v).map_err(|_| E::custom(MoneyError::OutOfRange(v.to_string())))?;
        self.visit_i64(v)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Money, E> {
        Money::from_major(v).map_err(E::custom)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Money, E> {
        Money::from_str(v).map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(MoneyVisitor)
    }
}
