//! Money amounts in minor units.
//!
//! Ledger arithmetic never touches floating point: amounts are whole minor
//! units (1/100 of the currency unit). A difference below 0.01 is therefore
//! exactly zero.

use core::fmt;
use core::iter::Sum;
use core::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::value_object::ValueObject;

/// Minor units per major unit.
pub const MINOR_PER_MAJOR: i64 = 100;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MoneyError {
    #[error("amount is empty")]
    Empty,

    #[error("malformed amount '{0}'")]
    Malformed(String),

    #[error("amount '{0}' has more than two decimal places")]
    TooPrecise(String),

    #[error("amount is not a finite number")]
    NotFinite,

    #[error("amount out of range")]
    Overflow,
}

/// Signed amount in minor units.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl ValueObject for Money {}

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    pub const fn minor(self) -> i64 {
        self.0
    }

    /// Build from whole major units (e.g. rupees).
    pub fn from_major(major: i64) -> Result<Self, MoneyError> {
        major
            .checked_mul(MINOR_PER_MAJOR)
            .map(Self)
            .ok_or(MoneyError::Overflow)
    }

    /// Convert a floating-point major amount, rounding to the nearest minor unit.
    pub fn from_major_f64(value: f64) -> Result<Self, MoneyError> {
        if !value.is_finite() {
            return Err(MoneyError::NotFinite);
        }
        let scaled = (value * MINOR_PER_MAJOR as f64).round();
        if scaled < i64::MIN as f64 || scaled > i64::MAX as f64 {
            return Err(MoneyError::Overflow);
        }
        Ok(Self(scaled as i64))
    }

    /// Parse a decimal string such as `"1500"`, `"-12.5"` or `"0.05"`.
    pub fn parse(input: &str) -> Result<Self, MoneyError> {
        let s = input.trim();
        if s.is_empty() {
            return Err(MoneyError::Empty);
        }

        let (negative, digits) = match s.as_bytes()[0] {
            b'-' => (true, &s[1..]),
            b'+' => (false, &s[1..]),
            _ => (false, s),
        };

        let (whole, fraction) = match digits.split_once('.') {
            Some((w, f)) => (w, Some(f)),
            None => (digits, None),
        };

        let all_digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(whole) {
            return Err(MoneyError::Malformed(input.to_string()));
        }

        let mut minor: i64 = 0;
        for b in whole.bytes() {
            minor = minor
                .checked_mul(10)
                .and_then(|m| m.checked_add(i64::from(b - b'0')))
                .ok_or(MoneyError::Overflow)?;
        }
        minor = minor.checked_mul(MINOR_PER_MAJOR).ok_or(MoneyError::Overflow)?;

        if let Some(fraction) = fraction {
            if !all_digits(fraction) {
                return Err(MoneyError::Malformed(input.to_string()));
            }
            if fraction.len() > 2 {
                return Err(MoneyError::TooPrecise(input.to_string()));
            }
            let mut cents = fraction.bytes().fold(0i64, |acc, b| acc * 10 + i64::from(b - b'0'));
            if fraction.len() == 1 {
                cents *= 10;
            }
            minor = minor.checked_add(cents).ok_or(MoneyError::Overflow)?;
        }

        Ok(Self(if negative { -minor } else { minor }))
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }

    pub fn abs(self) -> Money {
        Money(self.0.saturating_abs())
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }
}

impl core::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl core::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        *self = *self + rhs;
    }
}

impl core::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0.saturating_sub(rhs.0))
    }
}

impl core::ops::Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(self.0.saturating_neg())
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
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
        let per = MINOR_PER_MAJOR as u64;
        write!(f, "{sign}{}.{:02}", abs / per, abs % per)
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Money::parse(s)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MoneyVisitor;

        impl Visitor<'_> for MoneyVisitor {
            type Value = Money;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a decimal amount as a string or number")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Money, E> {
                Money::parse(v).map_err(E::custom)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Money, E> {
                Money::from_major(v).map_err(E::custom)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Money, E> {
                let v = i64::try_from(v).map_err(|_| E::custom(MoneyError::Overflow))?;
                Money::from_major(v).map_err(E::custom)
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Money, E> {
                Money::from_major_f64(v).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(MoneyVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_common_shapes() {
        assert_eq!(Money::parse("1500").unwrap(), Money::from_minor(150_000));
        assert_eq!(Money::parse("12.5").unwrap(), Money::from_minor(1_250));
        assert_eq!(Money::parse("0.05").unwrap(), Money::from_minor(5));
        assert_eq!(Money::parse("-3.10").unwrap(), Money::from_minor(-310));
        assert_eq!(Money::parse(" +7 ").unwrap(), Money::from_minor(700));
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(Money::parse(""), Err(MoneyError::Empty));
        assert!(matches!(Money::parse("abc"), Err(MoneyError::Malformed(_))));
        assert!(matches!(Money::parse(".5"), Err(MoneyError::Malformed(_))));
        assert!(matches!(Money::parse("5."), Err(MoneyError::Malformed(_))));
        assert!(matches!(Money::parse("1.005"), Err(MoneyError::TooPrecise(_))));
        assert_eq!(Money::parse("99999999999999999999"), Err(MoneyError::Overflow));
    }

    #[test]
    fn display_has_two_decimals() {
        assert_eq!(Money::from_minor(-1_205).to_string(), "-12.05");
        assert_eq!(Money::from_minor(7).to_string(), "0.07");
        assert_eq!(Money::ZERO.to_string(), "0.00");
    }

    #[test]
    fn float_input_rounds_to_nearest_minor_unit() {
        assert_eq!(Money::from_major_f64(0.1 + 0.2).unwrap(), Money::from_minor(30));
        assert_eq!(Money::from_major_f64(f64::NAN), Err(MoneyError::NotFinite));
    }

    #[test]
    fn json_accepts_strings_and_numbers() {
        let from_str: Money = serde_json::from_str("\"250.75\"").unwrap();
        let from_int: Money = serde_json::from_str("250").unwrap();
        let from_float: Money = serde_json::from_str("250.75").unwrap();
        assert_eq!(from_str, Money::from_minor(25_075));
        assert_eq!(from_int, Money::from_minor(25_000));
        assert_eq!(from_float, from_str);
        assert_eq!(serde_json::to_string(&from_str).unwrap(), "\"250.75\"");
    }

    proptest! {
        #[test]
        fn display_then_parse_is_identity(minor in -1_000_000_000_000i64..1_000_000_000_000i64) {
            let m = Money::from_minor(minor);
            prop_assert_eq!(Money::parse(&m.to_string()).unwrap(), m);
        }
    }
}
