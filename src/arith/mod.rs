//! Exact decimal arithmetic. Every quantity the tabulator reasons about (tallies,
//! thresholds, transfer values) is a [`Decimal`]: a `BigInt` numerator over an
//! explicit power-of-ten scale. Native floats never appear on a result path —
//! two runs on the same inputs must agree to the last digit.

use num::{BigInt, One, Signed, Zero};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;

/// Rounding direction for [`Decimal::divide`]. There is no "round to nearest":
/// the spec only ever calls for truncation or ceiling, both of which are
/// unambiguous and platform-independent for the non-negative values this
/// engine deals in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    Down,
    Up,
}

/// A fixed-point decimal: `unscaled / 10^scale`. Two `Decimal`s with different
/// scales compare and combine correctly; arithmetic never silently drops
/// precision except in [`Decimal::divide`], where the caller names the scale
/// and rounding mode explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decimal {
    unscaled: BigInt,
    scale: u32,
}

fn pow10(exp: u32) -> BigInt {
    BigInt::from(10u64).pow(exp)
}

impl Decimal {
    pub fn zero() -> Self {
        Decimal { unscaled: BigInt::zero(), scale: 0 }
    }

    pub fn one() -> Self {
        Decimal { unscaled: BigInt::one(), scale: 0 }
    }

    pub fn from_i64(value: i64) -> Self {
        Decimal { unscaled: BigInt::from(value), scale: 0 }
    }

    pub fn from_u64(value: u64) -> Self {
        Decimal { unscaled: BigInt::from(value), scale: 0 }
    }

    /// Construct directly from an unscaled integer and its scale, e.g.
    /// `Decimal::new(1, 4)` is `0.0001`.
    pub fn new(unscaled: i64, scale: u32) -> Self {
        Decimal { unscaled: BigInt::from(unscaled), scale }
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    pub fn is_zero(&self) -> bool {
        self.unscaled.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.unscaled.is_positive()
    }

    pub fn is_negative(&self) -> bool {
        self.unscaled.is_negative()
    }

    /// Re-express at (at least) `target_scale`, padding with zero digits.
    /// Never called with a `target_scale` smaller than the current scale —
    /// that would silently lose precision, which this type never does
    /// implicitly.
    fn rescaled_to(&self, target_scale: u32) -> BigInt {
        assert!(
            target_scale >= self.scale,
            "rescaling to a smaller scale would lose precision"
        );
        &self.unscaled * pow10(target_scale - self.scale)
    }

    pub fn add(a: &Decimal, b: &Decimal) -> Decimal {
        let scale = a.scale.max(b.scale);
        Decimal { unscaled: a.rescaled_to(scale) + b.rescaled_to(scale), scale }
    }

    pub fn sub(a: &Decimal, b: &Decimal) -> Decimal {
        let scale = a.scale.max(b.scale);
        Decimal { unscaled: a.rescaled_to(scale) - b.rescaled_to(scale), scale }
    }

    /// Exact product; the result's scale is the sum of the operands' scales,
    /// so no precision is ever discarded by `mul` itself.
    pub fn mul(a: &Decimal, b: &Decimal) -> Decimal {
        Decimal { unscaled: &a.unscaled * &b.unscaled, scale: a.scale + b.scale }
    }

    /// `a / b`, rounded to `target_scale` decimal places in the given
    /// direction. Panics on division by zero — callers are expected to have
    /// already checked for a non-zero divisor (a zero-tally divide is a
    /// tabulator invariant violation, not routine input to handle gracefully).
    pub fn divide(a: &Decimal, b: &Decimal, target_scale: u32, rounding: Rounding) -> Decimal {
        assert!(!b.is_zero(), "division by zero");

        // a/b = (a.unscaled / b.unscaled) * 10^(b.scale - a.scale)
        // want result.unscaled / 10^target_scale == a/b, so
        // result.unscaled == a.unscaled * 10^(target_scale + b.scale - a.scale) / b.unscaled
        let exponent = target_scale as i64 + b.scale as i64 - a.scale as i64;
        let (numerator, denominator) = if exponent >= 0 {
            (&a.unscaled * pow10(exponent as u32), b.unscaled.clone())
        } else {
            (a.unscaled.clone(), &b.unscaled * pow10((-exponent) as u32))
        };

        let quotient = &numerator / &denominator;
        let remainder = &numerator - &quotient * &denominator;

        let unscaled = match rounding {
            Rounding::Down => quotient,
            Rounding::Up => {
                if remainder.is_zero() {
                    quotient
                } else if numerator.is_negative() == denominator.is_negative() {
                    quotient + BigInt::one()
                } else {
                    quotient
                }
            }
        };

        Decimal { unscaled, scale: target_scale }
    }

    pub fn compare(a: &Decimal, b: &Decimal) -> Ordering {
        let scale = a.scale.max(b.scale);
        a.rescaled_to(scale).cmp(&b.rescaled_to(scale))
    }

    pub fn signum(a: &Decimal) -> i32 {
        if a.is_zero() {
            0
        } else if a.is_negative() {
            -1
        } else {
            1
        }
    }

    pub fn min(a: &Decimal, b: &Decimal) -> Decimal {
        if Decimal::compare(a, b) == Ordering::Greater { b.clone() } else { a.clone() }
    }

    pub fn max(a: &Decimal, b: &Decimal) -> Decimal {
        if Decimal::compare(a, b) == Ordering::Less { b.clone() } else { a.clone() }
    }
}

impl Add for &Decimal {
    type Output = Decimal;
    fn add(self, rhs: &Decimal) -> Decimal {
        Decimal::add(self, rhs)
    }
}

impl Sub for &Decimal {
    type Output = Decimal;
    fn sub(self, rhs: &Decimal) -> Decimal {
        Decimal::sub(self, rhs)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scale == 0 {
            return write!(f, "{}", self.unscaled);
        }
        let negative = self.unscaled.is_negative();
        let magnitude = self.unscaled.abs();
        let digits = magnitude.to_str_radix(10);
        let scale = self.scale as usize;
        let padded = if digits.len() <= scale {
            format!("{}{}", "0".repeat(scale - digits.len() + 1), digits)
        } else {
            digits
        };
        let split = padded.len() - scale;
        if negative {
            write!(f, "-{}.{}", &padded[..split], &padded[split..])
        } else {
            write!(f, "{}.{}", &padded[..split], &padded[split..])
        }
    }
}

impl FromStr for Decimal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let negative = s.starts_with('-');
        let s = s.strip_prefix('-').or_else(|| s.strip_prefix('+')).unwrap_or(s);

        let (int_part, frac_part) = match s.split_once('.') {
            Some((i, f)) => (i, f),
            None => (s, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(format!("'{}' is not a decimal number", s));
        }
        let int_part = if int_part.is_empty() { "0" } else { int_part };
        if !int_part.bytes().all(|b| b.is_ascii_digit())
            || !frac_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(format!("'{}' is not a decimal number", s));
        }

        let digits = format!("{}{}", int_part, frac_part);
        let unscaled = BigInt::from_str(&digits).map_err(|e| e.to_string())?;
        let unscaled = if negative { -unscaled } else { unscaled };

        Ok(Decimal { unscaled, scale: frac_part.len() as u32 })
    }
}

impl Serialize for Decimal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Decimal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DecimalVisitor;

        impl<'de> de::Visitor<'de> for DecimalVisitor {
            type Value = Decimal;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a decimal number, as a string or a JSON number")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Decimal, E> {
                Decimal::from_str(value).map_err(E::custom)
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<Decimal, E> {
                Ok(Decimal::from_u64(value))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<Decimal, E> {
                Ok(Decimal::from_i64(value))
            }

            fn visit_f64<E: de::Error>(self, value: f64) -> Result<Decimal, E> {
                // JSON numbers without quotes round-trip through f64 in most
                // encoders; accept them only as a convenience for hand-written
                // fixtures, by going through their canonical string form.
                Decimal::from_str(&value.to_string()).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(DecimalVisitor)
    }
}

/// Bundles the scale/rounding policy configured for a contest so call sites
/// don't have to thread `decimal_places` through every arithmetic call.
#[derive(Debug, Clone, Copy)]
pub struct DecimalArith {
    pub decimal_places: u32,
    pub use_non_integer_thresholds: bool,
}

impl DecimalArith {
    pub fn new(decimal_places: u32, use_non_integer_thresholds: bool) -> Self {
        DecimalArith { decimal_places, use_non_integer_thresholds }
    }

    /// The scale used for threshold computation (§4.6): `decimal_places` when
    /// non-integer thresholds are allowed, otherwise whole numbers only.
    pub fn threshold_scale(&self) -> u32 {
        if self.use_non_integer_thresholds { self.decimal_places } else { 0 }
    }

    pub fn add(&self, a: &Decimal, b: &Decimal) -> Decimal {
        Decimal::add(a, b)
    }

    pub fn sub(&self, a: &Decimal, b: &Decimal) -> Decimal {
        Decimal::sub(a, b)
    }

    pub fn mul(&self, a: &Decimal, b: &Decimal) -> Decimal {
        Decimal::mul(a, b)
    }

    pub fn divide(&self, a: &Decimal, b: &Decimal, scale: u32, rounding: Rounding) -> Decimal {
        Decimal::divide(a, b, scale, rounding)
    }

    pub fn compare(&self, a: &Decimal, b: &Decimal) -> Ordering {
        Decimal::compare(a, b)
    }

    pub fn signum(&self, a: &Decimal) -> i32 {
        Decimal::signum(a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_parse_round_trip() {
        let d = Decimal::new(20001, 4);
        assert_eq!(d.to_string(), "2.0001");
        assert_eq!(Decimal::from_str("2.0001").unwrap(), d);
    }

    #[test]
    fn add_pads_to_common_scale() {
        let a = Decimal::from_i64(1); // scale 0
        let b = Decimal::new(5, 1); // 0.5
        assert_eq!(Decimal::add(&a, &b).to_string(), "1.5");
    }

    #[test]
    fn mul_never_loses_precision() {
        let a = Decimal::new(1, 1); // 0.1
        let b = Decimal::new(1, 1); // 0.1
        let product = Decimal::mul(&a, &b);
        assert_eq!(product.scale(), 2);
        assert_eq!(product.to_string(), "0.01");
    }

    #[test]
    fn divide_round_down_vs_round_up() {
        let a = Decimal::from_i64(5);
        let b = Decimal::from_i64(2);
        assert_eq!(Decimal::divide(&a, &b, 4, Rounding::Down).to_string(), "2.5000");

        let a = Decimal::from_i64(10);
        let b = Decimal::from_i64(3);
        assert_eq!(Decimal::divide(&a, &b, 0, Rounding::Down).to_string(), "3");
        assert_eq!(Decimal::divide(&a, &b, 0, Rounding::Up).to_string(), "4");
    }

    #[test]
    fn droop_threshold_example() {
        // floor(5/2) + 0.0001 = 2.0001, the scenario-1 threshold from SPEC_FULL.md.
        let active = Decimal::from_i64(5);
        let winners_plus_one = Decimal::from_i64(2);
        let base = Decimal::divide(&active, &winners_plus_one, 0, Rounding::Down);
        let augend = Decimal::new(1, 4);
        assert_eq!(Decimal::add(&base, &augend).to_string(), "2.0001");
    }

    #[test]
    fn compare_across_scales() {
        let a = Decimal::new(10, 1); // 1.0
        let b = Decimal::from_i64(1);
        assert_eq!(Decimal::compare(&a, &b), Ordering::Equal);
    }
}
