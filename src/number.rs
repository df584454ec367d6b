// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.
#![allow(clippy::as_conversions, clippy::float_cmp)]

use core::cmp::Ordering;
use core::fmt::{self, Debug, Display, Formatter};
use core::hash::{Hash, Hasher};
use core::str::FromStr;

use anyhow::{bail, Result};
use serde::ser::Serializer;
use serde::Serialize;

const F64_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0; // 2^53
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0; // 2^63

/// A JSON number.
///
/// Integers that fit in an `i64` are kept exact; everything else is a float.
/// Equality, ordering and hashing are numeric, so `1` and `1.0` are the same
/// number and interchangeable as object keys or set members.
#[derive(Clone, Copy)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Number::Int(i) => Some(i),
            Number::Float(f) => Self::float_to_i64(f),
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.as_i64().and_then(|i| u64::try_from(i).ok())
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    pub fn is_integer(&self) -> bool {
        self.as_i64().is_some()
    }

    fn float_to_i64(value: f64) -> Option<i64> {
        if !value.is_finite() || value.fract() != 0.0 || value.abs() > F64_SAFE_INTEGER {
            return None;
        }
        let i = value as i64;
        (i as f64 == value).then_some(i)
    }

    // The exact integer value of `value`, if it has one that fits an i64.
    fn exact_i64(value: f64) -> Option<i64> {
        if !value.is_finite() || value.fract() != 0.0 || !(-I64_BOUND..I64_BOUND).contains(&value) {
            return None;
        }
        Some(value as i64)
    }

    // Exact comparison of an integer with a float. Converting `i` to f64
    // would round above 2^53 and make equality intransitive.
    fn cmp_int_float(i: i64, f: f64) -> Ordering {
        if f.is_nan() {
            return Ordering::Less;
        }
        if f >= I64_BOUND {
            return Ordering::Less;
        }
        if f < -I64_BOUND {
            return Ordering::Greater;
        }
        let whole = f.trunc();
        match i.cmp(&(whole as i64)) {
            Ordering::Equal => Self::cmp_f64(0.0, f - whole),
            ord => ord,
        }
    }

    // NaN sorts after every other number so that the order stays total.
    fn cmp_f64(a: f64, b: f64) -> Ordering {
        match a.partial_cmp(&b) {
            Some(ord) => ord,
            None => a.is_nan().cmp(&b.is_nan()),
        }
    }
}

impl Ord for Number {
    fn cmp(&self, other: &Self) -> Ordering {
        match (*self, *other) {
            (Number::Int(a), Number::Int(b)) => a.cmp(&b),
            (Number::Int(a), Number::Float(b)) => Self::cmp_int_float(a, b),
            (Number::Float(a), Number::Int(b)) => Self::cmp_int_float(b, a).reverse(),
            (Number::Float(a), Number::Float(b)) => Self::cmp_f64(a, b),
        }
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Number {}

impl Hash for Number {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Integral floats hash like the integer they are equal to.
        match *self {
            Number::Int(i) => i.hash(state),
            Number::Float(f) => match Self::exact_i64(f) {
                Some(i) => i.hash(state),
                None if f.is_nan() => f64::NAN.to_bits().hash(state),
                None => f.to_bits().hash(state),
            },
        }
    }
}

impl From<i64> for Number {
    fn from(n: i64) -> Self {
        Number::Int(n)
    }
}

impl From<u64> for Number {
    fn from(n: u64) -> Self {
        match i64::try_from(n) {
            Ok(i) => Number::Int(i),
            Err(_) => Number::Float(n as f64),
        }
    }
}

impl From<usize> for Number {
    fn from(n: usize) -> Self {
        Number::from(n as u64)
    }
}

impl From<i32> for Number {
    fn from(n: i32) -> Self {
        Number::Int(i64::from(n))
    }
}

impl From<f64> for Number {
    fn from(n: f64) -> Self {
        match Self::float_to_i64(n) {
            Some(i) => Number::Int(i),
            None => Number::Float(n),
        }
    }
}

impl FromStr for Number {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        if let Ok(i) = s.parse::<i64>() {
            return Ok(Number::Int(i));
        }
        match s.parse::<f64>() {
            Ok(f) if f.is_finite() => Ok(Number::from(f)),
            _ => bail!("invalid number `{s}`"),
        }
    }
}

impl Serialize for Number {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match *self {
            Number::Int(i) => serializer.serialize_i64(i),
            Number::Float(f) => match Self::float_to_i64(f) {
                Some(i) => serializer.serialize_i64(i),
                None => serializer.serialize_f64(f),
            },
        }
    }
}

impl Display for Number {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.as_i64() {
            Some(i) => write!(f, "{i}"),
            None => write!(f, "{}", self.as_f64()),
        }
    }
}

impl Debug for Number {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}
