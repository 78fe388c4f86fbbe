//! 18-decimal fixed-point amount backed by a 256-bit unsigned integer.
//!
//! Every operation is checked. Callers keep the multiply-before-divide order
//! of the formulas they implement; `mul_div` exists so that order is explicit.

use primitive_types::U256;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of decimals in one whole unit.
pub const DECIMALS: u32 = 18;

const WAD: u64 = 1_000_000_000_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MathError {
    #[error("arithmetic overflow")]
    Overflow,
    #[error("arithmetic underflow")]
    Underflow,
    #[error("division by zero")]
    DivisionByZero,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountParseError {
    #[error("invalid integer amount: {0}")]
    InvalidInteger(String),
    #[error("invalid decimal amount: {0}")]
    InvalidDecimal(String),
    #[error("amount must not be negative: {0}")]
    Negative(String),
    #[error("amount has more than 18 decimals: {0}")]
    TooPrecise(String),
}

/// Unsigned fixed-point quantity in base units (1 unit = 10^18 base units).
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(U256);

impl Amount {
    pub const ZERO: Amount = Amount(U256([0, 0, 0, 0]));
    /// One whole unit, the fixed-point scale.
    pub const PRECISION: Amount = Amount(U256([WAD, 0, 0, 0]));
    pub const MAX: Amount = Amount(U256::MAX);

    pub const fn new(value: U256) -> Self {
        Amount(value)
    }

    /// Const constructor from base units.
    pub const fn new_const(value: u128) -> Self {
        Amount(U256([value as u64, (value >> 64) as u64, 0, 0]))
    }

    /// Amount in base units.
    pub fn from_base(value: u128) -> Self {
        Amount(U256::from(value))
    }

    /// Amount in whole units (`whole * 10^18` base units).
    pub fn from_whole(whole: u64) -> Self {
        Amount(U256::from(whole) * U256::from(WAD))
    }

    /// `2^bits - 1`.
    pub fn max_bits(bits: usize) -> Self {
        if bits >= 256 {
            return Amount::MAX;
        }
        Amount((U256::one() << bits) - U256::one())
    }

    /// Interpret up to 32 bytes as a big-endian integer.
    pub fn from_be_bytes(bytes: &[u8]) -> Self {
        let start = bytes.len().saturating_sub(32);
        Amount(U256::from_big_endian(&bytes[start..]))
    }

    pub fn inner(&self) -> U256 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn checked_add(self, rhs: Amount) -> Result<Amount, MathError> {
        self.0.checked_add(rhs.0).map(Amount).ok_or(MathError::Overflow)
    }

    pub fn checked_sub(self, rhs: Amount) -> Result<Amount, MathError> {
        self.0.checked_sub(rhs.0).map(Amount).ok_or(MathError::Underflow)
    }

    pub fn checked_mul(self, rhs: Amount) -> Result<Amount, MathError> {
        self.0.checked_mul(rhs.0).map(Amount).ok_or(MathError::Overflow)
    }

    pub fn checked_div(self, rhs: Amount) -> Result<Amount, MathError> {
        if rhs.is_zero() {
            return Err(MathError::DivisionByZero);
        }
        Ok(Amount(self.0 / rhs.0))
    }

    pub fn checked_rem(self, rhs: Amount) -> Result<Amount, MathError> {
        if rhs.is_zero() {
            return Err(MathError::DivisionByZero);
        }
        Ok(Amount(self.0 % rhs.0))
    }

    /// `self * mul / div`, truncating. The product must fit in 256 bits.
    pub fn mul_div(self, mul: Amount, div: Amount) -> Result<Amount, MathError> {
        self.checked_mul(mul)?.checked_div(div)
    }

    pub fn saturating_add(self, rhs: Amount) -> Amount {
        Amount(self.0.saturating_add(rhs.0))
    }

    pub fn saturating_sub(self, rhs: Amount) -> Amount {
        Amount(self.0.saturating_sub(rhs.0))
    }

    /// Logical right shift; shifts of 256 or more yield zero.
    pub fn shr(self, bits: u64) -> Amount {
        if bits >= 256 {
            return Amount::ZERO;
        }
        Amount(self.0 >> bits as usize)
    }

    /// Parse a human-readable decimal in whole units ("0.01" -> 10^16 base units).
    pub fn parse_units(s: &str) -> Result<Amount, AmountParseError> {
        let trimmed = s.trim();
        let value = Decimal::from_str(trimmed)
            .map_err(|_| AmountParseError::InvalidDecimal(trimmed.to_string()))?;
        if value.is_sign_negative() && !value.is_zero() {
            return Err(AmountParseError::Negative(trimmed.to_string()));
        }
        if value.scale() > DECIMALS {
            return Err(AmountParseError::TooPrecise(trimmed.to_string()));
        }

        // Split into integer and fractional parts so large whole values don't
        // overflow the 96-bit decimal mantissa when scaled.
        let whole = value
            .trunc()
            .to_u128()
            .ok_or_else(|| AmountParseError::InvalidDecimal(trimmed.to_string()))?;
        let frac = (value.fract() * Decimal::from(WAD))
            .trunc()
            .to_u128()
            .ok_or_else(|| AmountParseError::InvalidDecimal(trimmed.to_string()))?;

        let base = U256::from(whole)
            .checked_mul(U256::from(WAD))
            .and_then(|v| v.checked_add(U256::from(frac)))
            .ok_or_else(|| AmountParseError::InvalidDecimal(trimmed.to_string()))?;
        Ok(Amount(base))
    }

    /// Format in whole units without trailing zeros ("0.01", "7200").
    pub fn format_units(&self) -> String {
        let wad = U256::from(WAD);
        let whole = self.0 / wad;
        let frac = (self.0 % wad).low_u64();
        if frac == 0 {
            return whole.to_string();
        }
        let frac_str = format!("{:018}", frac);
        format!("{}.{}", whole, frac_str.trim_end_matches('0'))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Amount({})", self.0)
    }
}

/// Parses an integer amount in base units.
impl FromStr for Amount {
    type Err = AmountParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
            return Err(AmountParseError::InvalidInteger(s.to_string()));
        }
        U256::from_dec_str(trimmed)
            .map(Amount)
            .map_err(|_| AmountParseError::InvalidInteger(s.to_string()))
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Amount(U256::from(value))
    }
}

impl From<U256> for Amount {
    fn from(value: U256) -> Self {
        Amount(value)
    }
}

// Serialized as a decimal string of base units; JSON numbers cannot hold 2^192.
impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
