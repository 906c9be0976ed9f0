//! Exact currency arithmetic.
//!
//! On-chain values are unsigned 256-bit integers. The [`Currency`] newtype
//! keeps all arithmetic explicit: additions and multiplications are checked,
//! and the one place the protocol subtracts values that could underflow
//! (siafund claim computation) uses saturating subtraction. Values
//! serialize as decimal strings so that no consumer is tempted to squeeze
//! them through a 64-bit integer.

use std::fmt;
use std::str::FromStr;

use primitive_types::U256;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// An exact, non-negative currency value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct Currency(U256);

impl Currency {
    /// The zero value.
    pub const ZERO: Currency = Currency(U256::zero());

    /// Construct from a 64-bit integer.
    pub fn new(value: u64) -> Self {
        Currency(U256::from(value))
    }

    /// Construct from raw big-endian bytes (at most 32).
    pub fn from_be_bytes(bytes: &[u8]) -> Self {
        Currency(U256::from_big_endian(bytes))
    }

    /// Big-endian byte encoding, fixed 32 bytes. Used when a value feeds an
    /// identifier hash.
    pub fn to_be_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        self.0.to_big_endian(&mut out);
        out
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn checked_add(&self, rhs: Currency) -> Option<Currency> {
        self.0.checked_add(rhs.0).map(Currency)
    }

    pub fn checked_sub(&self, rhs: Currency) -> Option<Currency> {
        self.0.checked_sub(rhs.0).map(Currency)
    }

    /// Subtraction clamped at zero. Claim-start values recorded before a
    /// pool reset can exceed the current pool; the claim is then zero.
    pub fn saturating_sub(&self, rhs: Currency) -> Currency {
        Currency(self.0.saturating_sub(rhs.0))
    }

    pub fn checked_mul(&self, rhs: Currency) -> Option<Currency> {
        self.0.checked_mul(rhs.0).map(Currency)
    }

    /// Multiplication clamped at the maximum representable value.
    pub fn saturating_mul(&self, rhs: Currency) -> Currency {
        Currency(self.0.saturating_mul(rhs.0))
    }
}

impl From<u64> for Currency {
    fn from(value: u64) -> Self {
        Currency::new(value)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        U256::from_dec_str(s)
            .map(Currency)
            .map_err(|e| format!("invalid currency value {s:?}: {e}"))
    }
}

impl Serialize for Currency {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Currency {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Currency::from_str(&s).map_err(de::Error::custom)
    }
}
