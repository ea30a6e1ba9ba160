//! Validated agent identifiers.
//!
//! Agents are identified by an unsigned 256-bit integer carried across the
//! system as an opaque value. Only this module parses raw input: a non-empty
//! string of ASCII digits, no sign, no hex, no whitespace.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// A validated agent identifier in `[0, 2^256 - 1]`.
///
/// Ordering is numeric, which is what the indexer relies on for its
/// ascending processing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AgentId(U256);

impl AgentId {
    /// Parse a raw agent identifier.
    ///
    /// Accepts only base-10 digits. Distinguishes three failure modes:
    /// missing input, malformed input, and values above `2^256 - 1`.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        if raw.is_empty() {
            return Err(CoreError::MissingAgentId);
        }
        if !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CoreError::MalformedAgentId(raw.to_string()));
        }

        let ten = U256::from(10u8);
        let mut value = U256::ZERO;
        for digit in raw.bytes().map(|b| U256::from(b - b'0')) {
            value = value
                .checked_mul(ten)
                .and_then(|v| v.checked_add(digit))
                .ok_or_else(|| CoreError::AgentIdOutOfRange(raw.to_string()))?;
        }

        Ok(AgentId(value))
    }

    /// The raw 256-bit value.
    pub const fn value(&self) -> U256 {
        self.0
    }

    /// Canonical base-10 string form (no leading zeros).
    pub fn to_decimal(&self) -> String {
        self.0.to_string()
    }
}

impl From<U256> for AgentId {
    fn from(value: U256) -> Self {
        AgentId(value)
    }
}

impl From<u64> for AgentId {
    fn from(value: u64) -> Self {
        AgentId(U256::from(value))
    }
}

impl FromStr for AgentId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AgentId::parse(s)
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for AgentId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_decimal())
    }
}

impl<'de> Deserialize<'de> for AgentId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        AgentId::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_ids() {
        assert_eq!(AgentId::parse("0").unwrap().to_decimal(), "0");
        assert_eq!(AgentId::parse("42").unwrap().to_decimal(), "42");
        assert_eq!(
            AgentId::parse("340282366920938463463374607431768211455")
                .unwrap()
                .to_decimal(),
            "340282366920938463463374607431768211455"
        );
    }

    #[test]
    fn canonicalizes_leading_zeros() {
        assert_eq!(AgentId::parse("007").unwrap().to_decimal(), "7");
    }

    #[test]
    fn parses_uint256_max() {
        let max = U256::MAX.to_string();
        let id = AgentId::parse(&max).unwrap();
        assert_eq!(id.value(), U256::MAX);
        assert_eq!(id.to_decimal(), max);
    }

    #[test]
    fn rejects_above_uint256_max() {
        // U256::MAX + 1 in decimal
        let too_big = "115792089237316195423570985008687907853269984665640564039457584007913129639936";
        assert_eq!(
            AgentId::parse(too_big),
            Err(CoreError::AgentIdOutOfRange(too_big.to_string()))
        );
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(AgentId::parse(""), Err(CoreError::MissingAgentId));
    }

    #[test]
    fn rejects_non_digits() {
        for raw in ["abc", "1e5", "0x10", "+7", "-7", " 7", "7 ", "7.0"] {
            assert_eq!(
                AgentId::parse(raw),
                Err(CoreError::MalformedAgentId(raw.to_string())),
                "should reject {raw:?}"
            );
        }
    }

    #[test]
    fn orders_numerically() {
        let mut ids = vec![
            AgentId::parse("10").unwrap(),
            AgentId::parse("2").unwrap(),
            AgentId::parse("1").unwrap(),
        ];
        ids.sort();
        let decimals: Vec<_> = ids.iter().map(AgentId::to_decimal).collect();
        assert_eq!(decimals, ["1", "2", "10"]);
    }

    #[test]
    fn serde_round_trip() {
        let id = AgentId::parse("12345678901234567890").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"12345678901234567890\"");
        let back: AgentId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn serde_rejects_invalid() {
        assert!(serde_json::from_str::<AgentId>("\"abc\"").is_err());
    }
}
