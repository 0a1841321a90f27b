//! Ethereum JSON-RPC "quantity" encoding: `0x` prefixed hex without leading
//! zeros.

use serde::{Deserialize, Deserializer, Serializer};

pub fn parse_quantity(raw: &str) -> Result<u64, String> {
    let digits = raw.strip_prefix("0x").ok_or_else(|| format!("missing 0x prefix: {raw:?}"))?;
    if digits.is_empty() {
        return Err(format!("empty quantity: {raw:?}"));
    }
    u64::from_str_radix(digits, 16).map_err(|e| format!("invalid quantity {raw:?}: {e}"))
}

pub fn to_quantity(value: u64) -> String {
    format!("{value:#x}")
}

pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&to_quantity(*value))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_quantity(&raw).map_err(serde::de::Error::custom)
}
