//! 32-byte ledger addresses and object ids

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Length of an address in bytes
pub const ADDRESS_LENGTH: usize = 32;

/// Owner address or object id
///
/// Rendered as `0x` followed by 64 lowercase hex digits. Parsing accepts the
/// short forms the ledger uses for system objects (`0x6`).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_LENGTH]);

/// Object ids share the address space
pub type ObjectId = Address;

impl Address {
    pub const ZERO: Address = Address([0u8; ADDRESS_LENGTH]);

    pub const fn new(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Build a short system address such as `0x2` or `0x6`
    pub const fn from_u8(value: u8) -> Self {
        let mut bytes = [0u8; ADDRESS_LENGTH];
        bytes[ADDRESS_LENGTH - 1] = value;
        Self(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let array: [u8; ADDRESS_LENGTH] = bytes.try_into().map_err(|_| {
            Error::InvalidAddress(format!(
                "expected {} bytes, got {}",
                ADDRESS_LENGTH,
                bytes.len()
            ))
        })?;
        Ok(Self(array))
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    /// Hex form without the `0x` prefix and without leading zeros,
    /// as used inside Move type tags (`0x2::sui::SUI`)
    pub fn short_hex(&self) -> String {
        let full = hex::encode(self.0);
        let trimmed = full.trim_start_matches('0');
        if trimmed.is_empty() {
            "0".to_string()
        } else {
            trimmed.to_string()
        }
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);

        if digits.is_empty() || digits.len() > ADDRESS_LENGTH * 2 {
            return Err(Error::InvalidAddress(s.to_string()));
        }

        // Left-pad short forms to the full width
        let padded = format!("{:0>width$}", digits, width = ADDRESS_LENGTH * 2);
        let bytes = hex::decode(&padded).map_err(|e| Error::InvalidAddress(format!("{}: {}", s, e)))?;
        Self::from_bytes(&bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_string())
        } else {
            // Fixed-width on the wire, no length prefix
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            s.parse().map_err(serde::de::Error::custom)
        } else {
            let bytes = <[u8; ADDRESS_LENGTH]>::deserialize(deserializer)?;
            Ok(Self(bytes))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_form_is_padded() {
        let clock: Address = "0x6".parse().unwrap();
        assert_eq!(clock, Address::from_u8(6));
        assert_eq!(
            clock.to_string(),
            "0x0000000000000000000000000000000000000000000000000000000000000006"
        );
        assert_eq!(clock.short_hex(), "6");
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!("0x".parse::<Address>().is_err());
        assert!("0xzz".parse::<Address>().is_err());
        let too_long = format!("0x{}", "1".repeat(65));
        assert!(too_long.parse::<Address>().is_err());
    }

    #[test]
    fn test_bcs_is_fixed_width() {
        let addr = Address::from_u8(2);
        let bytes = bcs::to_bytes(&addr).unwrap();
        assert_eq!(bytes.len(), ADDRESS_LENGTH);
        assert_eq!(bytes[31], 2);
    }

    #[test]
    fn test_json_roundtrip_uses_hex() {
        let addr: Address = "0xabc".parse().unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert!(json.starts_with("\"0x000"));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(addr, back);
    }
}
