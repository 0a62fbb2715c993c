//! Identity types for TETHER
//!
//! Accounts and authority instances share one 20-byte address space.
//! The all-zero address is the wire-level null; authority state never
//! stores it and uses `Option<Address>` instead.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::TetherError;

/// Length of an address in bytes
pub const ADDRESS_LEN: usize = 20;

/// Account or authority instance identity
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; ADDRESS_LEN]);

impl Address {
    /// The null address
    pub const ZERO: Address = Address([0u8; ADDRESS_LEN]);

    #[inline]
    pub const fn new(bytes: [u8; ADDRESS_LEN]) -> Self {
        Address(bytes)
    }

    /// Derive an address from arbitrary seed material (label, public key).
    /// Takes the trailing 20 bytes of SHA-256(seed).
    pub fn derive(seed: &[u8]) -> Self {
        let digest = Sha256::digest(seed);
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes.copy_from_slice(&digest[digest.len() - ADDRESS_LEN..]);
        Address(bytes)
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_LEN]
    }

    /// `None` for the null address, `Some(self)` otherwise
    #[inline]
    pub fn non_null(self) -> Option<Address> {
        if self.is_zero() {
            None
        } else {
            Some(self)
        }
    }

    #[inline]
    pub fn to_bytes(self) -> [u8; ADDRESS_LEN] {
        self.0
    }

    #[inline]
    pub fn from_bytes(bytes: [u8; ADDRESS_LEN]) -> Self {
        Address(bytes)
    }
}

/// Collapse `Some(ZERO)` into `None`
#[inline]
pub fn normalize(address: Option<Address>) -> Option<Address> {
    address.and_then(Address::non_null)
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form: first and last two bytes
        write!(
            f,
            "Addr({:02x}{:02x}..{:02x}{:02x})",
            self.0[0],
            self.0[1],
            self.0[ADDRESS_LEN - 2],
            self.0[ADDRESS_LEN - 1]
        )
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("0x")?;
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl FromStr for Address {
    type Err = TetherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);

        if hex.len() != ADDRESS_LEN * 2 || !hex.is_ascii() {
            return Err(TetherError::InvalidAddress(s.to_string()));
        }

        let mut bytes = [0u8; ADDRESS_LEN];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
                .map_err(|_| TetherError::InvalidAddress(s.to_string()))?;
        }
        Ok(Address(bytes))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AddressVisitor;

        impl<'de> Visitor<'de> for AddressVisitor {
            type Value = Address;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a 0x-prefixed 20-byte hex address")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Address, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_str(AddressVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_zero_is_null() {
        assert!(Address::ZERO.is_zero());
        assert_eq!(Address::ZERO.non_null(), None);
        assert_eq!(normalize(Some(Address::ZERO)), None);

        let a = Address::derive(b"alice");
        assert_eq!(a.non_null(), Some(a));
        assert_eq!(normalize(Some(a)), Some(a));
    }

    #[test]
    fn test_derive_is_deterministic() {
        assert_eq!(Address::derive(b"alice"), Address::derive(b"alice"));
        assert_ne!(Address::derive(b"alice"), Address::derive(b"bob"));
        assert!(!Address::derive(b"").is_zero());
    }

    #[test]
    fn test_display_format() {
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes[0] = 0xAB;
        bytes[19] = 0x01;
        let s = Address(bytes).to_string();
        assert_eq!(s.len(), 42);
        assert!(s.starts_with("0xab"));
        assert!(s.ends_with("01"));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!("0x1234".parse::<Address>().is_err());
        assert!("0xzz00000000000000000000000000000000000000".parse::<Address>().is_err());
        assert!("".parse::<Address>().is_err());
        // Non-ASCII input of the right byte length must not panic on slicing
        assert!("0xé00000000000000000000000000000000000000".parse::<Address>().is_err());
    }

    #[test]
    fn test_parse_accepts_unprefixed() {
        let a = Address::derive(b"carol");
        let hex = a.to_string();
        assert_eq!(hex[2..].parse::<Address>().unwrap(), a);
    }

    #[test]
    fn test_serde_uses_hex_string() {
        let a = Address::derive(b"dave");
        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, format!("\"{}\"", a));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, a);
    }

    proptest! {
        #[test]
        fn parse_display_identity(bytes in proptest::array::uniform20(any::<u8>())) {
            let a = Address(bytes);
            prop_assert_eq!(a.to_string().parse::<Address>().unwrap(), a);
        }
    }
}
