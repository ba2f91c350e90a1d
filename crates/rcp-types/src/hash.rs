use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Canonical content fingerprint of a recipe.
///
/// A `RecipeHash` is the SHA-256 digest of a recipe's canonical
/// serialization. It always renders as 64 lowercase hex characters, which is
/// also the exact string registered with the ledger contract.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecipeHash([u8; 32]);

impl RecipeHash {
    /// Length of the hex rendering.
    pub const HEX_LEN: usize = 64;

    /// Create a `RecipeHash` from a pre-computed digest.
    pub const fn from_digest(digest: [u8; 32]) -> Self {
        Self(digest)
    }

    /// The raw 32-byte digest.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex rendering (64 characters, no prefix).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Parse from a 64-character hex string. Upper-case digits are accepted
    /// and normalized; a `0x` prefix is not.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        if s.len() != Self::HEX_LEN {
            return Err(TypeError::InvalidHash(format!(
                "expected {} hex characters, got {}",
                Self::HEX_LEN,
                s.len()
            )));
        }
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| TypeError::InvalidLength {
                expected: 32,
                actual: v.len(),
            })?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for RecipeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecipeHash({})", self.short_hex())
    }
}

impl fmt::Display for RecipeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for RecipeHash {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for RecipeHash {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<RecipeHash> for String {
    fn from(hash: RecipeHash) -> Self {
        hash.to_hex()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_roundtrip() {
        let hash = RecipeHash::from_digest([0xab; 32]);
        let hex = hash.to_hex();
        assert_eq!(hex.len(), 64);
        assert_eq!(RecipeHash::from_hex(&hex).unwrap(), hash);
    }

    #[test]
    fn uppercase_is_normalized() {
        let upper = "AB".repeat(32);
        let hash = RecipeHash::from_hex(&upper).unwrap();
        assert_eq!(hash.to_hex(), "ab".repeat(32));
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(matches!(
            RecipeHash::from_hex("abcd"),
            Err(TypeError::InvalidHash(_))
        ));
    }

    #[test]
    fn rejects_prefix_and_non_hex() {
        let prefixed = format!("0x{}", "a".repeat(62));
        assert!(RecipeHash::from_hex(&prefixed).is_err());
        assert!(RecipeHash::from_hex(&"g".repeat(64)).is_err());
    }

    #[test]
    fn serializes_as_plain_hex_string() {
        let hash = RecipeHash::from_digest([1; 32]);
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", "01".repeat(32)));
        let parsed: RecipeHash = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, hash);
    }

    #[test]
    fn display_is_full_hex() {
        let hash = RecipeHash::from_digest([0x0f; 32]);
        assert_eq!(format!("{hash}"), "0f".repeat(32));
        assert_eq!(format!("{hash:?}"), "RecipeHash(0f0f0f0f)");
    }
}
