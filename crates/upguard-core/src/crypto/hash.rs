//! Pure synchronous keccak-256 hashing
//!
//! Everything the ledger hashes uses keccak-256: function selectors, EIP-55
//! checksums, ERC725Y data keys and the secret commitments stored by recovery
//! vaults. Hashing is deterministic and side-effect free, so it lives outside
//! the effect system.
//!
//! # Usage
//!
//! ```
//! use upguard_core::crypto::hash::keccak256;
//!
//! let digest = keccak256(b"");
//! assert_eq!(
//!     digest.to_hex(),
//!     "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
//! );
//! ```

use crate::errors::{RecoveryError, RecoveryResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Keccak256};
use std::fmt;

/// 32-byte value: a keccak digest, an ERC725Y data key or a `bytes32` word.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash32(pub [u8; 32]);

impl Hash32 {
    /// All-zero value.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Wrap raw bytes.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Borrow the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Whether every byte is zero.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// `0x`-prefixed lowercase hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parse `0x`-prefixed (or bare) hex of exactly 32 bytes.
    pub fn from_hex(text: &str) -> RecoveryResult<Self> {
        let digits = text.strip_prefix("0x").unwrap_or(text);
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|e| RecoveryError::invalid(format!("invalid bytes32 {text:?}: {e}")))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash32({})", self.to_hex())
    }
}

impl From<[u8; 32]> for Hash32 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl Serialize for Hash32 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash32 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::from_hex(&text).map_err(serde::de::Error::custom)
    }
}

/// Hash arbitrary bytes with keccak-256.
pub fn keccak256(data: &[u8]) -> Hash32 {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let mut output = [0u8; 32];
    output.copy_from_slice(&hasher.finalize());
    Hash32(output)
}

/// One-way commitment to a plaintext secret.
///
/// Equivalent to Solidity's `keccak256(abi.encodePacked(secret))` for a
/// `string`, which is what recovery vaults compare against on recovery.
pub fn secret_commitment(secret: &str) -> Hash32 {
    keccak256(secret.as_bytes())
}
