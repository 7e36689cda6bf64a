//! Recover process identifiers
//!
//! Guardians vote inside named channels. The caller picks an ASCII name; the
//! vault stores it as a `bytes32`, right-padded with zero bytes.

use crate::crypto::Hash32;
use crate::errors::{RecoveryError, RecoveryResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one recovery voting channel on a vault.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecoverProcessId(Hash32);

impl RecoverProcessId {
    /// Maximum length of a process name in bytes.
    pub const MAX_LEN: usize = 32;

    /// Encode a channel name into its on-ledger form.
    pub fn from_text(name: &str) -> RecoveryResult<Self> {
        if name.is_empty() {
            return Err(RecoveryError::invalid("recover process id is empty"));
        }
        if !name.is_ascii() {
            return Err(RecoveryError::invalid(format!(
                "recover process id must be ASCII: {name:?}"
            )));
        }
        if name.as_bytes().contains(&0) {
            return Err(RecoveryError::invalid(
                "recover process id contains a NUL byte",
            ));
        }
        if name.len() > Self::MAX_LEN {
            return Err(RecoveryError::invalid(format!(
                "recover process id longer than {} bytes: {name:?}",
                Self::MAX_LEN
            )));
        }

        let mut word = [0u8; 32];
        word[..name.len()].copy_from_slice(name.as_bytes());
        Ok(Self(Hash32::new(word)))
    }

    /// Wrap a raw `bytes32` read from the ledger.
    pub const fn from_word(word: Hash32) -> Self {
        Self(word)
    }

    /// The `bytes32` form sent to the ledger.
    pub fn as_word(&self) -> &Hash32 {
        &self.0
    }

    /// Canonical text form: trailing zero padding removed.
    pub fn to_text(&self) -> String {
        let bytes = self.0.as_bytes();
        let end = bytes.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
        String::from_utf8_lossy(&bytes[..end]).into_owned()
    }
}

impl fmt::Display for RecoverProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl fmt::Debug for RecoverProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecoverProcessId({:?})", self.to_text())
    }
}
