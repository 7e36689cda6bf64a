//! Client configuration
//!
//! Gas-price strategy and provider selection belong to the host; this only
//! carries what the recovery client itself needs.
//!
//! ```toml
//! vault_bytecode = "0x6080..."
//! gas_headroom = 1
//! log_filter = "upguard=debug,info"
//! ```

pub mod traits;

pub use traits::LayeredConfig;

use crate::errors::{RecoveryError, RecoveryResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default extra gas added on top of every estimate.
pub const DEFAULT_GAS_HEADROOM: u64 = 1;

/// Default `tracing` filter directive.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Configuration shared by the permission and recovery clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UpguardConfig {
    /// Creation bytecode of the recovery vault contract, hex encoded. The
    /// account address is appended as the constructor argument on deploy.
    pub vault_bytecode: String,
    /// Gas added to every estimate before submission
    pub gas_headroom: u64,
    /// `tracing` filter directive used by [`crate::logging::init_tracing`]
    pub log_filter: String,
}

impl Default for UpguardConfig {
    fn default() -> Self {
        Self {
            vault_bytecode: String::new(),
            gas_headroom: DEFAULT_GAS_HEADROOM,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl UpguardConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> RecoveryResult<Self> {
        toml::from_str(text).map_err(|e| RecoveryError::config(format!("invalid TOML: {e}")))
    }

    /// Use the given vault creation bytecode.
    pub fn with_vault_bytecode(mut self, bytecode: impl Into<String>) -> Self {
        self.vault_bytecode = bytecode.into();
        self
    }

    /// Decoded vault creation bytecode.
    pub fn vault_bytecode_bytes(&self) -> RecoveryResult<Vec<u8>> {
        let digits = self
            .vault_bytecode
            .strip_prefix("0x")
            .unwrap_or(&self.vault_bytecode);
        if digits.is_empty() {
            return Err(RecoveryError::invalid(
                "no recovery vault bytecode configured",
            ));
        }
        hex::decode(digits)
            .map_err(|e| RecoveryError::config(format!("vault_bytecode is not valid hex: {e}")))
    }
}

impl LayeredConfig for UpguardConfig {
    const ENV_PREFIX: &'static str = "UPGUARD_";

    fn load_from_file(path: &Path) -> RecoveryResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RecoveryError::config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    fn set_from_string(&mut self, key: &str, value: &str) -> RecoveryResult<()> {
        match key {
            "vault_bytecode" => self.vault_bytecode = value.to_string(),
            "gas_headroom" => {
                self.gas_headroom = value.parse().map_err(|e| {
                    RecoveryError::config(format!("gas_headroom {value:?}: {e}"))
                })?;
            }
            "log_filter" => self.log_filter = value.to_string(),
            other => {
                return Err(RecoveryError::config(format!(
                    "unknown configuration key: {other}"
                )))
            }
        }
        Ok(())
    }

    fn validate(&self) -> RecoveryResult<()> {
        if !self.vault_bytecode.is_empty() {
            self.vault_bytecode_bytes()?;
        }
        tracing_subscriber::EnvFilter::try_new(&self.log_filter)
            .map_err(|e| RecoveryError::config(format!("log_filter {:?}: {e}", self.log_filter)))?;
        Ok(())
    }
}
