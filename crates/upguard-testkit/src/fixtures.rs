//! Reusable test fixtures
//!
//! A deployed profile with an all-powerful owner is the starting point of
//! nearly every client test, so it gets a one-line constructor.

use crate::mock_ledger::MockLedger;
use std::sync::Arc;
use upguard_core::{Address, UpguardConfig};

/// Creation bytecode used for vault deployments in tests.
pub const TEST_VAULT_BYTECODE: &str = "0x608060405234801561001057600080fd5b50";

/// Deterministic, distinct, non-zero address for small `n`.
pub fn address(n: u8) -> Address {
    let mut bytes = [0u8; 20];
    bytes[0] = 0xa0;
    bytes[19] = n;
    Address::from_bytes(bytes)
}

/// `count` distinct guardian addresses.
pub fn guardians(count: usize) -> Vec<Address> {
    (0..count)
        .map(|i| {
            let mut bytes = [0u8; 20];
            bytes[0] = 0x6d;
            bytes[12..].copy_from_slice(&(i as u64).to_be_bytes());
            Address::from_bytes(bytes)
        })
        .collect()
}

/// Configuration with vault bytecode and default headroom.
pub fn test_config() -> UpguardConfig {
    UpguardConfig::default().with_vault_bytecode(TEST_VAULT_BYTECODE)
}

/// A mock ledger holding one deployed profile.
#[derive(Debug, Clone)]
pub struct ProfileFixture {
    /// Shared ledger double
    pub ledger: Arc<MockLedger>,
    /// Controller holding every permission
    pub owner: Address,
    /// The Universal Profile
    pub account: Address,
    /// The profile's Key Manager
    pub key_manager: Address,
}

impl ProfileFixture {
    /// Fresh ledger with one profile owned by `address(1)`.
    pub fn new() -> Self {
        Self::on(Arc::new(MockLedger::new()), address(1))
    }

    /// Deploy a profile owned by `owner` on an existing ledger.
    pub fn on(ledger: Arc<MockLedger>, owner: Address) -> Self {
        let handle = ledger.deploy_profile(owner);
        Self {
            ledger,
            owner,
            account: handle.account,
            key_manager: handle.key_manager,
        }
    }
}

impl Default for ProfileFixture {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guardian_addresses_are_distinct() {
        let mut all = guardians(50);
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 50);
        assert!(all.iter().all(|g| !g.is_zero()));
    }

    #[test]
    fn test_config_has_valid_bytecode() {
        assert!(test_config().vault_bytecode_bytes().is_ok());
    }
}
