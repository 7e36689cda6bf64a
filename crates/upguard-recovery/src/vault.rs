//! Vault handles

use serde::{Deserialize, Serialize};
use upguard_core::{Address, TransactionReceipt};

/// A recovery vault and the account it is bound to.
///
/// Plain data: the coordinator resolves everything else from the ledger on
/// each call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VaultHandle {
    /// Vault contract
    pub vault: Address,
    /// Universal Profile the vault recovers
    pub account: Address,
}

impl VaultHandle {
    /// Create a handle.
    pub fn new(vault: Address, account: Address) -> Self {
        Self { vault, account }
    }

    /// Handle for the vault created by a deployment receipt, if the ledger
    /// reported one.
    pub fn from_deployment(receipt: &TransactionReceipt, account: Address) -> Option<Self> {
        receipt
            .contract_address
            .map(|vault| Self::new(vault, account))
    }
}
