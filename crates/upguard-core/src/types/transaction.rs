//! Transaction request and receipt types exchanged with the ledger.

use super::Address;
use crate::crypto::Hash32;
use serde::{Deserialize, Serialize};

/// A state-changing call to be estimated and submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequest {
    /// Signing and paying identity
    pub from: Address,
    /// Target contract
    pub to: Address,
    /// Native value attached (wei)
    pub value: u128,
    /// ABI-encoded calldata
    pub data: Vec<u8>,
    /// Gas limit; `None` until estimated
    pub gas: Option<u64>,
}

impl TransactionRequest {
    /// Create a zero-value call without a gas limit.
    pub fn call(from: Address, to: Address, data: Vec<u8>) -> Self {
        Self {
            from,
            to,
            value: 0,
            data,
            gas: None,
        }
    }

    /// Set the gas limit.
    pub fn with_gas(mut self, gas: u64) -> Self {
        self.gas = Some(gas);
        self
    }
}

/// Outcome of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    /// Transaction hash
    pub transaction_hash: Hash32,
    /// Sender
    pub from: Address,
    /// Target contract
    pub to: Address,
    /// Gas consumed
    pub gas_used: u64,
    /// Whether execution succeeded
    pub success: bool,
    /// Contract created during execution, when the ledger reports one
    pub contract_address: Option<Address>,
}
