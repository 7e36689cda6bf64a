//! Ledger effect trait
//!
//! The one capability every upguard operation needs from the host: read
//! contract state, estimate gas and send transactions. Provider selection,
//! signing and gas pricing live behind implementations of this trait.

use crate::errors::LedgerError;
use crate::types::{Address, TransactionReceipt, TransactionRequest};
use async_trait::async_trait;

/// Access to an EVM-style ledger.
#[async_trait]
pub trait LedgerEffects: Send + Sync {
    /// Execute `data` against `to` without creating a transaction and return
    /// the raw return data.
    async fn read(&self, to: Address, data: Vec<u8>) -> Result<Vec<u8>, LedgerError>;

    /// Estimate the gas `request` would consume. Fails when execution would
    /// revert.
    async fn estimate_gas(&self, request: &TransactionRequest) -> Result<u64, LedgerError>;

    /// Sign and submit `request`, waiting for its receipt.
    async fn send_transaction(
        &self,
        request: TransactionRequest,
    ) -> Result<TransactionReceipt, LedgerError>;
}
