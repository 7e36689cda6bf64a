//! Key Manager execution path
//!
//! State-changing calls on a Universal Profile are never sent to the account
//! directly. They are wrapped in the account's `execute` and forwarded by the
//! Key Manager (the account's `owner()`), which checks the sender's LSP6
//! permissions before relaying.
//!
//! Every submission goes through [`KeyManagerExecutor::submit`], which
//! estimates gas first and tags failures with the stage they happened in.

use crate::abi::{self, ContractCall, Operation};
use crate::config::UpguardConfig;
use crate::effects::LedgerEffects;
use crate::errors::{RecoveryError, RecoveryResult};
use crate::types::{Address, TransactionReceipt, TransactionRequest};
use std::sync::Arc;

/// Account-level `execute(uint256,address,uint256,bytes)` payload.
pub fn encode_execute(operation: Operation, to: Address, value: u128, data: Vec<u8>) -> Vec<u8> {
    ContractCall::Execute {
        operation,
        to,
        value,
        data,
    }
    .encode()
}

/// Stateless submitter shared by the permission and recovery clients.
pub struct KeyManagerExecutor<E: LedgerEffects + ?Sized> {
    ledger: Arc<E>,
    gas_headroom: u64,
}

impl<E: LedgerEffects + ?Sized> Clone for KeyManagerExecutor<E> {
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
            gas_headroom: self.gas_headroom,
        }
    }
}

impl<E: LedgerEffects + ?Sized> KeyManagerExecutor<E> {
    /// Create an executor using the configured gas headroom.
    pub fn new(ledger: Arc<E>, config: &UpguardConfig) -> Self {
        Self {
            ledger,
            gas_headroom: config.gas_headroom,
        }
    }

    /// The ledger this executor talks to.
    pub fn ledger(&self) -> &Arc<E> {
        &self.ledger
    }

    /// Gas added on top of each estimate.
    pub fn gas_headroom(&self) -> u64 {
        self.gas_headroom
    }

    /// Read-only call; transport failures become [`RecoveryError::Ledger`].
    pub async fn read(&self, to: Address, call: &ContractCall) -> RecoveryResult<Vec<u8>> {
        tracing::trace!(to = %to, function = call.signature(), "ledger read");
        self.ledger
            .read(to, call.encode())
            .await
            .map_err(RecoveryError::ledger)
    }

    /// The Key Manager controlling `account`.
    pub async fn key_manager_of(&self, account: Address) -> RecoveryResult<Address> {
        let data = self.read(account, &ContractCall::Owner).await?;
        abi::decode_address(&data)
    }

    /// Forward an account-level `payload` through the account's Key Manager.
    pub async fn execute(
        &self,
        payload: Vec<u8>,
        from: Address,
        account: Address,
    ) -> RecoveryResult<TransactionReceipt> {
        let key_manager = self.key_manager_of(account).await?;
        tracing::debug!(
            account = %account,
            key_manager = %key_manager,
            from = %from,
            "forwarding through key manager"
        );
        let calldata = ContractCall::KeyManagerExecute { payload }.encode();
        self.submit(TransactionRequest::call(from, key_manager, calldata))
            .await
    }

    /// Have `account` perform `operation` on `to`, relayed by its Key Manager.
    pub async fn execute_on_behalf(
        &self,
        operation: Operation,
        to: Address,
        value: u128,
        data: Vec<u8>,
        from: Address,
        account: Address,
    ) -> RecoveryResult<TransactionReceipt> {
        self.execute(encode_execute(operation, to, value, data), from, account)
            .await
    }

    /// Estimate, then send with `estimate + gas_headroom` gas.
    ///
    /// A receipt reporting failed execution is a [`RecoveryError::Submission`].
    pub async fn submit(&self, request: TransactionRequest) -> RecoveryResult<TransactionReceipt> {
        let estimate = match self.ledger.estimate_gas(&request).await {
            Ok(gas) => gas,
            Err(cause) => {
                tracing::error!(from = %request.from, to = %request.to, error = %cause, "gas estimation failed");
                return Err(RecoveryError::gas_estimation(cause));
            }
        };
        let gas = estimate.saturating_add(self.gas_headroom);
        tracing::debug!(to = %request.to, estimate, gas, "gas estimated");

        let receipt = match self.ledger.send_transaction(request.with_gas(gas)).await {
            Ok(receipt) => receipt,
            Err(cause) => {
                tracing::error!(error = %cause, "transaction submission failed");
                return Err(RecoveryError::submission(cause));
            }
        };
        if !receipt.success {
            tracing::error!(tx = %receipt.transaction_hash, "transaction reverted");
            return Err(RecoveryError::submission(
                crate::errors::LedgerError::reverted(format!(
                    "transaction {} reverted",
                    receipt.transaction_hash
                )),
            ));
        }

        tracing::info!(
            tx = %receipt.transaction_hash,
            from = %receipt.from,
            to = %receipt.to,
            gas_used = receipt.gas_used,
            "transaction submitted"
        );
        Ok(receipt)
    }
}
