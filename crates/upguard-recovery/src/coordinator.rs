//! Recovery coordinator
//!
//! Drives the guardian-vote workflow on an LSP11-style recovery vault.
//!
//! # Flow
//! 1. A controller holding `ADDPERMISSIONS` deploys a vault for the account
//! 2. The account adds guardians, sets the threshold and commits to a secret
//! 3. Guardians vote for a new owner inside a named recover process
//! 4. Once the candidate holds `threshold` votes it proves the secret and
//!    receives the account's permissions
//!
//! Administrative calls (steps 1 and 2) are made by the account itself, so
//! they are relayed through its Key Manager. Votes and the final recovery are
//! sent directly by the guardian and the candidate.
//!
//! The coordinator is stateless. Vote counting reads every guardian's vote
//! concurrently and only computes on the complete set.

use crate::tally::{GuardianVote, VoteSnapshot};
use crate::vault::VaultHandle;
use futures::future::try_join_all;
use std::sync::Arc;
use upguard_core::abi::{self, ContractCall, Operation};
use upguard_core::{
    secret_commitment, Address, KeyManagerExecutor, LedgerEffects, RecoverProcessId,
    RecoveryError, RecoveryResult, TransactionReceipt, TransactionRequest, UpguardConfig,
};
use upguard_permissions::PermissionChecker;

/// Stateless client for recovery vaults.
pub struct RecoveryCoordinator<E: LedgerEffects + ?Sized> {
    executor: KeyManagerExecutor<E>,
    permissions: PermissionChecker<E>,
    config: UpguardConfig,
}

impl<E: LedgerEffects + ?Sized> Clone for RecoveryCoordinator<E> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor.clone(),
            permissions: self.permissions.clone(),
            config: self.config.clone(),
        }
    }
}

impl<E: LedgerEffects + ?Sized> RecoveryCoordinator<E> {
    /// Create a coordinator over `ledger`.
    pub fn new(ledger: Arc<E>, config: UpguardConfig) -> Self {
        let executor = KeyManagerExecutor::new(ledger, &config);
        Self {
            permissions: PermissionChecker::from_executor(executor.clone()),
            executor,
            config,
        }
    }

    /// The ledger this coordinator talks to.
    pub fn ledger(&self) -> &Arc<E> {
        self.executor.ledger()
    }

    /// Permission checker sharing this coordinator's ledger.
    pub fn permissions(&self) -> &PermissionChecker<E> {
        &self.permissions
    }

    // Administration, relayed through the account's Key Manager

    /// Deploy a recovery vault bound to `account`.
    ///
    /// The vault address is reported in the receipt's `contract_address`;
    /// see [`VaultHandle::from_deployment`].
    pub async fn create_recovery_vault(
        &self,
        account: Address,
        sender: Address,
    ) -> RecoveryResult<TransactionReceipt> {
        let mut creation = self.config.vault_bytecode_bytes()?;
        creation.extend_from_slice(&account.to_word());

        let receipt = self
            .executor
            .execute_on_behalf(Operation::Create, Address::ZERO, 0, creation, sender, account)
            .await?;
        match receipt.contract_address {
            Some(vault) => tracing::info!(account = %account, vault = %vault, "recovery vault deployed"),
            None => tracing::warn!(account = %account, "ledger reported no vault address"),
        }
        Ok(receipt)
    }

    async fn call_vault(
        &self,
        handle: &VaultHandle,
        call: ContractCall,
        sender: Address,
    ) -> RecoveryResult<TransactionReceipt> {
        tracing::debug!(
            vault = %handle.vault,
            account = %handle.account,
            function = call.signature(),
            "relaying vault call"
        );
        self.executor
            .execute_on_behalf(
                Operation::Call,
                handle.vault,
                0,
                call.encode(),
                sender,
                handle.account,
            )
            .await
    }

    /// Add `guardian` to the vault.
    pub async fn add_guardian(
        &self,
        handle: &VaultHandle,
        guardian: Address,
        sender: Address,
    ) -> RecoveryResult<TransactionReceipt> {
        self.call_vault(handle, ContractCall::AddGuardian { guardian }, sender)
            .await
    }

    /// Remove `guardian` from the vault.
    pub async fn remove_guardian(
        &self,
        handle: &VaultHandle,
        guardian: Address,
        sender: Address,
    ) -> RecoveryResult<TransactionReceipt> {
        self.call_vault(handle, ContractCall::RemoveGuardian { guardian }, sender)
            .await
    }

    /// Set the number of votes a candidate needs.
    pub async fn set_threshold(
        &self,
        handle: &VaultHandle,
        threshold: u64,
        sender: Address,
    ) -> RecoveryResult<TransactionReceipt> {
        let call = ContractCall::SetThreshold {
            threshold: u128::from(threshold),
        };
        self.call_vault(handle, call, sender).await
    }

    /// Commit to `new_secret`. Only its keccak-256 hash leaves this process.
    pub async fn set_secret(
        &self,
        handle: &VaultHandle,
        new_secret: &str,
        sender: Address,
    ) -> RecoveryResult<TransactionReceipt> {
        let call = ContractCall::SetSecret {
            secret_hash: secret_commitment(new_secret),
        };
        self.call_vault(handle, call, sender).await
    }

    // Guardian and candidate transactions, sent directly

    async fn send_to_vault(
        &self,
        vault: Address,
        call: ContractCall,
        from: Address,
    ) -> RecoveryResult<TransactionReceipt> {
        self.executor
            .submit(TransactionRequest::call(from, vault, call.encode()))
            .await
    }

    /// Vote for `new_owner` in `process_id`, sent by `guardian`.
    ///
    /// Voting again replaces the guardian's previous vote in that process.
    pub async fn vote_to_recover(
        &self,
        handle: &VaultHandle,
        process_id: &str,
        new_owner: Address,
        guardian: Address,
    ) -> RecoveryResult<TransactionReceipt> {
        let process_id = RecoverProcessId::from_text(process_id)?;
        tracing::info!(
            vault = %handle.vault,
            process_id = %process_id,
            guardian = %guardian,
            new_owner = %new_owner,
            "casting recovery vote"
        );
        let call = ContractCall::VoteToRecover {
            process_id,
            new_owner,
        };
        self.send_to_vault(handle.vault, call, guardian).await
    }

    /// Claim the account, sent by the voted-for `signer`.
    ///
    /// Reveals `old_secret` and commits to `new_secret` for the next
    /// recovery.
    pub async fn recover_ownership(
        &self,
        handle: &VaultHandle,
        process_id: &str,
        old_secret: &str,
        new_secret: &str,
        signer: Address,
    ) -> RecoveryResult<TransactionReceipt> {
        let process_id = RecoverProcessId::from_text(process_id)?;
        tracing::info!(
            vault = %handle.vault,
            account = %handle.account,
            process_id = %process_id,
            signer = %signer,
            "recovering ownership"
        );
        let call = ContractCall::RecoverOwnership {
            process_id,
            plain_secret: old_secret.to_string(),
            new_secret_hash: secret_commitment(new_secret),
        };
        self.send_to_vault(handle.vault, call, signer).await
    }

    // Reads

    async fn read_vault(&self, vault: Address, call: ContractCall) -> RecoveryResult<Vec<u8>> {
        self.executor.read(vault, &call).await
    }

    /// Whether `controller` may deploy a vault for `account`.
    pub async fn can_create_recovery_vault(
        &self,
        controller: &str,
        account: &str,
    ) -> RecoveryResult<bool> {
        self.permissions
            .can_add_permissions(controller, account)
            .await
    }

    /// The account the vault is bound to.
    pub async fn get_account(&self, vault: Address) -> RecoveryResult<Address> {
        let data = self.read_vault(vault, ContractCall::Account).await?;
        abi::decode_address(&data)
    }

    /// Guardians in the order the vault returns them.
    pub async fn get_guardians(&self, vault: Address) -> RecoveryResult<Vec<Address>> {
        let data = self.read_vault(vault, ContractCall::GetGuardians).await?;
        abi::decode_address_array(&data)
    }

    /// Whether `address` is a guardian; `false` for malformed text.
    pub async fn is_guardian(&self, vault: Address, address: &str) -> RecoveryResult<bool> {
        let Ok(address) = Address::parse(address) else {
            return Ok(false);
        };
        let data = self
            .read_vault(vault, ContractCall::IsGuardian { address })
            .await?;
        abi::decode_bool(&data)
    }

    async fn process_ids(&self, vault: Address) -> RecoveryResult<Vec<RecoverProcessId>> {
        let data = self
            .read_vault(vault, ContractCall::GetRecoverProcessesIds)
            .await?;
        Ok(abi::decode_bytes32_array(&data)?
            .into_iter()
            .map(RecoverProcessId::from_word)
            .collect())
    }

    /// Open recover process ids as text.
    pub async fn get_recover_processes_ids(&self, vault: Address) -> RecoveryResult<Vec<String>> {
        Ok(self
            .process_ids(vault)
            .await?
            .iter()
            .map(RecoverProcessId::to_text)
            .collect())
    }

    /// Votes a candidate needs.
    pub async fn get_guardians_threshold(&self, vault: Address) -> RecoveryResult<u64> {
        let data = self
            .read_vault(vault, ContractCall::GetGuardiansThreshold)
            .await?;
        let threshold = abi::decode_uint(&data)?;
        u64::try_from(threshold).map_err(|_| {
            RecoveryError::serialization(format!("guardians threshold {threshold} exceeds u64"))
        })
    }

    async fn raw_vote(
        &self,
        vault: Address,
        process_id: RecoverProcessId,
        guardian: Address,
    ) -> RecoveryResult<Address> {
        let data = self
            .read_vault(
                vault,
                ContractCall::GetGuardianVote {
                    process_id,
                    guardian,
                },
            )
            .await?;
        // Anything that is not an address counts as no vote.
        Ok(abi::decode_address(&data).unwrap_or(Address::ZERO))
    }

    /// The candidate `guardian` voted for in `process_id`.
    ///
    /// Zero when there is no vote or either argument is malformed.
    pub async fn get_guardian_vote(
        &self,
        vault: Address,
        process_id: &str,
        guardian: &str,
    ) -> RecoveryResult<Address> {
        let (Ok(process_id), Ok(guardian)) =
            (RecoverProcessId::from_text(process_id), Address::parse(guardian))
        else {
            return Ok(Address::ZERO);
        };
        self.raw_vote(vault, process_id, guardian).await
    }

    /// Resolve caller text against the vault's open processes.
    async fn resolve_process(
        &self,
        vault: Address,
        process_id: &str,
    ) -> RecoveryResult<Option<RecoverProcessId>> {
        let open = self.process_ids(vault).await?;
        Ok(open.into_iter().find(|id| id.to_text() == process_id))
    }

    async fn collect_votes(
        &self,
        vault: Address,
        process_id: RecoverProcessId,
    ) -> RecoveryResult<Vec<GuardianVote>> {
        let guardians = self.get_guardians(vault).await?;
        let reads = guardians
            .iter()
            .map(|guardian| self.raw_vote(vault, process_id, *guardian));
        let raw = try_join_all(reads).await?;
        Ok(guardians
            .into_iter()
            .zip(raw)
            .map(|(guardian, vote)| GuardianVote::from_raw(guardian, vote))
            .collect())
    }

    /// Every guardian's vote in `process_id` plus the threshold, or `None`
    /// when the vault has no such process.
    pub async fn vote_snapshot(
        &self,
        vault: Address,
        process_id: &str,
    ) -> RecoveryResult<Option<VoteSnapshot>> {
        let Some(id) = self.resolve_process(vault, process_id).await? else {
            tracing::debug!(vault = %vault, process_id, "unknown recover process");
            return Ok(None);
        };
        let (votes, threshold) = futures::try_join!(
            self.collect_votes(vault, id),
            self.get_guardians_threshold(vault)
        )?;
        Ok(Some(VoteSnapshot::new(id, threshold, votes)))
    }

    /// Guardians that voted for anyone in `process_id`; 0 for an unknown process.
    pub async fn get_total_votes(&self, vault: Address, process_id: &str) -> RecoveryResult<usize> {
        let Some(id) = self.resolve_process(vault, process_id).await? else {
            return Ok(0);
        };
        let votes = self.collect_votes(vault, id).await?;
        let total = votes.iter().filter(|v| v.candidate.is_some()).count();
        tracing::debug!(vault = %vault, process_id = %id, total, "counted votes");
        Ok(total)
    }

    /// Whether `new_owner` holds at least `threshold` votes in `process_id`.
    ///
    /// `false` for an unknown process or malformed address text.
    pub async fn can_recover(
        &self,
        vault: Address,
        process_id: &str,
        new_owner: &str,
    ) -> RecoveryResult<bool> {
        let Ok(new_owner) = Address::parse(new_owner) else {
            return Ok(false);
        };
        let Some(snapshot) = self.vote_snapshot(vault, process_id).await? else {
            return Ok(false);
        };
        let allowed = snapshot.can_recover(new_owner);
        tracing::debug!(
            vault = %vault,
            process_id,
            new_owner = %new_owner,
            votes = snapshot.votes_for(new_owner),
            threshold = snapshot.threshold,
            allowed,
            "checked recovery threshold"
        );
        Ok(allowed)
    }
}
