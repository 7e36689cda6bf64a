//! In-memory ledger double
//!
//! Models the observable behaviour of the three contracts the clients talk
//! to: Universal Profiles (ERC725Y store + ERC725X execute), their LSP6 Key
//! Managers and LSP11-style recovery vaults. Calldata is decoded with the
//! same codec the clients use, so tests exercise real payloads end to end.
//!
//! Transactions are atomic: execution runs on a copy of the chain state that
//! is committed only when every nested call succeeds. `estimate_gas` runs the
//! same simulation and discards it.
//!
//! # Blocking Lock Usage
//!
//! Uses `std::sync::Mutex`; no lock is held across an `.await`.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use upguard_core::abi::{self, ContractCall, Operation, Token};
use upguard_core::crypto::{keccak256, secret_commitment, Hash32};
use upguard_core::permissions::{
    array_element_key, decode_array_element, decode_array_length, encode_array_element,
    encode_array_length, permissions_key, Permission, PermissionSet,
    ADDRESS_PERMISSIONS_ARRAY_KEY, ADDRESS_PERMISSIONS_PREFIX,
};
use upguard_core::{
    Address, LedgerEffects, LedgerError, RecoverProcessId, TransactionReceipt,
    TransactionRequest,
};

type Exec<T> = Result<T, LedgerError>;

const BASE_GAS: u64 = 21_000;
const GAS_PER_BYTE: u64 = 16;

fn revert(reason: impl Into<String>) -> LedgerError {
    LedgerError::reverted(reason)
}

fn decode_call(data: &[u8]) -> Exec<ContractCall> {
    ContractCall::decode(data).map_err(|e| revert(e.to_string()))
}

fn intrinsic_gas(request: &TransactionRequest) -> u64 {
    BASE_GAS + GAS_PER_BYTE * request.data.len() as u64
}

/// Addresses of a deployed profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileHandle {
    /// The Universal Profile
    pub account: Address,
    /// Its Key Manager (the profile's `owner()`)
    pub key_manager: Address,
}

#[derive(Debug, Clone, Default)]
struct ProfileState {
    key_manager: Address,
    data: HashMap<Hash32, Vec<u8>>,
}

/// Storage of one recovery vault.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VaultState {
    /// Account this vault is bound to
    pub account: Address,
    /// Guardians in insertion order
    pub guardians: Vec<Address>,
    /// Votes a candidate needs to recover
    pub threshold: u128,
    /// Commitment to the owner secret
    pub secret_hash: Hash32,
    /// Open process ids in first-vote order
    pub processes: Vec<RecoverProcessId>,
    /// (process, guardian) -> candidate
    pub votes: HashMap<(RecoverProcessId, Address), Address>,
    /// Completed recoveries
    pub recoveries: u64,
}

impl VaultState {
    fn only_account(&self, sender: Address) -> Exec<()> {
        if sender == self.account {
            Ok(())
        } else {
            Err(revert(format!("caller {sender} is not the vault account")))
        }
    }

    fn votes_for(&self, process_id: &RecoverProcessId, candidate: Address) -> u128 {
        self.guardians
            .iter()
            .filter(|guardian| self.votes.get(&(*process_id, **guardian)) == Some(&candidate))
            .count() as u128
    }
}

#[derive(Debug, Clone, Default)]
struct Chain {
    profiles: HashMap<Address, ProfileState>,
    key_managers: HashMap<Address, Address>,
    vaults: HashMap<Address, VaultState>,
    deployments: u64,
}

impl Chain {
    fn next_address(&mut self, label: &[u8]) -> Address {
        self.deployments += 1;
        let mut seed = label.to_vec();
        seed.extend_from_slice(&self.deployments.to_be_bytes());
        let digest = keccak256(&seed);
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest.as_bytes()[12..]);
        Address::from_bytes(bytes)
    }

    fn profile(&self, account: Address) -> Exec<&ProfileState> {
        self.profiles
            .get(&account)
            .ok_or_else(|| revert(format!("no profile at {account}")))
    }

    fn profile_mut(&mut self, account: Address) -> Exec<&mut ProfileState> {
        self.profiles
            .get_mut(&account)
            .ok_or_else(|| revert(format!("no profile at {account}")))
    }

    fn vault_mut(&mut self, vault: Address) -> Exec<&mut VaultState> {
        self.vaults
            .get_mut(&vault)
            .ok_or_else(|| revert(format!("no vault at {vault}")))
    }

    fn data(&self, account: Address, key: &Hash32) -> Vec<u8> {
        self.profiles
            .get(&account)
            .and_then(|profile| profile.data.get(key).cloned())
            .unwrap_or_default()
    }

    fn controllers(&self, account: Address) -> Vec<Address> {
        let len = decode_array_length(&self.data(account, &ADDRESS_PERMISSIONS_ARRAY_KEY))
            .unwrap_or_default();
        (0..len)
            .filter_map(|index| decode_array_element(&self.data(account, &array_element_key(index))))
            .collect()
    }

    /// Keys and values that give `controller` exactly `permissions` and list
    /// it under `AddressPermissions[]` when it is not there yet.
    fn grant_entries(
        &self,
        account: Address,
        controller: Address,
        permissions: PermissionSet,
    ) -> (Vec<Hash32>, Vec<Vec<u8>>) {
        let mut keys = vec![permissions_key(&controller)];
        let mut values = vec![permissions.encode()];
        let listed = self.controllers(account);
        if !listed.contains(&controller) {
            let len = decode_array_length(&self.data(account, &ADDRESS_PERMISSIONS_ARRAY_KEY))
                .unwrap_or_default();
            keys.push(ADDRESS_PERMISSIONS_ARRAY_KEY);
            values.push(encode_array_length(len + 1));
            keys.push(array_element_key(len));
            values.push(encode_array_element(&controller));
        }
        (keys, values)
    }

    fn required_for_key(&self, account: Address, key: &Hash32) -> Permission {
        let bytes = key.as_bytes();
        if bytes[..12] == ADDRESS_PERMISSIONS_PREFIX {
            if self.data(account, key).is_empty() {
                Permission::AddPermissions
            } else {
                Permission::ChangePermissions
            }
        } else if bytes[..16] == ADDRESS_PERMISSIONS_ARRAY_KEY.as_bytes()[..16] {
            Permission::AddPermissions
        } else {
            Permission::SetData
        }
    }

    /// LSP6 check performed by the Key Manager before relaying `call`.
    fn authorise(&self, account: Address, caller: Address, call: &ContractCall) -> Exec<()> {
        let granted = PermissionSet::decode(&self.data(account, &permissions_key(&caller)))
            .map_err(|e| revert(e.to_string()))?;
        let required = match call {
            ContractCall::SetData { key, .. } => vec![self.required_for_key(account, key)],
            ContractCall::SetDataBatch { keys, .. } => keys
                .iter()
                .map(|key| self.required_for_key(account, key))
                .collect(),
            ContractCall::Execute {
                operation, value, ..
            } => {
                let mut required = vec![match operation {
                    Operation::Call => Permission::Call,
                    Operation::Create | Operation::Create2 => Permission::Deploy,
                    Operation::StaticCall => Permission::StaticCall,
                    Operation::DelegateCall => Permission::DelegateCall,
                }];
                if *value > 0 {
                    required.push(Permission::TransferValue);
                }
                required
            }
            other => {
                return Err(revert(format!(
                    "{} cannot be relayed by the key manager",
                    other.signature()
                )))
            }
        };
        match required.into_iter().find(|p| !granted.contains(*p)) {
            Some(missing) => Err(revert(format!("NotAuthorised({caller}, {missing})"))),
            None => Ok(()),
        }
    }

    /// Execute `data` sent by `from` to `to`. Returns the address of a
    /// contract created along the way.
    fn transact(&mut self, from: Address, to: Address, data: &[u8]) -> Exec<Option<Address>> {
        let call = decode_call(data)?;
        if let Some(account) = self.key_managers.get(&to).copied() {
            let ContractCall::KeyManagerExecute { payload } = call else {
                return Err(revert("key manager only relays execute(bytes)"));
            };
            let inner = decode_call(&payload)?;
            self.authorise(account, from, &inner)?;
            return self.call_profile(account, to, inner);
        }
        if self.profiles.contains_key(&to) {
            return self.call_profile(to, from, call);
        }
        if self.vaults.contains_key(&to) {
            self.call_vault(to, from, call)?;
            return Ok(None);
        }
        Err(revert(format!("no contract at {to}")))
    }

    fn call_profile(
        &mut self,
        account: Address,
        sender: Address,
        call: ContractCall,
    ) -> Exec<Option<Address>> {
        if self.profile(account)?.key_manager != sender {
            return Err(revert(format!("caller {sender} is not the profile owner")));
        }
        match call {
            ContractCall::SetData { key, value } => {
                self.profile_mut(account)?.data.insert(key, value);
                Ok(None)
            }
            ContractCall::SetDataBatch { keys, values } => {
                if keys.len() != values.len() {
                    return Err(revert("keys and values differ in length"));
                }
                let profile = self.profile_mut(account)?;
                profile.data.extend(keys.into_iter().zip(values));
                Ok(None)
            }
            ContractCall::Execute {
                operation,
                to,
                data,
                ..
            } => match operation {
                Operation::Call => self.transact(account, to, &data),
                Operation::Create => self.deploy_vault_from(&data).map(Some),
                other => Err(revert(format!("operation {other:?} is not supported"))),
            },
            other => Err(revert(format!(
                "{} is not a profile transaction",
                other.signature()
            ))),
        }
    }

    /// Creation bytecode ends with the `address` constructor argument.
    fn deploy_vault_from(&mut self, creation: &[u8]) -> Exec<Address> {
        if creation.len() <= 32 {
            return Err(revert("creation data carries no constructor argument"));
        }
        let word = &creation[creation.len() - 32..];
        if word[..12].iter().any(|b| *b != 0) {
            return Err(revert("constructor argument is not an address"));
        }
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&word[12..]);
        let account = Address::from_bytes(bytes);

        let vault = self.next_address(b"vault");
        self.vaults.insert(
            vault,
            VaultState {
                account,
                ..VaultState::default()
            },
        );
        Ok(vault)
    }

    fn call_vault(&mut self, address: Address, sender: Address, call: ContractCall) -> Exec<()> {
        let vault = self.vault_mut(address)?;
        match call {
            ContractCall::AddGuardian { guardian } => {
                vault.only_account(sender)?;
                if vault.guardians.contains(&guardian) {
                    return Err(revert(format!("{guardian} is already a guardian")));
                }
                vault.guardians.push(guardian);
            }
            ContractCall::RemoveGuardian { guardian } => {
                vault.only_account(sender)?;
                let position = vault
                    .guardians
                    .iter()
                    .position(|g| *g == guardian)
                    .ok_or_else(|| revert(format!("{guardian} is not a guardian")))?;
                if vault.guardians.len() as u128 <= vault.threshold {
                    return Err(revert("guardians cannot go below the threshold"));
                }
                vault.guardians.remove(position);
            }
            ContractCall::SetThreshold { threshold } => {
                vault.only_account(sender)?;
                if threshold > vault.guardians.len() as u128 {
                    return Err(revert("threshold cannot exceed the number of guardians"));
                }
                vault.threshold = threshold;
            }
            ContractCall::SetSecret { secret_hash } => {
                vault.only_account(sender)?;
                vault.secret_hash = secret_hash;
            }
            ContractCall::VoteToRecover {
                process_id,
                new_owner,
            } => {
                if !vault.guardians.contains(&sender) {
                    return Err(revert(format!("caller {sender} is not a guardian")));
                }
                if !vault.processes.contains(&process_id) {
                    vault.processes.push(process_id);
                }
                vault.votes.insert((process_id, sender), new_owner);
            }
            ContractCall::RecoverOwnership {
                process_id,
                plain_secret,
                new_secret_hash,
            } => {
                if !vault.processes.contains(&process_id) {
                    return Err(revert(format!("unknown recover process {process_id}")));
                }
                if vault.votes_for(&process_id, sender) < vault.threshold {
                    return Err(revert("threshold not reached"));
                }
                if secret_commitment(&plain_secret) != vault.secret_hash {
                    return Err(revert("wrong plain secret"));
                }
                vault.secret_hash = new_secret_hash;
                vault.processes.clear();
                vault.votes.clear();
                vault.recoveries += 1;
                let account = vault.account;

                // The vault relays the grant through the Key Manager as itself.
                let key_manager = self.profile(account)?.key_manager;
                let (keys, values) = self.grant_entries(account, sender, PermissionSet::all());
                let grant = ContractCall::KeyManagerExecute {
                    payload: ContractCall::SetDataBatch { keys, values }.encode(),
                };
                self.transact(address, key_manager, &grant.encode())?;
            }
            // View functions may be sent as transactions; they change nothing.
            ContractCall::Account
            | ContractCall::GetGuardians
            | ContractCall::IsGuardian { .. }
            | ContractCall::GetGuardiansThreshold
            | ContractCall::GetRecoverProcessesIds
            | ContractCall::GetGuardianVote { .. } => {}
            other => {
                return Err(revert(format!(
                    "{} is not a vault function",
                    other.signature()
                )))
            }
        }
        Ok(())
    }

    fn view(&self, to: Address, call: ContractCall) -> Exec<Vec<u8>> {
        if let Some(profile) = self.profiles.get(&to) {
            return match call {
                ContractCall::Owner => Ok(abi::encode_return(Token::Address(profile.key_manager))),
                ContractCall::GetData { key } => Ok(abi::encode_return(Token::Bytes(
                    profile.data.get(&key).cloned().unwrap_or_default(),
                ))),
                other => Err(revert(format!("{} is not a profile view", other.signature()))),
            };
        }
        if let Some(vault) = self.vaults.get(&to) {
            let token = match call {
                ContractCall::Account => Token::Address(vault.account),
                ContractCall::GetGuardians => Token::Array(
                    vault.guardians.iter().copied().map(Token::Address).collect(),
                ),
                ContractCall::IsGuardian { address } => {
                    Token::Bool(vault.guardians.contains(&address))
                }
                ContractCall::GetGuardiansThreshold => Token::Uint(vault.threshold),
                ContractCall::GetRecoverProcessesIds => Token::Array(
                    vault
                        .processes
                        .iter()
                        .map(|id| Token::FixedBytes(*id.as_word()))
                        .collect(),
                ),
                ContractCall::GetGuardianVote {
                    process_id,
                    guardian,
                } => Token::Address(
                    vault
                        .votes
                        .get(&(process_id, guardian))
                        .copied()
                        .unwrap_or(Address::ZERO),
                ),
                other => {
                    return Err(revert(format!("{} is not a vault view", other.signature())))
                }
            };
            return Ok(abi::encode_return(token));
        }
        // No code at the address
        Ok(Vec::new())
    }
}

#[derive(Debug, Default)]
struct MockState {
    chain: Chain,
    transactions: u64,
    sent: Vec<TransactionRequest>,
    estimate_failure: Option<LedgerError>,
    send_failure: Option<LedgerError>,
    read_failure: Option<LedgerError>,
    read_overrides: HashMap<(Address, Vec<u8>), Vec<u8>>,
}

/// Deterministic in-memory ledger implementing [`LedgerEffects`].
#[derive(Debug, Clone, Default)]
pub struct MockLedger {
    state: Arc<Mutex<MockState>>,
}

impl MockLedger {
    /// Empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deploy a profile and its Key Manager; `owner` gets every permission.
    pub fn deploy_profile(&self, owner: Address) -> ProfileHandle {
        let handle = {
            let mut state = self.state.lock().unwrap();
            let account = state.chain.next_address(b"profile");
            let key_manager = state.chain.next_address(b"key-manager");
            state.chain.profiles.insert(
                account,
                ProfileState {
                    key_manager,
                    data: HashMap::new(),
                },
            );
            state.chain.key_managers.insert(key_manager, account);
            ProfileHandle {
                account,
                key_manager,
            }
        };
        self.add_controller(handle.account, owner, PermissionSet::all());
        handle
    }

    /// Give `controller` exactly `permissions`, listing it if needed.
    pub fn add_controller(&self, account: Address, controller: Address, permissions: PermissionSet) {
        let mut state = self.state.lock().unwrap();
        let (keys, values) = state.chain.grant_entries(account, controller, permissions);
        let profile = state.chain.profile_mut(account).expect("unknown profile");
        profile.data.extend(keys.into_iter().zip(values));
    }

    /// Write a raw ERC725Y value, bypassing the Key Manager.
    pub fn set_data(&self, account: Address, key: Hash32, value: Vec<u8>) {
        let mut state = self.state.lock().unwrap();
        let profile = state.chain.profile_mut(account).expect("unknown profile");
        profile.data.insert(key, value);
    }

    /// Raw ERC725Y value; empty when unset.
    pub fn get_data(&self, account: Address, key: Hash32) -> Vec<u8> {
        self.state.lock().unwrap().chain.data(account, &key)
    }

    /// Decoded permissions of `controller` on `account`.
    pub fn permissions(&self, account: Address, controller: Address) -> PermissionSet {
        PermissionSet::decode(&self.get_data(account, permissions_key(&controller)))
            .expect("malformed permission value")
    }

    /// Controllers listed under `AddressPermissions[]`.
    pub fn controllers(&self, account: Address) -> Vec<Address> {
        self.state.lock().unwrap().chain.controllers(account)
    }

    /// Deploy an empty vault bound to `account`, bypassing the Key Manager.
    pub fn deploy_vault(&self, account: Address) -> Address {
        let mut state = self.state.lock().unwrap();
        let vault = state.chain.next_address(b"vault");
        state.chain.vaults.insert(
            vault,
            VaultState {
                account,
                ..VaultState::default()
            },
        );
        vault
    }

    fn with_vault<R>(&self, vault: Address, f: impl FnOnce(&mut VaultState) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(state.chain.vaults.get_mut(&vault).expect("unknown vault"))
    }

    /// Replace the guardian set.
    pub fn set_guardians(&self, vault: Address, guardians: Vec<Address>) {
        self.with_vault(vault, |v| v.guardians = guardians);
    }

    /// Set the threshold without the guardian-count check.
    pub fn set_threshold(&self, vault: Address, threshold: u128) {
        self.with_vault(vault, |v| v.threshold = threshold);
    }

    /// Record a vote without the guardian check, opening the process if new.
    pub fn cast_vote(
        &self,
        vault: Address,
        process_id: RecoverProcessId,
        guardian: Address,
        candidate: Address,
    ) {
        self.with_vault(vault, |v| {
            if !v.processes.contains(&process_id) {
                v.processes.push(process_id);
            }
            v.votes.insert((process_id, guardian), candidate);
        });
    }

    /// Snapshot of a vault's storage.
    pub fn vault_state(&self, vault: Address) -> Option<VaultState> {
        self.state.lock().unwrap().chain.vaults.get(&vault).cloned()
    }

    /// Every request handed to `send_transaction`, in order.
    pub fn sent_transactions(&self) -> Vec<TransactionRequest> {
        self.state.lock().unwrap().sent.clone()
    }

    /// Make the next `estimate_gas` fail with `error`.
    pub fn fail_next_estimate(&self, error: LedgerError) {
        self.state.lock().unwrap().estimate_failure = Some(error);
    }

    /// Make the next `send_transaction` fail with `error`.
    pub fn fail_next_send(&self, error: LedgerError) {
        self.state.lock().unwrap().send_failure = Some(error);
    }

    /// Make every read fail with `error` until cleared with `None`.
    pub fn fail_reads(&self, error: Option<LedgerError>) {
        self.state.lock().unwrap().read_failure = error;
    }

    /// Answer reads of `call` on `to` with `response` verbatim, bypassing
    /// the modelled contract.
    pub fn override_read(&self, to: Address, call: &ContractCall, response: Vec<u8>) {
        self.state
            .lock()
            .unwrap()
            .read_overrides
            .insert((to, call.encode()), response);
    }
}

#[async_trait]
impl LedgerEffects for MockLedger {
    async fn read(&self, to: Address, data: Vec<u8>) -> Result<Vec<u8>, LedgerError> {
        let state = self.state.lock().unwrap();
        if let Some(error) = &state.read_failure {
            return Err(error.clone());
        }
        if let Some(response) = state.read_overrides.get(&(to, data.clone())) {
            return Ok(response.clone());
        }
        state.chain.view(to, decode_call(&data)?)
    }

    async fn estimate_gas(&self, request: &TransactionRequest) -> Result<u64, LedgerError> {
        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.estimate_failure.take() {
            return Err(error);
        }
        let mut scratch = state.chain.clone();
        scratch.transact(request.from, request.to, &request.data)?;
        Ok(intrinsic_gas(request))
    }

    async fn send_transaction(
        &self,
        request: TransactionRequest,
    ) -> Result<TransactionReceipt, LedgerError> {
        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.send_failure.take() {
            return Err(error);
        }
        state.sent.push(request.clone());
        state.transactions += 1;

        let mut seed = b"tx".to_vec();
        seed.extend_from_slice(&state.transactions.to_be_bytes());
        let transaction_hash = keccak256(&seed);
        let gas_used = intrinsic_gas(&request);

        let mut next = state.chain.clone();
        let outcome = if request.gas.is_some_and(|limit| limit < gas_used) {
            Err(revert("out of gas"))
        } else {
            next.transact(request.from, request.to, &request.data)
        };
        let (success, contract_address) = match outcome {
            Ok(created) => {
                state.chain = next;
                (true, created)
            }
            Err(error) => {
                tracing::debug!(tx = %transaction_hash, error = %error, "mock transaction reverted");
                (false, None)
            }
        };

        Ok(TransactionReceipt {
            transaction_hash,
            from: request.from,
            to: request.to,
            gas_used,
            success,
            contract_address,
        })
    }
}
