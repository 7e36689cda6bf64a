//! Permission checker
//!
//! Controllers are discovered through the `AddressPermissions[]` array and
//! their rights through the per-controller bitmask. Membership is decided on
//! parsed 20-byte addresses, so the letter case a caller or the store used
//! never matters.

use futures::future::try_join_all;
use std::sync::Arc;
use upguard_core::abi::{self, ContractCall};
use upguard_core::permissions::{
    array_element_key, decode_array_element, decode_array_length, encode_array_element,
    encode_array_length, permissions_key, ADDRESS_PERMISSIONS_ARRAY_KEY,
};
use upguard_core::{
    Address, Hash32, KeyManagerExecutor, LedgerEffects, Permission, PermissionSet,
    RecoveryError, RecoveryResult, TransactionReceipt, UpguardConfig,
};

/// Largest `AddressPermissions[]` length that will be walked.
pub const MAX_CONTROLLERS: usize = 1024;

/// Stateless permission reader and delegator.
pub struct PermissionChecker<E: LedgerEffects + ?Sized> {
    executor: KeyManagerExecutor<E>,
}

impl<E: LedgerEffects + ?Sized> Clone for PermissionChecker<E> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor.clone(),
        }
    }
}

impl<E: LedgerEffects + ?Sized> PermissionChecker<E> {
    /// Create a checker over `ledger`.
    pub fn new(ledger: Arc<E>, config: &UpguardConfig) -> Self {
        Self::from_executor(KeyManagerExecutor::new(ledger, config))
    }

    /// Share an existing executor.
    pub fn from_executor(executor: KeyManagerExecutor<E>) -> Self {
        Self { executor }
    }

    async fn get_data(&self, account: Address, key: Hash32) -> RecoveryResult<Vec<u8>> {
        let data = self
            .executor
            .read(account, &ContractCall::GetData { key })
            .await?;
        abi::decode_bytes(&data)
    }

    async fn array_length(&self, account: Address) -> RecoveryResult<u128> {
        let raw = self.get_data(account, ADDRESS_PERMISSIONS_ARRAY_KEY).await?;
        decode_array_length(&raw)
    }

    /// Stored array length together with the decoded elements, from a single
    /// length read.
    async fn listed(&self, account: Address) -> RecoveryResult<(u128, Vec<Address>)> {
        let len = self.array_length(account).await?;
        let count = usize::try_from(len)
            .ok()
            .filter(|count| *count <= MAX_CONTROLLERS)
            .ok_or_else(|| {
                RecoveryError::serialization(format!(
                    "AddressPermissions[] length {len} exceeds {MAX_CONTROLLERS}"
                ))
            })?;
        let reads =
            (0..count as u128).map(|index| self.get_data(account, array_element_key(index)));
        let elements = try_join_all(reads).await?;
        let controllers = elements
            .iter()
            .filter_map(|raw| decode_array_element(raw))
            .collect();
        Ok((len, controllers))
    }

    /// Controllers listed under `AddressPermissions[]`, in array order.
    ///
    /// Elements that do not decode to an address are skipped. A stored length
    /// above [`MAX_CONTROLLERS`] is a serialization error.
    pub async fn controllers(&self, account: Address) -> RecoveryResult<Vec<Address>> {
        Ok(self.listed(account).await?.1)
    }

    /// Decoded bitmask of `controller` on `account`; empty when unset.
    pub async fn permissions_of(
        &self,
        controller: Address,
        account: Address,
    ) -> RecoveryResult<PermissionSet> {
        let raw = self.get_data(account, permissions_key(&controller)).await?;
        PermissionSet::decode(&raw)
    }

    /// Whether `controller` is a listed controller of `account` holding
    /// `ADDPERMISSIONS`.
    ///
    /// Malformed address text yields `false` rather than an error. Ledger
    /// failures still propagate.
    pub async fn can_add_permissions(&self, controller: &str, account: &str) -> RecoveryResult<bool> {
        let (Ok(controller), Ok(account)) = (Address::parse(controller), Address::parse(account))
        else {
            tracing::debug!(controller, account, "malformed address, no permission");
            return Ok(false);
        };

        let listed = self.controllers(account).await?;
        if !listed.contains(&controller) {
            tracing::debug!(controller = %controller, account = %account, "not a listed controller");
            return Ok(false);
        }

        let permissions = self.permissions_of(controller, account).await?;
        let allowed = permissions.contains(Permission::AddPermissions);
        tracing::debug!(
            controller = %controller,
            account = %account,
            permissions = ?permissions,
            allowed,
            "checked ADDPERMISSIONS"
        );
        Ok(allowed)
    }

    /// Give `beneficiary` exactly `ADDPERMISSIONS` on `account`, sent by
    /// `controller` through the Key Manager.
    ///
    /// A beneficiary that is not listed yet is appended to
    /// `AddressPermissions[]` in the same transaction.
    pub async fn grant_add_permissions(
        &self,
        controller: Address,
        beneficiary: Address,
        account: Address,
    ) -> RecoveryResult<TransactionReceipt> {
        let permissions = PermissionSet::only(Permission::AddPermissions);
        let (len, listed) = self.listed(account).await?;

        let call = if listed.contains(&beneficiary) {
            ContractCall::SetData {
                key: permissions_key(&beneficiary),
                value: permissions.encode(),
            }
        } else {
            let next = len.checked_add(1).ok_or_else(|| {
                RecoveryError::serialization("AddressPermissions[] length overflow")
            })?;
            ContractCall::SetDataBatch {
                keys: vec![
                    permissions_key(&beneficiary),
                    ADDRESS_PERMISSIONS_ARRAY_KEY,
                    array_element_key(len),
                ],
                values: vec![
                    permissions.encode(),
                    encode_array_length(next),
                    encode_array_element(&beneficiary),
                ],
            }
        };

        tracing::info!(
            beneficiary = %beneficiary,
            account = %account,
            listed = listed.contains(&beneficiary),
            "granting ADDPERMISSIONS"
        );
        self.executor.execute(call.encode(), controller, account).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use upguard_testkit::{address, test_config, ProfileFixture};

    #[tokio::test]
    async fn test_malformed_input_is_false() {
        let fixture = ProfileFixture::new();
        let checker = PermissionChecker::new(fixture.ledger.clone(), &test_config());
        let account = fixture.account.to_string();

        assert!(!checker.can_add_permissions("0x1234", &account).await.unwrap());
        assert!(!checker
            .can_add_permissions(&fixture.owner.to_string(), "not an address")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_controllers_in_array_order() {
        let fixture = ProfileFixture::new();
        fixture
            .ledger
            .add_controller(fixture.account, address(2), PermissionSet::empty());
        let checker = PermissionChecker::new(fixture.ledger.clone(), &test_config());

        assert_eq!(
            checker.controllers(fixture.account).await.unwrap(),
            vec![fixture.owner, address(2)]
        );
    }
}
