//! LSP6 permission model
//!
//! Controllers of a Universal Profile are listed under the `AddressPermissions[]`
//! array key of the account's ERC725Y store, and each controller's 32-byte
//! permission bitmask lives under `AddressPermissions:Permissions:<address>`.

use crate::crypto::Hash32;
use crate::errors::{RecoveryError, RecoveryResult};
use crate::types::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// `keccak256("AddressPermissions[]")`
pub const ADDRESS_PERMISSIONS_ARRAY_KEY: Hash32 = Hash32::new([
    0xdf, 0x30, 0xdb, 0xa0, 0x6d, 0xb6, 0xa3, 0x0e, 0x65, 0x35, 0x4d, 0x9a, 0x64, 0xc6, 0x09, 0x86,
    0x1f, 0x08, 0x95, 0x45, 0xca, 0x58, 0xc6, 0xb4, 0xdb, 0xe3, 0x1a, 0x5f, 0x33, 0x8c, 0xb0, 0xe3,
]);

/// Prefix of `AddressPermissions:Permissions:<address>` keys.
pub const ADDRESS_PERMISSIONS_PREFIX: [u8; 12] = [
    0x4b, 0x80, 0x74, 0x2d, 0xe2, 0xbf, 0x82, 0xac, 0xb3, 0x63, 0x00, 0x00,
];

/// Named permission flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Permission {
    /// Transfer ownership of the account
    ChangeOwner,
    /// Edit permissions of existing controllers
    ChangePermissions,
    /// Grant permissions to new controllers
    AddPermissions,
    /// Write ERC725Y data
    SetData,
    /// Call other contracts
    Call,
    /// Static-call other contracts
    StaticCall,
    /// Delegate-call other contracts
    DelegateCall,
    /// Deploy contracts
    Deploy,
    /// Send native value
    TransferValue,
    /// Sign on behalf of the account
    Sign,
}

impl Permission {
    /// Every named flag, in bit order.
    pub const ALL: [Permission; 10] = [
        Permission::ChangeOwner,
        Permission::ChangePermissions,
        Permission::AddPermissions,
        Permission::SetData,
        Permission::Call,
        Permission::StaticCall,
        Permission::DelegateCall,
        Permission::Deploy,
        Permission::TransferValue,
        Permission::Sign,
    ];

    /// Bit value in the permission word.
    pub const fn bit(self) -> u64 {
        match self {
            Permission::ChangeOwner => 0x1,
            Permission::ChangePermissions => 0x2,
            Permission::AddPermissions => 0x4,
            Permission::SetData => 0x8,
            Permission::Call => 0x10,
            Permission::StaticCall => 0x20,
            Permission::DelegateCall => 0x40,
            Permission::Deploy => 0x80,
            Permission::TransferValue => 0x100,
            Permission::Sign => 0x200,
        }
    }

    /// Name used by LSP6 tooling.
    pub const fn name(self) -> &'static str {
        match self {
            Permission::ChangeOwner => "CHANGEOWNER",
            Permission::ChangePermissions => "CHANGEPERMISSIONS",
            Permission::AddPermissions => "ADDPERMISSIONS",
            Permission::SetData => "SETDATA",
            Permission::Call => "CALL",
            Permission::StaticCall => "STATICCALL",
            Permission::DelegateCall => "DELEGATECALL",
            Permission::Deploy => "DEPLOY",
            Permission::TransferValue => "TRANSFERVALUE",
            Permission::Sign => "SIGN",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A 256-bit permission bitmask.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PermissionSet(Hash32);

impl PermissionSet {
    /// No permissions.
    pub const fn empty() -> Self {
        Self(Hash32::ZERO)
    }

    /// Every named permission.
    pub fn all() -> Self {
        Permission::ALL.iter().copied().collect()
    }

    /// Set containing a single permission.
    pub fn only(permission: Permission) -> Self {
        Self::empty().with(permission)
    }

    /// Builder-style insert.
    pub fn with(mut self, permission: Permission) -> Self {
        self.insert(permission);
        self
    }

    /// Set a flag.
    pub fn insert(&mut self, permission: Permission) {
        let bytes = permission.bit().to_be_bytes();
        for (slot, byte) in self.0 .0[24..].iter_mut().zip(bytes) {
            *slot |= byte;
        }
    }

    /// Clear a flag.
    pub fn remove(&mut self, permission: Permission) {
        let bytes = permission.bit().to_be_bytes();
        for (slot, byte) in self.0 .0[24..].iter_mut().zip(bytes) {
            *slot &= !byte;
        }
    }

    /// Whether a flag is set.
    pub fn contains(&self, permission: Permission) -> bool {
        let mut low = [0u8; 8];
        low.copy_from_slice(&self.0 .0[24..]);
        u64::from_be_bytes(low) & permission.bit() != 0
    }

    /// Whether no bit at all is set (including unnamed bits).
    pub fn is_empty(&self) -> bool {
        self.0.is_zero()
    }

    /// Named flags that are set.
    pub fn iter(&self) -> impl Iterator<Item = Permission> + '_ {
        Permission::ALL
            .iter()
            .copied()
            .filter(|permission| self.contains(*permission))
    }

    /// Decode into a name → flag table covering every named permission.
    pub fn decode_named(&self) -> BTreeMap<&'static str, bool> {
        Permission::ALL
            .iter()
            .map(|permission| (permission.name(), self.contains(*permission)))
            .collect()
    }

    /// Value written to the ERC725Y store.
    pub fn encode(&self) -> Vec<u8> {
        self.0 .0.to_vec()
    }

    /// Decode a stored value; an unset key decodes to the empty set.
    pub fn decode(value: &[u8]) -> RecoveryResult<Self> {
        if value.len() > 32 {
            return Err(RecoveryError::serialization(format!(
                "permission value of {} bytes exceeds 32",
                value.len()
            )));
        }
        let mut word = [0u8; 32];
        word[32 - value.len()..].copy_from_slice(value);
        Ok(Self(Hash32::new(word)))
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        let mut set = Self::empty();
        for permission in iter {
            set.insert(permission);
        }
        set
    }
}

impl fmt::Debug for PermissionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// `AddressPermissions:Permissions:<controller>`
pub fn permissions_key(controller: &Address) -> Hash32 {
    let mut key = [0u8; 32];
    key[..12].copy_from_slice(&ADDRESS_PERMISSIONS_PREFIX);
    key[12..].copy_from_slice(controller.as_bytes());
    Hash32::new(key)
}

/// Key of element `index` of `AddressPermissions[]`.
pub fn array_element_key(index: u128) -> Hash32 {
    let mut key = [0u8; 32];
    key[..16].copy_from_slice(&ADDRESS_PERMISSIONS_ARRAY_KEY.as_bytes()[..16]);
    key[16..].copy_from_slice(&index.to_be_bytes());
    Hash32::new(key)
}

/// Decode the array length stored under `AddressPermissions[]`.
///
/// Accepts both the 16-byte `uint128` and the legacy 32-byte `uint256`
/// encodings; an unset key means an empty array.
pub fn decode_array_length(value: &[u8]) -> RecoveryResult<u128> {
    if value.len() > 32 {
        return Err(RecoveryError::serialization(format!(
            "array length value of {} bytes exceeds 32",
            value.len()
        )));
    }
    let mut word = [0u8; 32];
    word[32 - value.len()..].copy_from_slice(value);
    if word[..16].iter().any(|b| *b != 0) {
        return Err(RecoveryError::serialization("array length exceeds u128"));
    }
    let mut low = [0u8; 16];
    low.copy_from_slice(&word[16..]);
    Ok(u128::from_be_bytes(low))
}

/// Encode an array length as a 32-byte `uint256`.
pub fn encode_array_length(len: u128) -> Vec<u8> {
    crate::abi::uint_word(len).to_vec()
}

/// Decode an `AddressPermissions[]` element.
///
/// Elements are stored as raw 20-byte addresses; left-padded 32-byte words
/// are tolerated. Anything else is not an address.
pub fn decode_array_element(value: &[u8]) -> Option<Address> {
    let raw = match value.len() {
        20 => value,
        32 if value[..12].iter().all(|b| *b == 0) => &value[12..],
        _ => return None,
    };
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(raw);
    Some(Address::from_bytes(bytes))
}

/// Encode an `AddressPermissions[]` element.
pub fn encode_array_element(controller: &Address) -> Vec<u8> {
    controller.as_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_bits() {
        let set = PermissionSet::only(Permission::AddPermissions);
        let encoded = set.encode();
        assert_eq!(encoded.len(), 32);
        assert_eq!(encoded[31], 0x04);
        assert!(encoded[..31].iter().all(|b| *b == 0));

        let sign = PermissionSet::only(Permission::Sign).encode();
        assert_eq!(&sign[30..], &[0x02, 0x00]);
    }

    #[test]
    fn test_decode_named_table() {
        let set = PermissionSet::empty()
            .with(Permission::SetData)
            .with(Permission::AddPermissions);
        let named = set.decode_named();
        assert_eq!(named.len(), Permission::ALL.len());
        assert!(named["ADDPERMISSIONS"]);
        assert!(named["SETDATA"]);
        assert!(!named["CALL"]);
    }

    #[test]
    fn test_all_permissions_word() {
        let all = PermissionSet::all().encode();
        assert_eq!(&all[30..], &[0x03, 0xff]);
        let decoded = PermissionSet::decode(&all).unwrap();
        assert!(Permission::ALL.iter().all(|p| decoded.contains(*p)));
    }

    #[test]
    fn test_insert_remove() {
        let mut set = PermissionSet::all();
        set.remove(Permission::AddPermissions);
        assert!(!set.contains(Permission::AddPermissions));
        assert!(set.contains(Permission::ChangePermissions));
        set.insert(Permission::AddPermissions);
        assert_eq!(set, PermissionSet::all());
    }

    #[test]
    fn test_unset_value_is_empty() {
        assert!(PermissionSet::decode(&[]).unwrap().is_empty());
        assert!(PermissionSet::decode(&[0u8; 33]).is_err());
    }

    #[test]
    fn test_keys() {
        let controller = Address::from_bytes([0x11; 20]);
        let key = permissions_key(&controller);
        assert_eq!(
            key.to_hex(),
            format!("0x4b80742de2bf82acb3630000{}", "11".repeat(20))
        );

        let element = array_element_key(3);
        assert_eq!(
            element.to_hex(),
            format!("0xdf30dba06db6a30e65354d9a64c60986{:032x}", 3)
        );
    }

    #[test]
    fn test_array_length_encodings() {
        assert_eq!(decode_array_length(&[]).unwrap(), 0);
        assert_eq!(decode_array_length(&encode_array_length(5)).unwrap(), 5);
        let mut short = [0u8; 16];
        short[15] = 2;
        assert_eq!(decode_array_length(&short).unwrap(), 2);
    }

    #[test]
    fn test_array_element_encodings() {
        let controller = Address::from_bytes([0x22; 20]);
        assert_eq!(
            decode_array_element(&encode_array_element(&controller)),
            Some(controller)
        );
        assert_eq!(decode_array_element(&controller.to_word()), Some(controller));
        assert_eq!(decode_array_element(&[1, 2, 3]), None);
    }
}
