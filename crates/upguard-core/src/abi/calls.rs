//! Typed contract calls
//!
//! Every function this client invokes on a Universal Profile, its Key Manager
//! or a recovery vault, with exact ABI encoding and decoding. Decoding is used
//! by ledger doubles to interpret calldata produced by the client.

use super::token::{decode, encode, ParamType, Token};
use super::selector;
use crate::crypto::Hash32;
use crate::errors::{RecoveryError, RecoveryResult};
use crate::types::{Address, RecoverProcessId};
use serde::{Deserialize, Serialize};

/// ERC725X operation kinds accepted by the account's `execute`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Operation {
    /// Plain call to `to`
    Call = 0,
    /// Deploy `data` as creation bytecode
    Create = 1,
    /// Deploy with a salt
    Create2 = 2,
    /// Read-only call
    StaticCall = 3,
    /// Delegate call
    DelegateCall = 4,
}

impl TryFrom<u128> for Operation {
    type Error = RecoveryError;

    fn try_from(value: u128) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Call),
            1 => Ok(Self::Create),
            2 => Ok(Self::Create2),
            3 => Ok(Self::StaticCall),
            4 => Ok(Self::DelegateCall),
            other => Err(RecoveryError::serialization(format!(
                "unknown operation type {other}"
            ))),
        }
    }
}

/// A contract function invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractCall {
    // Universal Profile
    /// `owner()`: the Key Manager controlling the account
    Owner,
    /// `getData(bytes32)`
    GetData {
        /// ERC725Y data key
        key: Hash32,
    },
    /// `setData(bytes32,bytes)`
    SetData {
        /// ERC725Y data key
        key: Hash32,
        /// Raw value
        value: Vec<u8>,
    },
    /// `setData(bytes32[],bytes[])`
    SetDataBatch {
        /// ERC725Y data keys
        keys: Vec<Hash32>,
        /// Raw values, index-aligned with `keys`
        values: Vec<Vec<u8>>,
    },
    /// `execute(uint256,address,uint256,bytes)`
    Execute {
        /// Operation kind
        operation: Operation,
        /// Target (zero for contract creation)
        to: Address,
        /// Native value
        value: u128,
        /// Calldata or creation bytecode
        data: Vec<u8>,
    },

    // Key Manager
    /// `execute(bytes)`: permission-checked forwarding to the account
    KeyManagerExecute {
        /// Encoded call on the account
        payload: Vec<u8>,
    },

    // Recovery vault
    /// `account()`
    Account,
    /// `getGuardians()`
    GetGuardians,
    /// `isGuardian(address)`
    IsGuardian {
        /// Address to check
        address: Address,
    },
    /// `getGuardiansThreshold()`
    GetGuardiansThreshold,
    /// `getRecoverProcessesIds()`
    GetRecoverProcessesIds,
    /// `getGuardianVote(bytes32,address)`
    GetGuardianVote {
        /// Process channel
        process_id: RecoverProcessId,
        /// Guardian whose vote is read
        guardian: Address,
    },
    /// `addGuardian(address)`
    AddGuardian {
        /// Guardian to add
        guardian: Address,
    },
    /// `removeGuardian(address)`
    RemoveGuardian {
        /// Guardian to remove
        guardian: Address,
    },
    /// `setThreshold(uint256)`
    SetThreshold {
        /// New guardians threshold
        threshold: u128,
    },
    /// `setSecret(bytes32)`
    SetSecret {
        /// Commitment to the owner secret
        secret_hash: Hash32,
    },
    /// `voteToRecover(bytes32,address)`
    VoteToRecover {
        /// Process channel
        process_id: RecoverProcessId,
        /// Candidate new owner
        new_owner: Address,
    },
    /// `recoverOwnership(bytes32,string,bytes32)`
    RecoverOwnership {
        /// Process channel
        process_id: RecoverProcessId,
        /// Plaintext of the current secret
        plain_secret: String,
        /// Commitment to the next secret
        new_secret_hash: Hash32,
    },
}

const SIGNATURES: [&str; 18] = [
    "owner()",
    "getData(bytes32)",
    "setData(bytes32,bytes)",
    "setData(bytes32[],bytes[])",
    "execute(uint256,address,uint256,bytes)",
    "execute(bytes)",
    "account()",
    "getGuardians()",
    "isGuardian(address)",
    "getGuardiansThreshold()",
    "getRecoverProcessesIds()",
    "getGuardianVote(bytes32,address)",
    "addGuardian(address)",
    "removeGuardian(address)",
    "setThreshold(uint256)",
    "setSecret(bytes32)",
    "voteToRecover(bytes32,address)",
    "recoverOwnership(bytes32,string,bytes32)",
];

impl ContractCall {
    /// Canonical Solidity signature.
    pub fn signature(&self) -> &'static str {
        match self {
            Self::Owner => SIGNATURES[0],
            Self::GetData { .. } => SIGNATURES[1],
            Self::SetData { .. } => SIGNATURES[2],
            Self::SetDataBatch { .. } => SIGNATURES[3],
            Self::Execute { .. } => SIGNATURES[4],
            Self::KeyManagerExecute { .. } => SIGNATURES[5],
            Self::Account => SIGNATURES[6],
            Self::GetGuardians => SIGNATURES[7],
            Self::IsGuardian { .. } => SIGNATURES[8],
            Self::GetGuardiansThreshold => SIGNATURES[9],
            Self::GetRecoverProcessesIds => SIGNATURES[10],
            Self::GetGuardianVote { .. } => SIGNATURES[11],
            Self::AddGuardian { .. } => SIGNATURES[12],
            Self::RemoveGuardian { .. } => SIGNATURES[13],
            Self::SetThreshold { .. } => SIGNATURES[14],
            Self::SetSecret { .. } => SIGNATURES[15],
            Self::VoteToRecover { .. } => SIGNATURES[16],
            Self::RecoverOwnership { .. } => SIGNATURES[17],
        }
    }

    /// 4-byte function selector.
    pub fn selector(&self) -> [u8; 4] {
        selector(self.signature())
    }

    fn tokens(&self) -> Vec<Token> {
        match self {
            Self::Owner
            | Self::Account
            | Self::GetGuardians
            | Self::GetGuardiansThreshold
            | Self::GetRecoverProcessesIds => Vec::new(),
            Self::GetData { key } => vec![Token::FixedBytes(*key)],
            Self::SetData { key, value } => {
                vec![Token::FixedBytes(*key), Token::Bytes(value.clone())]
            }
            Self::SetDataBatch { keys, values } => vec![
                Token::Array(keys.iter().copied().map(Token::FixedBytes).collect()),
                Token::Array(values.iter().cloned().map(Token::Bytes).collect()),
            ],
            Self::Execute {
                operation,
                to,
                value,
                data,
            } => vec![
                Token::Uint(*operation as u128),
                Token::Address(*to),
                Token::Uint(*value),
                Token::Bytes(data.clone()),
            ],
            Self::KeyManagerExecute { payload } => vec![Token::Bytes(payload.clone())],
            Self::IsGuardian { address } => vec![Token::Address(*address)],
            Self::GetGuardianVote {
                process_id,
                guardian,
            } => vec![
                Token::FixedBytes(*process_id.as_word()),
                Token::Address(*guardian),
            ],
            Self::AddGuardian { guardian } | Self::RemoveGuardian { guardian } => {
                vec![Token::Address(*guardian)]
            }
            Self::SetThreshold { threshold } => vec![Token::Uint(*threshold)],
            Self::SetSecret { secret_hash } => vec![Token::FixedBytes(*secret_hash)],
            Self::VoteToRecover {
                process_id,
                new_owner,
            } => vec![
                Token::FixedBytes(*process_id.as_word()),
                Token::Address(*new_owner),
            ],
            Self::RecoverOwnership {
                process_id,
                plain_secret,
                new_secret_hash,
            } => vec![
                Token::FixedBytes(*process_id.as_word()),
                Token::String(plain_secret.clone()),
                Token::FixedBytes(*new_secret_hash),
            ],
        }
    }

    /// Selector followed by the ABI-encoded arguments.
    pub fn encode(&self) -> Vec<u8> {
        let mut calldata = self.selector().to_vec();
        calldata.extend(encode(&self.tokens()));
        calldata
    }

    /// Parse calldata produced by [`ContractCall::encode`] or any ABI encoder.
    pub fn decode(calldata: &[u8]) -> RecoveryResult<Self> {
        if calldata.len() < 4 {
            return Err(RecoveryError::serialization("calldata shorter than a selector"));
        }
        let (head, args) = calldata.split_at(4);
        let signature = SIGNATURES
            .iter()
            .copied()
            .find(|signature| selector(signature).as_slice() == head)
            .ok_or_else(|| {
                RecoveryError::serialization(format!("unknown selector 0x{}", hex::encode(head)))
            })?;

        let params = ParamType::parse_signature(signature)?;
        let mut tokens = decode(&params, args)?.into_iter();
        let mut next = || {
            tokens
                .next()
                .ok_or_else(|| RecoveryError::serialization("missing argument"))
        };

        let call = match signature {
            "owner()" => Self::Owner,
            "getData(bytes32)" => Self::GetData {
                key: next()?.into_fixed_bytes()?,
            },
            "setData(bytes32,bytes)" => Self::SetData {
                key: next()?.into_fixed_bytes()?,
                value: next()?.into_bytes()?,
            },
            "setData(bytes32[],bytes[])" => {
                let keys = next()?
                    .into_array()?
                    .into_iter()
                    .map(Token::into_fixed_bytes)
                    .collect::<RecoveryResult<Vec<_>>>()?;
                let values = next()?
                    .into_array()?
                    .into_iter()
                    .map(Token::into_bytes)
                    .collect::<RecoveryResult<Vec<_>>>()?;
                Self::SetDataBatch { keys, values }
            }
            "execute(uint256,address,uint256,bytes)" => Self::Execute {
                operation: Operation::try_from(next()?.into_uint()?)?,
                to: next()?.into_address()?,
                value: next()?.into_uint()?,
                data: next()?.into_bytes()?,
            },
            "execute(bytes)" => Self::KeyManagerExecute {
                payload: next()?.into_bytes()?,
            },
            "account()" => Self::Account,
            "getGuardians()" => Self::GetGuardians,
            "isGuardian(address)" => Self::IsGuardian {
                address: next()?.into_address()?,
            },
            "getGuardiansThreshold()" => Self::GetGuardiansThreshold,
            "getRecoverProcessesIds()" => Self::GetRecoverProcessesIds,
            "getGuardianVote(bytes32,address)" => Self::GetGuardianVote {
                process_id: RecoverProcessId::from_word(next()?.into_fixed_bytes()?),
                guardian: next()?.into_address()?,
            },
            "addGuardian(address)" => Self::AddGuardian {
                guardian: next()?.into_address()?,
            },
            "removeGuardian(address)" => Self::RemoveGuardian {
                guardian: next()?.into_address()?,
            },
            "setThreshold(uint256)" => Self::SetThreshold {
                threshold: next()?.into_uint()?,
            },
            "setSecret(bytes32)" => Self::SetSecret {
                secret_hash: next()?.into_fixed_bytes()?,
            },
            "voteToRecover(bytes32,address)" => Self::VoteToRecover {
                process_id: RecoverProcessId::from_word(next()?.into_fixed_bytes()?),
                new_owner: next()?.into_address()?,
            },
            "recoverOwnership(bytes32,string,bytes32)" => Self::RecoverOwnership {
                process_id: RecoverProcessId::from_word(next()?.into_fixed_bytes()?),
                plain_secret: next()?.into_string()?,
                new_secret_hash: next()?.into_fixed_bytes()?,
            },
            other => {
                return Err(RecoveryError::serialization(format!(
                    "no decoder for {other}"
                )))
            }
        };
        Ok(call)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selectors_are_distinct() {
        let mut selectors: Vec<[u8; 4]> = SIGNATURES.iter().map(|s| selector(s)).collect();
        selectors.sort_unstable();
        selectors.dedup();
        assert_eq!(selectors.len(), SIGNATURES.len());
    }

    #[test]
    fn test_owner_selector() {
        assert_eq!(hex::encode(ContractCall::Owner.selector()), "8da5cb5b");
        assert_eq!(ContractCall::Owner.encode(), vec![0x8d, 0xa5, 0xcb, 0x5b]);
    }

    #[test]
    fn test_execute_wraps_nested_payload() {
        let inner = ContractCall::AddGuardian {
            guardian: Address::from_bytes([7; 20]),
        };
        let outer = ContractCall::Execute {
            operation: Operation::Call,
            to: Address::from_bytes([9; 20]),
            value: 0,
            data: inner.encode(),
        };
        let forwarded = ContractCall::KeyManagerExecute {
            payload: outer.encode(),
        };

        let ContractCall::KeyManagerExecute { payload } =
            ContractCall::decode(&forwarded.encode()).unwrap()
        else {
            panic!("expected key manager execute");
        };
        let ContractCall::Execute { data, .. } = ContractCall::decode(&payload).unwrap() else {
            panic!("expected account execute");
        };
        assert_eq!(ContractCall::decode(&data).unwrap(), inner);
    }

    #[test]
    fn test_recover_ownership_carries_plain_secret() {
        let call = ContractCall::RecoverOwnership {
            process_id: RecoverProcessId::from_text("channel-1").unwrap(),
            plain_secret: "old secret".to_string(),
            new_secret_hash: crate::crypto::secret_commitment("new secret"),
        };
        assert_eq!(ContractCall::decode(&call.encode()).unwrap(), call);
    }

    #[test]
    fn test_unknown_selector_rejected() {
        assert!(ContractCall::decode(&[0xde, 0xad, 0xbe, 0xef]).is_err());
        assert!(ContractCall::decode(&[0x8d]).is_err());
    }

    #[test]
    fn test_operation_codes() {
        assert_eq!(Operation::try_from(1).unwrap(), Operation::Create);
        assert!(Operation::try_from(9).is_err());
    }
}
