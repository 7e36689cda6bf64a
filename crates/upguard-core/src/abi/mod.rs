//! ABI payload codec
//!
//! Encodes the calls this client sends and decodes the values the ledger
//! returns. [`ContractCall`] covers arguments; the `decode_*` helpers cover
//! single return values.

pub mod calls;
pub mod token;

pub use calls::{ContractCall, Operation};
pub use token::{decode, encode, uint_word, ParamType, Token};

use crate::crypto::{keccak256, Hash32};
use crate::errors::{RecoveryError, RecoveryResult};
use crate::types::Address;

/// First four bytes of `keccak256(signature)`.
pub fn selector(signature: &str) -> [u8; 4] {
    let digest = keccak256(signature.as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&digest.as_bytes()[..4]);
    out
}

fn single(ty: ParamType, data: &[u8]) -> RecoveryResult<Token> {
    decode(&[ty], data)?
        .into_iter()
        .next()
        .ok_or_else(|| RecoveryError::serialization("empty return data"))
}

/// Encode a single return value.
pub fn encode_return(token: Token) -> Vec<u8> {
    encode(&[token])
}

/// Decode an `address` return value.
pub fn decode_address(data: &[u8]) -> RecoveryResult<Address> {
    single(ParamType::Address, data)?.into_address()
}

/// Decode a `uint256` return value.
pub fn decode_uint(data: &[u8]) -> RecoveryResult<u128> {
    single(ParamType::Uint, data)?.into_uint()
}

/// Decode a `bool` return value.
pub fn decode_bool(data: &[u8]) -> RecoveryResult<bool> {
    single(ParamType::Bool, data)?.into_bool()
}

/// Decode a `bytes` return value.
pub fn decode_bytes(data: &[u8]) -> RecoveryResult<Vec<u8>> {
    single(ParamType::Bytes, data)?.into_bytes()
}

/// Decode an `address[]` return value.
pub fn decode_address_array(data: &[u8]) -> RecoveryResult<Vec<Address>> {
    single(ParamType::Array(Box::new(ParamType::Address)), data)?
        .into_array()?
        .into_iter()
        .map(Token::into_address)
        .collect()
}

/// Decode a `bytes32[]` return value.
pub fn decode_bytes32_array(data: &[u8]) -> RecoveryResult<Vec<Hash32>> {
    single(ParamType::Array(Box::new(ParamType::FixedBytes)), data)?
        .into_array()?
        .into_iter()
        .map(Token::into_fixed_bytes)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_selectors() {
        assert_eq!(hex::encode(selector("transfer(address,uint256)")), "a9059cbb");
        assert_eq!(hex::encode(selector("owner()")), "8da5cb5b");
    }

    #[test]
    fn test_address_array_return() {
        let guardians = vec![Address::from_bytes([1; 20]), Address::from_bytes([2; 20])];
        let data = encode_return(Token::Array(
            guardians.iter().copied().map(Token::Address).collect(),
        ));
        assert_eq!(decode_address_array(&data).unwrap(), guardians);
    }

    #[test]
    fn test_empty_return_data_is_an_error() {
        assert!(decode_address(&[]).is_err());
        assert!(decode_uint(&[]).is_err());
    }

    #[test]
    fn test_bool_return() {
        assert!(decode_bool(&encode_return(Token::Bool(true))).unwrap());
        assert!(!decode_bool(&encode_return(Token::Bool(false))).unwrap());
    }
}
