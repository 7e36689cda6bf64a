//! Solidity ABI tokens and the head/tail encoding rules.
//!
//! Only the types this client exchanges with the ledger are supported:
//! `address`, `uint256` (held as `u128`), `bool`, `bytes32`, `bytes`,
//! `string` and dynamic arrays of those.

use crate::crypto::Hash32;
use crate::errors::{RecoveryError, RecoveryResult};
use crate::types::Address;

const WORD: usize = 32;

/// A decoded ABI value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// `address`
    Address(Address),
    /// `uint256`; values above `u128::MAX` are rejected when decoding
    Uint(u128),
    /// `bool`
    Bool(bool),
    /// `bytes32`
    FixedBytes(Hash32),
    /// `bytes`
    Bytes(Vec<u8>),
    /// `string`
    String(String),
    /// `T[]`
    Array(Vec<Token>),
}

/// The declared type of an ABI parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    /// `address`
    Address,
    /// `uint256`
    Uint,
    /// `bool`
    Bool,
    /// `bytes32`
    FixedBytes,
    /// `bytes`
    Bytes,
    /// `string`
    String,
    /// `T[]`
    Array(Box<ParamType>),
}

impl ParamType {
    /// Parse a canonical Solidity type name such as `bytes32[]`.
    pub fn parse(name: &str) -> RecoveryResult<Self> {
        if let Some(inner) = name.strip_suffix("[]") {
            return Ok(Self::Array(Box::new(Self::parse(inner)?)));
        }
        match name {
            "address" => Ok(Self::Address),
            "uint256" => Ok(Self::Uint),
            "bool" => Ok(Self::Bool),
            "bytes32" => Ok(Self::FixedBytes),
            "bytes" => Ok(Self::Bytes),
            "string" => Ok(Self::String),
            other => Err(RecoveryError::serialization(format!(
                "unsupported ABI type: {other}"
            ))),
        }
    }

    /// Parse the parameter list of a function signature like `f(bytes32,bytes)`.
    pub fn parse_signature(signature: &str) -> RecoveryResult<Vec<Self>> {
        let open = signature.find('(');
        let inner = match (open, signature.strip_suffix(')')) {
            (Some(open), Some(body)) => &body[open + 1..],
            _ => {
                return Err(RecoveryError::serialization(format!(
                    "malformed function signature: {signature}"
                )))
            }
        };
        if inner.is_empty() {
            return Ok(Vec::new());
        }
        inner.split(',').map(Self::parse).collect()
    }

    fn is_dynamic(&self) -> bool {
        matches!(self, Self::Bytes | Self::String | Self::Array(_))
    }
}

impl Token {
    fn is_dynamic(&self) -> bool {
        matches!(self, Self::Bytes(_) | Self::String(_) | Self::Array(_))
    }

    /// Expect an `address`.
    pub fn into_address(self) -> RecoveryResult<Address> {
        match self {
            Self::Address(address) => Ok(address),
            other => Err(mismatch("address", &other)),
        }
    }

    /// Expect a `uint256`.
    pub fn into_uint(self) -> RecoveryResult<u128> {
        match self {
            Self::Uint(value) => Ok(value),
            other => Err(mismatch("uint256", &other)),
        }
    }

    /// Expect a `bool`.
    pub fn into_bool(self) -> RecoveryResult<bool> {
        match self {
            Self::Bool(value) => Ok(value),
            other => Err(mismatch("bool", &other)),
        }
    }

    /// Expect a `bytes32`.
    pub fn into_fixed_bytes(self) -> RecoveryResult<Hash32> {
        match self {
            Self::FixedBytes(value) => Ok(value),
            other => Err(mismatch("bytes32", &other)),
        }
    }

    /// Expect `bytes`.
    pub fn into_bytes(self) -> RecoveryResult<Vec<u8>> {
        match self {
            Self::Bytes(value) => Ok(value),
            other => Err(mismatch("bytes", &other)),
        }
    }

    /// Expect a `string`.
    pub fn into_string(self) -> RecoveryResult<String> {
        match self {
            Self::String(value) => Ok(value),
            other => Err(mismatch("string", &other)),
        }
    }

    /// Expect a dynamic array.
    pub fn into_array(self) -> RecoveryResult<Vec<Token>> {
        match self {
            Self::Array(items) => Ok(items),
            other => Err(mismatch("array", &other)),
        }
    }
}

fn mismatch(expected: &str, found: &Token) -> RecoveryError {
    RecoveryError::serialization(format!("expected {expected}, found {found:?}"))
}

enum Encoded {
    Static([u8; WORD]),
    Dynamic(Vec<u8>),
}

/// Encode a tuple of tokens.
pub fn encode(tokens: &[Token]) -> Vec<u8> {
    let head_len = WORD * tokens.len();
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for token in tokens {
        match encode_token(token) {
            Encoded::Static(word) => head.extend_from_slice(&word),
            Encoded::Dynamic(bytes) => {
                head.extend_from_slice(&uint_word((head_len + tail.len()) as u128));
                tail.extend(bytes);
            }
        }
    }

    head.extend(tail);
    head
}

fn encode_token(token: &Token) -> Encoded {
    match token {
        Token::Address(address) => Encoded::Static(address.to_word()),
        Token::Uint(value) => Encoded::Static(uint_word(*value)),
        Token::Bool(value) => Encoded::Static(uint_word(u128::from(*value))),
        Token::FixedBytes(value) => Encoded::Static(value.0),
        Token::Bytes(bytes) => Encoded::Dynamic(encode_packed_bytes(bytes)),
        Token::String(text) => Encoded::Dynamic(encode_packed_bytes(text.as_bytes())),
        Token::Array(items) => {
            let mut out = uint_word(items.len() as u128).to_vec();
            out.extend(encode(items));
            Encoded::Dynamic(out)
        }
    }
}

fn encode_packed_bytes(bytes: &[u8]) -> Vec<u8> {
    let padded = bytes.len().div_ceil(WORD) * WORD;
    let mut out = Vec::with_capacity(WORD + padded);
    out.extend_from_slice(&uint_word(bytes.len() as u128));
    out.extend_from_slice(bytes);
    out.resize(WORD + padded, 0);
    out
}

/// Big-endian 32-byte word holding `value`.
pub fn uint_word(value: u128) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Decode a tuple of the given types.
pub fn decode(types: &[ParamType], data: &[u8]) -> RecoveryResult<Vec<Token>> {
    types
        .iter()
        .enumerate()
        .map(|(index, ty)| {
            let word = read_word(data, index * WORD)?;
            if ty.is_dynamic() {
                let offset = word_to_usize(&word)?;
                let tail = data.get(offset..).ok_or_else(|| {
                    RecoveryError::serialization(format!("offset {offset} out of bounds"))
                })?;
                decode_tail(ty, tail)
            } else {
                decode_static(ty, &word)
            }
        })
        .collect()
}

fn decode_tail(ty: &ParamType, data: &[u8]) -> RecoveryResult<Token> {
    match ty {
        ParamType::Bytes => Ok(Token::Bytes(read_packed_bytes(data)?.to_vec())),
        ParamType::String => {
            let bytes = read_packed_bytes(data)?.to_vec();
            String::from_utf8(bytes)
                .map(Token::String)
                .map_err(|e| RecoveryError::serialization(format!("invalid UTF-8 string: {e}")))
        }
        ParamType::Array(inner) => {
            let len = word_to_usize(&read_word(data, 0)?)?;
            let body = &data[WORD..];
            // every element occupies at least one head word
            if len > body.len() / WORD {
                return Err(RecoveryError::serialization(format!(
                    "array length {len} exceeds payload"
                )));
            }
            let types = vec![(**inner).clone(); len];
            decode(&types, body).map(Token::Array)
        }
        static_ty => decode_static(static_ty, &read_word(data, 0)?),
    }
}

fn decode_static(ty: &ParamType, word: &[u8; WORD]) -> RecoveryResult<Token> {
    match ty {
        ParamType::Address => {
            if word[..12].iter().any(|b| *b != 0) {
                return Err(RecoveryError::serialization("dirty address padding"));
            }
            let mut bytes = [0u8; 20];
            bytes.copy_from_slice(&word[12..]);
            Ok(Token::Address(Address::from_bytes(bytes)))
        }
        ParamType::Uint => word_to_u128(word).map(Token::Uint),
        ParamType::Bool => match word_to_u128(word)? {
            0 => Ok(Token::Bool(false)),
            1 => Ok(Token::Bool(true)),
            other => Err(RecoveryError::serialization(format!(
                "invalid bool value {other}"
            ))),
        },
        ParamType::FixedBytes => Ok(Token::FixedBytes(Hash32::new(*word))),
        dynamic => Err(RecoveryError::serialization(format!(
            "{dynamic:?} is not a static type"
        ))),
    }
}

fn read_word(data: &[u8], at: usize) -> RecoveryResult<[u8; WORD]> {
    let slice = at
        .checked_add(WORD)
        .and_then(|end| data.get(at..end))
        .ok_or_else(|| RecoveryError::serialization(format!("payload too short at byte {at}")))?;
    let mut word = [0u8; WORD];
    word.copy_from_slice(slice);
    Ok(word)
}

fn read_packed_bytes(data: &[u8]) -> RecoveryResult<&[u8]> {
    let len = word_to_usize(&read_word(data, 0)?)?;
    WORD.checked_add(len)
        .and_then(|end| data.get(WORD..end))
        .ok_or_else(|| RecoveryError::serialization(format!("bytes length {len} exceeds payload")))
}

fn word_to_u128(word: &[u8; WORD]) -> RecoveryResult<u128> {
    if word[..16].iter().any(|b| *b != 0) {
        return Err(RecoveryError::serialization("uint256 value exceeds u128"));
    }
    let mut low = [0u8; 16];
    low.copy_from_slice(&word[16..]);
    Ok(u128::from_be_bytes(low))
}

fn word_to_usize(word: &[u8; WORD]) -> RecoveryResult<usize> {
    let value = word_to_u128(word)?;
    usize::try_from(value)
        .map_err(|_| RecoveryError::serialization(format!("length {value} exceeds usize")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word_hex(data: &[u8], index: usize) -> String {
        hex::encode(&data[index * WORD..(index + 1) * WORD])
    }

    #[test]
    fn test_static_and_dynamic_layout() {
        // (uint256 7, bytes 0x1234)
        let encoded = encode(&[Token::Uint(7), Token::Bytes(vec![0x12, 0x34])]);
        assert_eq!(encoded.len(), 4 * WORD);
        assert_eq!(word_hex(&encoded, 0), format!("{:064x}", 7));
        assert_eq!(word_hex(&encoded, 1), format!("{:064x}", 64));
        assert_eq!(word_hex(&encoded, 2), format!("{:064x}", 2));
        assert_eq!(word_hex(&encoded, 3), format!("1234{}", "0".repeat(60)));
    }

    #[test]
    fn test_nested_dynamic_array_offsets() {
        // bytes[] offsets are relative to the start of the element area
        let tokens = [Token::Array(vec![
            Token::Bytes(vec![0xaa]),
            Token::Bytes(vec![0xbb, 0xcc]),
        ])];
        let encoded = encode(&tokens);
        assert_eq!(word_hex(&encoded, 0), format!("{:064x}", 32));
        assert_eq!(word_hex(&encoded, 1), format!("{:064x}", 2));
        assert_eq!(word_hex(&encoded, 2), format!("{:064x}", 64));
        assert_eq!(word_hex(&encoded, 3), format!("{:064x}", 128));

        let decoded = decode(
            &[ParamType::Array(Box::new(ParamType::Bytes))],
            &encoded,
        )
        .unwrap();
        assert_eq!(decoded, tokens);
    }

    #[test]
    fn test_decode_rejects_truncated_payload() {
        let encoded = encode(&[Token::Bytes(vec![1, 2, 3])]);
        let truncated = &encoded[..WORD + 8];
        assert!(decode(&[ParamType::Bytes], truncated).is_err());
        assert!(decode(&[ParamType::Address], &[0u8; 10]).is_err());
    }

    #[test]
    fn test_decode_rejects_dirty_address() {
        let mut word = [0xffu8; WORD];
        word[..11].fill(0);
        assert!(decode(&[ParamType::Address], &word).is_err());
    }

    #[test]
    fn test_parse_signature() {
        let params = ParamType::parse_signature("setData(bytes32[],bytes[])").unwrap();
        assert_eq!(
            params,
            vec![
                ParamType::Array(Box::new(ParamType::FixedBytes)),
                ParamType::Array(Box::new(ParamType::Bytes)),
            ]
        );
        assert!(ParamType::parse_signature("owner()").unwrap().is_empty());
        assert!(ParamType::parse_signature("f(int8)").is_err());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn arb_token() -> impl Strategy<Value = Token> {
        prop_oneof![
            any::<[u8; 20]>().prop_map(|b| Token::Address(Address::from_bytes(b))),
            any::<u128>().prop_map(Token::Uint),
            any::<bool>().prop_map(Token::Bool),
            proptest::collection::vec(any::<u8>(), 0..80).prop_map(Token::Bytes),
            "[a-z ]{0,40}".prop_map(Token::String),
        ]
    }

    proptest! {
        #[test]
        fn decode_never_panics(data in proptest::collection::vec(any::<u8>(), 0..256)) {
            let types = [
                ParamType::Bytes,
                ParamType::Array(Box::new(ParamType::Bytes)),
                ParamType::String,
            ];
            let _ = decode(&types, &data);
        }

        #[test]
        fn encoded_length_is_word_aligned(tokens in proptest::collection::vec(arb_token(), 0..6)) {
            prop_assert_eq!(encode(&tokens).len() % WORD, 0);
        }
    }
}
