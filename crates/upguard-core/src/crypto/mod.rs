//! Cryptographic primitives

pub mod hash;

pub use hash::{keccak256, secret_commitment, Hash32};
