//! Upguard Core - Universal Profile client foundation
//!
//! Shared building blocks for the permission and recovery clients. Nothing
//! here holds state beyond an `Arc` to the host's ledger.
//!
//! # Layout
//!
//! - [`types`]: addresses, recover process ids, transaction request/receipt
//! - [`crypto`]: keccak-256 and secret commitments
//! - [`abi`]: Solidity ABI codec and the typed [`ContractCall`] set
//! - [`permissions`]: LSP6 permission bitmasks and ERC725Y keys
//! - [`effects`]: the [`LedgerEffects`] seam implemented by the host
//! - [`execution`]: gas-estimated submission through the Key Manager
//! - [`config`] and [`logging`]: ambient setup

#![forbid(unsafe_code)]

/// Solidity ABI payload codec
pub mod abi;

/// Runtime configuration
pub mod config;

/// Keccak hashing
pub mod crypto;

/// Host-provided effect traits
pub mod effects;

/// Unified error handling
pub mod errors;

/// Key Manager routed submission
pub mod execution;

/// Tracing subscriber setup
pub mod logging;

/// LSP6 permissions
pub mod permissions;

/// Core data types
pub mod types;

pub use abi::{ContractCall, Operation};
pub use config::{LayeredConfig, UpguardConfig};
pub use crypto::{keccak256, secret_commitment, Hash32};
pub use effects::LedgerEffects;
pub use errors::{LedgerError, RecoveryError, RecoveryResult};
pub use execution::{encode_execute, KeyManagerExecutor};
pub use permissions::{Permission, PermissionSet};
pub use types::{Address, RecoverProcessId, TransactionReceipt, TransactionRequest};
