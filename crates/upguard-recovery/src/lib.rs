//! # Upguard Recovery - Layer 2
//!
//! Social recovery of Universal Profiles through guardian votes.
//!
//! ## Purpose
//!
//! - Deploying a recovery vault for an account
//! - Managing guardians, the vote threshold and the owner secret
//! - Counting guardian votes per recover process and deciding whether a
//!   candidate may recover
//! - Submitting votes and the final ownership recovery
//!
//! ## Architecture Constraints
//!
//! This crate depends on:
//! - **Layer 1** (upguard-core): types, codec, ledger effects, execution path
//! - **Layer 2** (upguard-permissions): the vault-creation permission check
//!
//! ## Design Principles
//!
//! - Coordinators hold only an `Arc` to the ledger and immutable config
//! - Vaults are addressed through plain [`VaultHandle`] data
//! - Reads map absence to empty, `false` or zero; ledger failures propagate
//! - Mutations fail with the stage (estimation or submission) that failed

#![forbid(unsafe_code)]

/// Recovery vault client
pub mod coordinator;

/// Vote counting over a snapshot of guardian votes
pub mod tally;

/// Vault handles
pub mod vault;

pub use coordinator::RecoveryCoordinator;
pub use tally::{GuardianVote, RecoveryStatus, VoteSnapshot};
pub use upguard_core::{RecoveryError, RecoveryResult};
pub use vault::VaultHandle;
