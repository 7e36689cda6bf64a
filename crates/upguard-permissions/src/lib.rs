//! # Upguard Permissions - Layer 2
//!
//! Reads and delegates LSP6 permissions on a Universal Profile.
//!
//! ## Purpose
//!
//! Before a controller may deploy a recovery vault for an account it must
//! hold `ADDPERMISSIONS` there, since the vault later needs to grant
//! permissions to the recovered owner. [`PermissionChecker`] answers that
//! question from the account's ERC725Y store and can delegate the permission
//! through the Key Manager.
//!
//! ## Architecture Constraints
//!
//! This crate depends only on **Layer 1** (upguard-core).

#![forbid(unsafe_code)]

/// Permission reads and delegation
pub mod checker;

pub use checker::{PermissionChecker, MAX_CONTROLLERS};
pub use upguard_core::{Permission, PermissionSet, RecoveryError, RecoveryResult};
