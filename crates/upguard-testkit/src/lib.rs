//! Upguard Testing Infrastructure
//!
//! An in-memory stand-in for the contracts the clients talk to, plus the
//! fixtures and proptest strategies shared by the workspace's tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
//!
//! # Usage
//!
//! ```rust,no_run
//! use upguard_testkit::*;
//!
//! # async fn demo() {
//! let profile = ProfileFixture::new();
//! let vault = profile.ledger.deploy_vault(profile.account);
//! profile.ledger.set_guardians(vault, guardians(3));
//! # }
//! ```

pub mod fixtures;
pub mod mock_ledger;
pub mod strategies;

pub use fixtures::*;
pub use mock_ledger::{MockLedger, ProfileHandle, VaultState};

/// Install a test subscriber once per process; later calls are no-ops.
///
/// Honours `RUST_LOG`, defaulting to `debug` for upguard crates.
pub fn init_test_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("upguard=debug,warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
