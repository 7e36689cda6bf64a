//! Tracing subscriber setup for hosts that have none of their own.

use crate::errors::{RecoveryError, RecoveryResult};
use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber filtered by `filter`
/// (e.g. `"upguard_recovery=debug,info"`).
///
/// `RUST_LOG`, when set, takes precedence over `filter`. Fails if the
/// directive does not parse or a global subscriber is already installed.
pub fn init_tracing(filter: &str) -> RecoveryResult<()> {
    let env_filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directive) if !directive.is_empty() => EnvFilter::try_new(directive),
        _ => EnvFilter::try_new(filter),
    }
    .map_err(|e| RecoveryError::config(format!("invalid log filter {filter:?}: {e}")))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init()
        .map_err(|e| RecoveryError::config(format!("tracing already initialised: {e}")))
}
