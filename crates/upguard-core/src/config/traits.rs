//! Core configuration traits for upguard

use crate::errors::RecoveryResult;
use std::path::Path;

/// Configuration assembled from defaults, a file and the environment, in
/// that order of precedence (later wins).
pub trait LayeredConfig: Clone + Default + Send + Sync + 'static {
    /// Environment variable prefix, e.g. `UPGUARD_`
    const ENV_PREFIX: &'static str;

    /// Load configuration from a file
    fn load_from_file(path: &Path) -> RecoveryResult<Self>;

    /// Set a configuration value from a string key (lowercase, `_`-separated)
    fn set_from_string(&mut self, key: &str, value: &str) -> RecoveryResult<()>;

    /// Validate the configuration
    fn validate(&self) -> RecoveryResult<()>;

    /// Merge `PREFIX_KEY=value` pairs; keys without the prefix are ignored
    fn merge_with_vars<I>(&mut self, vars: I) -> RecoveryResult<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(field) = key.strip_prefix(Self::ENV_PREFIX) {
                self.set_from_string(&field.to_lowercase(), &value)?;
            }
        }
        Ok(())
    }

    /// Merge with environment variables
    fn merge_with_env(&mut self) -> RecoveryResult<()> {
        self.merge_with_vars(std::env::vars())
    }

    /// Defaults, then the optional file, then the environment, then validation
    fn load(path: Option<&Path>) -> RecoveryResult<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };
        config.merge_with_env()?;
        config.validate()?;
        Ok(config)
    }
}
