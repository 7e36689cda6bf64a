//! Unified error system for upguard
//!
//! One error type for every operation in the workspace. Ledger failures keep
//! their original cause so callers can tell a failed gas estimate from a
//! failed submission without parsing strings.

use serde::{Deserialize, Serialize};

/// Failure reported by the ledger collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum LedgerError {
    /// Execution reverted on the ledger side
    #[error("execution reverted: {reason}")]
    Reverted {
        /// Revert reason as reported by the ledger
        reason: String,
    },

    /// Connection, RPC or provider failure
    #[error("transport failure: {message}")]
    Transport {
        /// Error message describing the transport issue
        message: String,
    },

    /// The ledger refused the transaction before execution (nonce, funds, signer)
    #[error("transaction rejected: {message}")]
    Rejected {
        /// Error message describing the rejection
        message: String,
    },
}

impl LedgerError {
    /// Create a revert error
    pub fn reverted(reason: impl Into<String>) -> Self {
        Self::Reverted {
            reason: reason.into(),
        }
    }

    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a rejection error
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }
}

/// Unified error type for all upguard operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum RecoveryError {
    /// Invalid input (malformed address, oversized process id, missing bytecode)
    #[error("Invalid: {message}")]
    Invalid {
        /// Error message describing the invalid input
        message: String,
    },

    /// Resource not found
    #[error("Not found: {message}")]
    NotFound {
        /// Error message describing what was not found
        message: String,
    },

    /// Gas estimation failed before anything was submitted
    #[error("{message}: {cause}")]
    GasEstimation {
        /// Stage description
        message: String,
        /// Underlying ledger failure
        cause: LedgerError,
    },

    /// Submission or on-ledger execution of a transaction failed
    #[error("{message}: {cause}")]
    Submission {
        /// Stage description
        message: String,
        /// Underlying ledger failure
        cause: LedgerError,
    },

    /// A read against the ledger failed
    #[error("Ledger read failed: {cause}")]
    Ledger {
        /// Underlying ledger failure
        cause: LedgerError,
    },

    /// ABI encoding/decoding error
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message describing the codec failure
        message: String,
    },

    /// Configuration could not be loaded or is invalid
    #[error("Config error: {message}")]
    Config {
        /// Error message describing the configuration problem
        message: String,
    },
}

impl RecoveryError {
    /// Create an invalid input error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Wrap a ledger failure raised while estimating gas
    pub fn gas_estimation(cause: LedgerError) -> Self {
        Self::GasEstimation {
            message: "failed to estimate gas".to_string(),
            cause,
        }
    }

    /// Wrap a ledger failure raised while submitting a transaction
    pub fn submission(cause: LedgerError) -> Self {
        Self::Submission {
            message: "failed to submit transaction".to_string(),
            cause,
        }
    }

    /// Wrap a ledger failure raised by a read
    pub fn ledger(cause: LedgerError) -> Self {
        Self::Ledger { cause }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// The ledger failure behind this error, if any.
    pub fn ledger_cause(&self) -> Option<&LedgerError> {
        match self {
            Self::GasEstimation { cause, .. }
            | Self::Submission { cause, .. }
            | Self::Ledger { cause } => Some(cause),
            _ => None,
        }
    }
}

impl From<LedgerError> for RecoveryError {
    fn from(cause: LedgerError) -> Self {
        Self::ledger(cause)
    }
}

/// Standard Result type for upguard operations
pub type RecoveryResult<T> = std::result::Result<T, RecoveryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = RecoveryError::invalid("test message");
        assert!(matches!(err, RecoveryError::Invalid { .. }));
        assert_eq!(err.to_string(), "Invalid: test message");
    }

    #[test]
    fn test_stage_errors_keep_cause() {
        let cause = LedgerError::reverted("not authorised");
        let estimate = RecoveryError::gas_estimation(cause.clone());
        let submit = RecoveryError::submission(cause.clone());

        assert_eq!(
            estimate.to_string(),
            "failed to estimate gas: execution reverted: not authorised"
        );
        assert_eq!(
            submit.to_string(),
            "failed to submit transaction: execution reverted: not authorised"
        );
        assert_eq!(estimate.ledger_cause(), Some(&cause));
        assert_eq!(submit.ledger_cause(), Some(&cause));
    }

    #[test]
    fn test_ledger_conversion() {
        let err: RecoveryError = LedgerError::transport("connection reset").into();
        assert!(matches!(err, RecoveryError::Ledger { .. }));
        assert!(RecoveryError::config("x").ledger_cause().is_none());
    }
}
