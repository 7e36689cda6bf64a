//! Core data types shared across upguard crates.

pub mod address;
pub mod process;
pub mod transaction;

pub use address::Address;
pub use process::RecoverProcessId;
pub use transaction::{TransactionReceipt, TransactionRequest};
