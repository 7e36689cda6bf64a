//! Property test strategies for upguard types

use proptest::prelude::*;
use upguard_core::{Address, RecoverProcessId};

// Re-export proptest for convenience
pub use proptest;

/// Arbitrary address, including the zero address.
pub fn arb_address() -> impl Strategy<Value = Address> {
    any::<[u8; 20]>().prop_map(Address::from_bytes)
}

/// Arbitrary non-zero address.
pub fn arb_nonzero_address() -> impl Strategy<Value = Address> {
    arb_address().prop_filter("zero address", |a| !a.is_zero())
}

/// Valid process id: 1 to 32 printable ASCII characters.
pub fn arb_process_id() -> impl Strategy<Value = RecoverProcessId> {
    "[ -~]{1,32}".prop_map(|name| RecoverProcessId::from_text(&name).unwrap())
}
