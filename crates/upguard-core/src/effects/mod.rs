//! Effect traits implemented by the host application.

pub mod ledger;

pub use ledger::LedgerEffects;
