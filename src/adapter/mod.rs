//! Outbound adapters: persistence and the on-chain ledger.

#[cfg(feature = "evm")]
pub mod evm;
pub mod sqlite;
