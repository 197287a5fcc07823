//! Tradepost - off-chain order and auction book for an on-chain exchange.
//!
//! The settlement contract is the source of truth; this crate keeps the
//! mutable order/auction records that precede settlement and converges them
//! to ledger state.
//!
//! # Architecture
//!
//! Ports-and-adapters around a single domain service:
//!
//! - **`service::MarketService`** - order/auction lifecycle: creation with
//!   dedup-by-nonce, signature-gated activation, bid competition with the
//!   3% outbid step, status assertions.
//! - **`service::Reconciler`** - the polling loop converging local records
//!   to the contract's order states, one instance per entity kind.
//!
//! # Modules
//!
//! - [`config`] - TOML configuration and logging init
//! - [`domain`] - orders, auctions, statuses, signature parsing
//! - [`error`] - error taxonomy with stable numeric client codes
//! - [`port`] - store and ledger gateway traits
//! - [`service`] - domain service and reconciliation loop
//! - [`adapter`] - SQLite stores; EVM gateway (requires `evm` feature)
//! - [`testkit`] - programmable mock ledger (requires `testkit` feature)
//! - [`app`] - daemon wiring (requires `evm` feature)
//!
//! # Features
//!
//! - `evm` (default) - alloy-based JSON-RPC ledger gateway and the daemon
//! - `testkit` - in-memory `MockLedger` for integration tests

pub mod adapter;
pub mod config;
pub mod domain;
pub mod error;
pub mod port;
pub mod service;

#[cfg(feature = "evm")]
pub mod app;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
