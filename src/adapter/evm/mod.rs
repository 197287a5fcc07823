//! EVM-backed ledger gateway (JSON-RPC reads against the settlement
//! contract and the ERC-721/ERC-20 token contracts).

mod gateway;

pub use gateway::EvmLedgerGateway;
