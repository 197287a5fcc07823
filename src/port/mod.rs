//! Capability traits the domain service and reconciliation loop depend on.

pub mod ledger;
pub mod store;

pub use ledger::LedgerGateway;
pub use store::{
    AuctionFilter, AuctionStore, DueRecord, NewAuction, NewOrder, OrderFilter, OrderStore, Page,
    StatusSource,
};
