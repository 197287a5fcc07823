//! Domain services: the market operations and the reconciliation loop.

pub mod market;
pub mod reconcile;

pub use market::{AuctionView, MarketService, OrderView, PlacedAuction, PlacedBid, PlacedOrder};
pub use reconcile::{Reconciler, ReconcilerConfig, TickOutcome};
