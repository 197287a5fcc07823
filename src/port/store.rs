//! Store ports for the order and auction collections.
//!
//! The stores own all persistence invariants: identity-tuple uniqueness,
//! nonce bumping on resubmission of settled identities, and the atomic
//! claim-and-reschedule primitive the reconciliation loop relies on.

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;

use crate::domain::{Auction, FormattedOrder, Order, Side, Status};
use crate::error::Result;

/// Insert shape for an order; nonce, timestamps and status are assigned by
/// the store.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub account: Address,
    pub side: Side,
    pub commodity: Address,
    pub token_id: u64,
    pub token_type: Option<u32>,
    pub currency: Address,
    pub amount: U256,
    pub expiry: i64,
    pub auction_id: Option<i64>,
}

/// Insert shape for an auction.
#[derive(Debug, Clone)]
pub struct NewAuction {
    pub account: Address,
    pub commodity: Address,
    pub token_id: u64,
    pub token_type: Option<u32>,
    pub currency: Address,
    pub min_amount: U256,
    pub expiry: i64,
}

/// Listing filter for orders. Empty vectors mean "any".
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub side: Option<Side>,
    pub account: Option<Address>,
    pub commodity: Vec<Address>,
    pub currency: Vec<Address>,
    pub token_ids: Vec<u64>,
    pub status: Option<Status>,
    /// `Some(true)` restricts to signed records, `Some(false)` to unsigned.
    pub signed: Option<bool>,
    /// `Some(true)` restricts to auction bids, `Some(false)` to plain orders.
    pub is_bid: Option<bool>,
    pub auction_id: Option<i64>,
}

/// Listing filter for auctions.
#[derive(Debug, Clone, Default)]
pub struct AuctionFilter {
    pub account: Option<Address>,
    pub commodity: Vec<Address>,
    pub currency: Vec<Address>,
    pub token_ids: Vec<u64>,
    pub status: Option<Status>,
    pub active: Option<bool>,
    /// Keep only auctions expiring strictly after this time.
    pub expires_after: Option<i64>,
}

/// Pagination; `limit` is capped at [`crate::domain::MAX_LIST_LIMIT`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Page {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    /// Sort by descending id instead of ascending.
    pub newest_first: bool,
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persist a new order, deduplicating by identity tuple: if an order
    /// with the same (account, side, commodity, token_id, currency, amount)
    /// exists and is still live (`next_check > 0`), fail with
    /// [`crate::error::MarketError::Duplicate`]; if it is settled, assign
    /// the next nonce.
    async fn insert(&self, new: NewOrder) -> Result<Order>;

    async fn get(&self, id: i64) -> Result<Option<Order>>;

    /// Attach a signature.
    async fn set_sign(&self, id: i64, sign: &str) -> Result<()>;

    /// Replace amount and signature together (amount reduction).
    async fn reduce(&self, id: i64, amount: &U256, sign: &str) -> Result<()>;

    /// Assert a status with an optional transaction hash and reschedule (or
    /// stop, with `next_check = 0`) reconciliation.
    async fn set_status(
        &self,
        id: i64,
        status: Status,
        tx: Option<B256>,
        next_check: i64,
    ) -> Result<()>;

    /// Terminate a record locally: status, reason, `next_check = 0`.
    async fn mark_failed(&self, id: i64, reason: &str, status: Status) -> Result<()>;

    /// Terminate every still-open bid of an auction. Returns the number of
    /// bids affected.
    async fn fail_auction_bids(&self, auction_id: i64, reason: &str, status: Status)
        -> Result<usize>;

    /// Most recent bid on an auction still in `None` status.
    async fn last_open_bid(&self, auction_id: i64) -> Result<Option<Order>>;

    async fn list(&self, filter: &OrderFilter, page: &Page) -> Result<Vec<Order>>;
}

#[async_trait]
pub trait AuctionStore: Send + Sync {
    /// Persist a new auction with the same dedup-by-nonce rule as orders,
    /// on the (account, commodity, token_id, currency) tuple.
    async fn insert(&self, new: NewAuction) -> Result<Auction>;

    async fn get(&self, id: i64) -> Result<Option<Auction>>;

    /// Flip `active` after the auction's order projection was signed.
    async fn activate(&self, id: i64) -> Result<()>;

    async fn set_status(
        &self,
        id: i64,
        status: Status,
        tx: Option<B256>,
        next_check: i64,
    ) -> Result<()>;

    async fn mark_failed(&self, id: i64, reason: &str, status: Status) -> Result<()>;

    async fn list(&self, filter: &AuctionFilter, page: &Page) -> Result<Vec<Auction>>;
}

/// A claimed record due for reconciliation, reduced to what the loop needs.
#[derive(Debug, Clone)]
pub struct DueRecord {
    pub id: i64,
    pub status: Status,
    pub order: FormattedOrder,
}

/// The claim/settle capability the reconciliation loop polls, implemented
/// once per entity kind.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Atomically claim at most one record with `0 < next_check <= now`,
    /// pushing its `next_check` to `reschedule_to` in the same step so a
    /// concurrent claimer cannot pick it up again.
    async fn claim_due(&self, now: i64, reschedule_to: i64) -> Result<Option<DueRecord>>;

    /// Record the ledger-confirmed status and stop polling.
    async fn settle(&self, id: i64, status: Status) -> Result<()>;
}
