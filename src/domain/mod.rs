//! Exchange-agnostic domain types: orders, auctions, statuses, signatures.
//!
//! All amounts are exact 256-bit integers in the currency's smallest unit;
//! all local timestamps are unix milliseconds. The only projection that
//! leaves this process is [`FormattedOrder`], whose `expiry` is unix seconds
//! to match the settlement contract's struct.

pub mod auction;
pub mod order;
pub mod signature;
pub mod status;

pub use auction::{Auction, AuctionDraft};
pub use order::{draft_nonce, BidDraft, CheckedOrder, FormattedOrder, Order, OrderDraft};
pub use signature::{parse_signature, SignatureParts};
pub use status::{Side, Status};

pub const MS_PER_SEC: i64 = 1000;
pub const MINUTE_MS: i64 = 60 * MS_PER_SEC;
pub const DAY_MS: i64 = 24 * 60 * MINUTE_MS;

/// Orders without a client-supplied expiry live for 90 days.
pub const DEFAULT_EXPIRATION_MS: i64 = 90 * DAY_MS;

/// Grace window added to an auction's expiry when projected to its order
/// shape, so the contract never treats the auction order itself as expired.
pub const AUCTION_ORDER_GRACE_MS: i64 = 3650 * DAY_MS;

/// How far a reconciliation claim pushes `next_check` forward, and the
/// default delay before a record is first polled.
pub const STATUS_CHECK_PERIOD_MS: i64 = 3 * MINUTE_MS;

/// Delay before a freshly created auction is first polled.
pub const AUCTION_CHECK_PERIOD_MS: i64 = 5 * MINUTE_MS;

/// Nonce assigned to the first order of an identity tuple.
pub const DEFAULT_ORDER_NONCE: u32 = 100;

/// Minimum step a new auction bid must clear over the best open bid.
pub const MIN_BID_STEP_PERCENT: u64 = 3;
pub const FULL_PERCENT: u64 = 100;

/// Hard cap on rows returned by any listing query.
pub const MAX_LIST_LIMIT: i64 = 10_000;

/// Current unix time in milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
