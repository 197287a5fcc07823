//! Auction records and their order-shaped projection.

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

use super::order::{u256_decimal, FormattedOrder};
use super::status::{Side, Status};
use super::{AUCTION_ORDER_GRACE_MS, MS_PER_SEC};

/// A seller-initiated listing collecting competing buy-side bids.
///
/// The auction itself is represented on the ledger as a sell order (see
/// [`Auction::formatted`]); bids are buy-side [`super::Order`]s carrying
/// `auction_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Auction {
    pub id: i64,
    pub account: Address,
    pub commodity: Address,
    pub token_id: u64,
    pub token_type: Option<u32>,
    pub currency: Address,
    #[serde(with = "u256_decimal")]
    pub min_amount: U256,
    /// Client-facing expiry, unix milliseconds. The ledger projection adds
    /// the grace window on top of this.
    pub expiry: i64,
    pub nonce: u32,
    /// Set once the auction's order projection has been signed.
    pub active: bool,
    pub status: Status,
    pub status_tx: Option<B256>,
    pub status_reason: Option<String>,
    pub created: i64,
    #[serde(skip)]
    pub next_check: i64,
}

impl Auction {
    /// The auction as the sell order the contract validates and hashes.
    ///
    /// Expiry is pushed out by the 3650-day grace window so the contract
    /// never rejects the auction order as expired while the auction is
    /// being resolved off-chain.
    pub fn formatted(&self) -> FormattedOrder {
        FormattedOrder {
            account: self.account,
            side: Side::Sell,
            commodity: self.commodity,
            token_ids: vec![self.token_id],
            currency: self.currency,
            amount: self.min_amount,
            expiry: ((self.expiry + AUCTION_ORDER_GRACE_MS) / MS_PER_SEC) as u64,
            nonce: self.nonce,
        }
    }
}

/// Unvalidated auction submission as received from a client.
#[derive(Debug, Clone, Deserialize)]
pub struct AuctionDraft {
    pub account: String,
    pub commodity: String,
    pub token_id: u64,
    pub currency: String,
    /// Decimal string in the currency's smallest unit.
    pub min_amount: String,
    /// Unix milliseconds; must be in the future.
    pub expiry: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DAY_MS;

    fn sample_auction() -> Auction {
        Auction {
            id: 1,
            account: Address::repeat_byte(0x11),
            commodity: Address::repeat_byte(0x22),
            token_id: 5,
            token_type: None,
            currency: Address::repeat_byte(0x33),
            min_amount: U256::from(100u64),
            expiry: 1_700_000_000_000,
            nonce: 0,
            active: false,
            status: Status::None,
            status_tx: None,
            status_reason: None,
            created: 1_690_000_000_000,
            next_check: 0,
        }
    }

    #[test]
    fn projection_is_sell_side_at_min_amount() {
        let order = sample_auction().formatted();
        assert_eq!(order.side, Side::Sell);
        assert_eq!(order.amount, U256::from(100u64));
        assert_eq!(order.nonce, 0);
    }

    #[test]
    fn projection_extends_expiry_by_grace_window() {
        let auction = sample_auction();
        let order = auction.formatted();
        let expected = (auction.expiry + 3650 * DAY_MS) / 1000;
        assert_eq!(order.expiry, expected as u64);
    }
}
