//! Market operations: order and auction lifecycle against the record stores
//! and the ledger gateway.
//!
//! The service owns every business rule; stores only enforce persistence
//! invariants and the gateway only answers ledger questions. Ledger state is
//! authoritative throughout: records converge to it, never the other way.

use std::str::FromStr;
use std::sync::Arc;

use alloy_primitives::{Address, B256, U256};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::domain::{
    draft_nonce, now_ms, parse_signature, Auction, AuctionDraft, BidDraft, CheckedOrder,
    FormattedOrder, Order, OrderDraft, Side, Status, DEFAULT_EXPIRATION_MS, FULL_PERCENT,
    MIN_BID_STEP_PERCENT, STATUS_CHECK_PERIOD_MS,
};
use crate::error::{code, Error, MarketError, Result};
use crate::port::{
    AuctionFilter, AuctionStore, LedgerGateway, NewAuction, NewOrder, OrderFilter, OrderStore,
    Page,
};

/// Response of a successful order placement.
#[derive(Debug, Clone, Serialize)]
pub struct PlacedOrder {
    pub id: i64,
    pub order: FormattedOrder,
}

/// Response of a successful bid placement.
#[derive(Debug, Clone, Serialize)]
pub struct PlacedBid {
    pub id: i64,
    pub auction_id: i64,
    pub order: FormattedOrder,
}

/// Response of a successful auction creation.
#[derive(Debug, Clone, Serialize)]
pub struct PlacedAuction {
    pub auction: Auction,
    pub order: FormattedOrder,
}

/// An order re-validated against the ledger at read time.
#[derive(Debug, Clone, Serialize)]
pub struct OrderView {
    pub id: i64,
    pub order: FormattedOrder,
    pub sign: Option<String>,
}

/// An auction re-validated against the ledger at read time.
#[derive(Debug, Clone, Serialize)]
pub struct AuctionView {
    pub auction: Auction,
    pub order: FormattedOrder,
}

/// The domain service over the two record stores and the ledger gateway.
pub struct MarketService {
    orders: Arc<dyn OrderStore>,
    auctions: Arc<dyn AuctionStore>,
    ledger: Arc<dyn LedgerGateway>,
    /// Per-auction critical section for the bid competition: amount check,
    /// eviction and insert must not interleave between two bidders.
    bid_locks: DashMap<i64, Arc<Mutex<()>>>,
}

fn parse_address(raw: &str, message: &'static str) -> Result<Address> {
    Address::from_str(raw.trim()).map_err(|_| MarketError::validation(message).into())
}

fn parse_amount(raw: &str) -> Result<U256> {
    U256::from_str_radix(raw.trim(), 10)
        .map_err(|_| MarketError::validation("Invalid amount").into())
}

/// Smallest amount outbidding `best`: `best * 103 / 100`, exact integer math.
fn min_next_bid(best: &U256) -> U256 {
    best.checked_mul(U256::from(FULL_PERCENT + MIN_BID_STEP_PERCENT))
        .map(|scaled| scaled / U256::from(FULL_PERCENT))
        .unwrap_or(U256::MAX)
}

impl MarketService {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        auctions: Arc<dyn AuctionStore>,
        ledger: Arc<dyn LedgerGateway>,
    ) -> Self {
        Self {
            orders,
            auctions,
            ledger,
            bid_locks: DashMap::new(),
        }
    }

    // ---------------------------------------------------------------------
    // Orders
    // ---------------------------------------------------------------------

    /// Validate and persist a new order. The commodity's token type is
    /// probed before insert so listings can carry it without extra calls.
    pub async fn add_order(&self, draft: OrderDraft) -> Result<PlacedOrder> {
        let checked = self.check_draft(&draft)?;
        self.ledger_checks(&checked.formatted(draft_nonce())).await?;
        let token_type = self
            .ledger
            .token_type(checked.commodity, checked.token_id)
            .await?;

        let order = self
            .orders
            .insert(NewOrder {
                account: checked.account,
                side: checked.side,
                commodity: checked.commodity,
                token_id: checked.token_id,
                token_type,
                currency: checked.currency,
                amount: checked.amount,
                expiry: checked.expiry,
                auction_id: None,
            })
            .await?;

        info!(id = order.id, account = %order.account, side = ?order.side, "Order created");
        Ok(PlacedOrder {
            id: order.id,
            order: order.formatted(),
        })
    }

    /// Attach a client signature to an unsigned, still-open order.
    pub async fn sign_order(&self, id: i64, sign: &str) -> Result<()> {
        let order = self.require_order(id).await?;
        if order.sign.is_some() {
            return Err(MarketError::AlreadySigned { kind: "Order" }.into());
        }
        if order.status != Status::None {
            return Err(MarketError::StatusChanged { kind: "Order" }.into());
        }

        let formatted = order.formatted();
        self.ledger_checks(&formatted).await?;
        self.verify_sign(&formatted, sign).await?;

        self.orders.set_sign(id, sign).await?;
        info!(id, "Order signed");
        Ok(())
    }

    /// Lower an order's amount, re-validating and re-signing in one step.
    /// Only plain orders qualify; a bid's amount is fixed by the competition
    /// rules.
    pub async fn reduce_order_amount(&self, id: i64, sign: &str, amount: &str) -> Result<()> {
        let mut order = self.require_order(id).await?;
        if order.auction_id.is_some() {
            return Err(
                MarketError::validation("Reducing the amount is available only for orders").into(),
            );
        }

        let amount = parse_amount(amount)?;
        if amount >= order.amount {
            return Err(
                MarketError::validation("Amount is greater or equal to the old value").into(),
            );
        }

        order.amount = amount;
        let formatted = order.formatted();
        self.ledger_checks(&formatted).await?;
        self.verify_sign(&formatted, sign).await?;

        self.orders.reduce(id, &amount, sign).await?;
        info!(id, amount = %amount, "Order amount reduced");
        Ok(())
    }

    /// Load an order, converge its status with the ledger and re-run the
    /// ledger checks. A check failure terminates the record locally before
    /// the error is surfaced.
    pub async fn get_order(&self, id: i64) -> Result<OrderView> {
        let order = self.require_order(id).await?;
        let status = self.refresh_order_status(&order).await?;

        let outcome = self.order_view_checks(&order, status).await;
        if let Err(Error::Market(err)) = &outcome {
            let terminal = if status == Status::None {
                Status::Failed
            } else {
                status
            };
            warn!(id, error = %err, status = %terminal, "Order invalidated on read");
            self.orders.mark_failed(id, &err.to_string(), terminal).await?;
        }
        outcome
    }

    async fn order_view_checks(&self, order: &Order, status: Status) -> Result<OrderView> {
        if status == Status::Cancelled {
            return Err(MarketError::validation("Order status cancelled").into());
        }
        if status == Status::Executed {
            return Err(MarketError::validation("Order status executed").into());
        }

        self.ledger_checks(&order.formatted()).await?;
        Ok(OrderView {
            id: order.id,
            order: order.formatted(),
            sign: order.sign.clone(),
        })
    }

    /// Record an externally observed settlement (cancel/execute tx) for an
    /// order. The hash is format-checked only; the fresh ledger read decides
    /// whether the record needs a later re-check.
    pub async fn set_order_status(&self, id: i64, status: u32, tx: &str) -> Result<Order> {
        let (status, tx) = parse_status_assertion(status, tx)?;
        let order = self.require_order(id).await?;
        if order.status != Status::None {
            return Err(MarketError::validation("Status already changed").into());
        }

        let ledger_status = self.ledger.order_status(&order.formatted()).await?;
        let next_check = if ledger_status == status {
            0
        } else {
            now_ms() + STATUS_CHECK_PERIOD_MS
        };

        self.orders.set_status(id, status, Some(tx), next_check).await?;
        info!(id, status = %status, settled = next_check == 0, "Order status asserted");
        self.require_order(id).await
    }

    // ---------------------------------------------------------------------
    // Auctions
    // ---------------------------------------------------------------------

    /// Validate and persist a new auction. The auction is validated through
    /// its sell-order projection, so the same ledger rules apply as for a
    /// direct sell order.
    pub async fn add_auction(&self, draft: AuctionDraft) -> Result<PlacedAuction> {
        if draft.expiry < now_ms() {
            return Err(MarketError::validation("Invalid expiry").into());
        }

        let account = parse_address(&draft.account, "Invalid account")?;
        let commodity = parse_address(&draft.commodity, "Invalid commodity")?;
        let currency = parse_address(&draft.currency, "Invalid currency")?;
        let min_amount = parse_amount(&draft.min_amount)?;
        if min_amount.is_zero() {
            return Err(MarketError::validation("low amount").into());
        }

        let projection = auction_projection(
            account,
            commodity,
            draft.token_id,
            currency,
            min_amount,
            draft.expiry,
        );
        self.ledger_checks(&projection).await?;
        let token_type = self.ledger.token_type(commodity, draft.token_id).await?;

        let auction = self
            .auctions
            .insert(NewAuction {
                account,
                commodity,
                token_id: draft.token_id,
                token_type,
                currency,
                min_amount,
                expiry: draft.expiry,
            })
            .await?;

        info!(id = auction.id, account = %auction.account, "Auction created");
        let order = auction.formatted();
        Ok(PlacedAuction { auction, order })
    }

    /// Verify the signature over the auction's order projection and flip the
    /// auction active.
    pub async fn sign_auction(&self, id: i64, sign: &str) -> Result<()> {
        let auction = self.require_auction(id).await?;
        if auction.active {
            return Err(MarketError::AlreadySigned { kind: "Auction" }.into());
        }
        if auction.status != Status::None {
            return Err(MarketError::StatusChanged { kind: "Auction" }.into());
        }

        let projection = auction.formatted();
        self.ledger_checks(&projection).await?;
        self.verify_sign(&projection, sign).await?;

        self.auctions.activate(id).await?;
        info!(id, "Auction activated");
        Ok(())
    }

    /// Place a bid: a buy-side order bound to the auction.
    ///
    /// Runs under the auction's bid lock so the outbid check, unsigned-bid
    /// eviction and insert are one atomic step per auction. A failure of the
    /// auction's own re-validation terminates the auction and all its open
    /// bids.
    pub async fn add_auction_bid(&self, auction_id: i64, draft: BidDraft) -> Result<PlacedBid> {
        let lock = self
            .bid_locks
            .entry(auction_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let auction = self.require_auction(auction_id).await?;
        if auction.expiry < now_ms() {
            return Err(MarketError::validation("Auction expired").into());
        }

        let account = parse_address(&draft.account, "Invalid account")?;
        if auction.account == account {
            return Err(MarketError::validation("Same account").into());
        }

        let amount = parse_amount(&draft.amount)?;
        if amount < auction.min_amount {
            return Err(MarketError::validation("Low amount").into());
        }

        self.check_bid_amount(auction_id, &amount).await?;

        if let Err(err) = self.ledger_checks(&auction.formatted()).await {
            if let Error::Market(market_err) = &err {
                self.fail_auction(auction_id, &market_err.to_string()).await?;
            }
            return Err(err);
        }

        let expiry = now_ms() + DEFAULT_EXPIRATION_MS;
        let bid = CheckedOrder {
            account,
            side: Side::Buy,
            commodity: auction.commodity,
            token_id: auction.token_id,
            currency: auction.currency,
            amount,
            expiry,
        };
        self.ledger_checks(&bid.formatted(draft_nonce())).await?;

        let order = self
            .orders
            .insert(NewOrder {
                account,
                side: Side::Buy,
                commodity: auction.commodity,
                token_id: auction.token_id,
                token_type: auction.token_type,
                currency: auction.currency,
                amount,
                expiry,
                auction_id: Some(auction_id),
            })
            .await?;

        info!(id = order.id, auction_id, amount = %amount, "Bid created");
        Ok(PlacedBid {
            id: order.id,
            auction_id,
            order: order.formatted(),
        })
    }

    /// Load an auction, converge its status and re-validate its projection.
    pub async fn get_auction(&self, id: i64) -> Result<AuctionView> {
        let auction = self.require_auction(id).await?;
        let status = self.refresh_auction_status(&auction).await?;

        let outcome = self.auction_view_checks(auction, status).await;
        if let Err(Error::Market(err)) = &outcome {
            let terminal = if status == Status::None {
                Status::Failed
            } else {
                status
            };
            warn!(id, error = %err, status = %terminal, "Auction invalidated on read");
            self.fail_auction_with_status(id, &err.to_string(), terminal)
                .await?;
        }
        outcome
    }

    async fn auction_view_checks(&self, auction: Auction, status: Status) -> Result<AuctionView> {
        if status == Status::Cancelled {
            return Err(MarketError::validation("Order status cancelled").into());
        }
        if status == Status::Executed {
            return Err(MarketError::validation("Order status executed").into());
        }

        let order = auction.formatted();
        self.ledger_checks(&order).await?;
        Ok(AuctionView { auction, order })
    }

    /// Record an externally observed settlement for an auction.
    pub async fn set_auction_status(&self, id: i64, status: u32, tx: &str) -> Result<Auction> {
        let (status, tx) = parse_status_assertion(status, tx)?;
        let auction = self.require_auction(id).await?;
        if auction.status != Status::None {
            return Err(MarketError::validation("Status already changed").into());
        }

        let ledger_status = self.ledger.order_status(&auction.formatted()).await?;
        let next_check = if ledger_status == status {
            0
        } else {
            now_ms() + STATUS_CHECK_PERIOD_MS
        };

        self.auctions
            .set_status(id, status, Some(tx), next_check)
            .await?;
        info!(id, status = %status, settled = next_check == 0, "Auction status asserted");
        self.require_auction(id).await
    }

    // ---------------------------------------------------------------------
    // Listings
    // ---------------------------------------------------------------------

    /// Signed open orders of one side, excluding bids.
    pub async fn open_orders(
        &self,
        side: Side,
        mut filter: OrderFilter,
        page: Page,
    ) -> Result<Vec<Order>> {
        filter.side = Some(side);
        filter.signed = Some(true);
        filter.is_bid = Some(false);
        filter.status = Some(Status::None);
        self.orders.list(&filter, &page).await
    }

    /// All of an account's plain orders, any status.
    pub async fn account_orders(
        &self,
        account: Address,
        mut filter: OrderFilter,
        page: Page,
    ) -> Result<Vec<Order>> {
        filter.account = Some(account);
        filter.is_bid = Some(false);
        self.orders.list(&filter, &page).await
    }

    /// An account's bids, optionally restricted to signed or unsigned ones.
    pub async fn account_bids(
        &self,
        account: Address,
        signed: Option<bool>,
        mut filter: OrderFilter,
        page: Page,
    ) -> Result<Vec<Order>> {
        filter.account = Some(account);
        filter.is_bid = Some(true);
        filter.signed = signed;
        self.orders.list(&filter, &page).await
    }

    /// Signed open bids on one auction, newest first.
    pub async fn auction_bids(&self, auction_id: i64, mut page: Page) -> Result<Vec<Order>> {
        let filter = OrderFilter {
            auction_id: Some(auction_id),
            signed: Some(true),
            status: Some(Status::None),
            ..OrderFilter::default()
        };
        page.newest_first = true;
        self.orders.list(&filter, &page).await
    }

    /// Active, unexpired, unsettled auctions.
    pub async fn live_auctions(
        &self,
        mut filter: AuctionFilter,
        page: Page,
    ) -> Result<Vec<Auction>> {
        filter.active = Some(true);
        filter.status = Some(Status::None);
        filter.expires_after = Some(now_ms());
        self.auctions.list(&filter, &page).await
    }

    /// All of an account's auctions, optionally filtered by active flag.
    pub async fn account_auctions(
        &self,
        account: Address,
        active: Option<bool>,
        mut filter: AuctionFilter,
        page: Page,
    ) -> Result<Vec<Auction>> {
        filter.account = Some(account);
        filter.active = active;
        self.auctions.list(&filter, &page).await
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    async fn require_order(&self, id: i64) -> Result<Order> {
        self.orders
            .get(id)
            .await?
            .ok_or_else(|| MarketError::NotFound { kind: "Order" }.into())
    }

    async fn require_auction(&self, id: i64) -> Result<Auction> {
        self.auctions
            .get(id)
            .await?
            .ok_or_else(|| MarketError::NotFound { kind: "Auction" }.into())
    }

    fn check_draft(&self, draft: &OrderDraft) -> Result<CheckedOrder> {
        let account = parse_address(&draft.account, "Invalid account")?;
        let commodity = parse_address(&draft.commodity, "Invalid commodity")?;
        let currency = parse_address(&draft.currency, "Invalid currency")?;
        let amount = parse_amount(&draft.amount)?;
        if amount.is_zero() {
            return Err(MarketError::validation("low amount").into());
        }
        let expiry = draft.expiry.unwrap_or_else(|| now_ms() + DEFAULT_EXPIRATION_MS);

        Ok(CheckedOrder {
            account,
            side: draft.side,
            commodity,
            token_id: draft.token_id,
            currency,
            amount,
            expiry,
        })
    }

    /// Contract validation plus per-side capability checks.
    async fn ledger_checks(&self, order: &FormattedOrder) -> Result<()> {
        self.ledger.check_order(order).await?;
        let token_id = order.token_ids.first().copied().unwrap_or_default();

        match order.side {
            Side::Sell => {
                let owner = self.ledger.owner_of(order.commodity, token_id).await?;
                if owner != order.account {
                    return Err(MarketError::ContractRejected {
                        reason: "Not owner of NFT".into(),
                        code: code::CONTRACT_NOT_OWNER_NFT,
                    }
                    .into());
                }

                let approved = self
                    .ledger
                    .is_approved(order.commodity, token_id, order.account)
                    .await?;
                if !approved {
                    return Err(MarketError::ContractRejected {
                        reason: "NFT not allowed for contract".into(),
                        code: code::CONTRACT_NOT_ALLOWED_NFT,
                    }
                    .into());
                }
            }
            Side::Buy => {
                let balance = self.ledger.balance_of(order.currency, order.account).await?;
                if order.amount > balance {
                    return Err(MarketError::ContractRejected {
                        reason: "Insufficient funds".into(),
                        code: code::CONTRACT_INSUFFICIENT_ERC20,
                    }
                    .into());
                }

                let allowance = self.ledger.allowance(order.currency, order.account).await?;
                if order.amount > allowance {
                    return Err(MarketError::ContractRejected {
                        reason: "Funds not allowed for contract".into(),
                        code: code::CONTRACT_NOT_ALLOWED_ERC20,
                    }
                    .into());
                }
            }
        }

        Ok(())
    }

    async fn verify_sign(&self, order: &FormattedOrder, sign: &str) -> Result<()> {
        let parts = parse_signature(sign)?;
        self.ledger.check_signature(order, &parts).await
    }

    /// Outbid rule: accept only amounts clearing `best * 103%`.
    ///
    /// A signed best bid is a hard floor; unsigned ones are evicted and the
    /// next-best takes their place. Each pass retires the bid it examined,
    /// so the loop is bounded by the number of open bids.
    async fn check_bid_amount(&self, auction_id: i64, amount: &U256) -> Result<()> {
        loop {
            let Some(best) = self.orders.last_open_bid(auction_id).await? else {
                return Ok(());
            };

            let floor = min_next_bid(&best.amount);
            if *amount >= floor {
                return Ok(());
            }

            if best.sign.is_some() {
                return Err(MarketError::BidTooLow { min_bid: floor }.into());
            }

            debug!(bid = best.id, auction_id, "Evicting unsigned bid");
            self.orders
                .mark_failed(best.id, "Low amount (created greater bid)", Status::Failed)
                .await?;
        }
    }

    async fn fail_auction(&self, auction_id: i64, reason: &str) -> Result<()> {
        self.fail_auction_with_status(auction_id, reason, Status::Failed)
            .await
    }

    /// Terminate an auction and cascade the terminal status to its open bids.
    async fn fail_auction_with_status(
        &self,
        auction_id: i64,
        reason: &str,
        status: Status,
    ) -> Result<()> {
        let bids = self
            .orders
            .fail_auction_bids(auction_id, reason, status)
            .await?;
        self.auctions.mark_failed(auction_id, reason, status).await?;
        // A terminated auction takes no more bids; drop its lock entry so
        // the table does not grow for the process lifetime.
        self.bid_locks.remove(&auction_id);
        warn!(auction_id, bids, reason, "Auction terminated");
        Ok(())
    }

    /// Converge a live order's local status with the ledger. Settled records
    /// (`next_check == 0`) are returned as-is; a NONE/NONE agreement skips
    /// the write.
    async fn refresh_order_status(&self, order: &Order) -> Result<Status> {
        if order.next_check == 0 {
            return Ok(order.status);
        }

        let status = self.ledger.order_status(&order.formatted()).await?;
        if status == Status::None && order.status == Status::None {
            return Ok(status);
        }

        self.orders.set_status(order.id, status, None, 0).await?;
        Ok(status)
    }

    async fn refresh_auction_status(&self, auction: &Auction) -> Result<Status> {
        if auction.next_check == 0 {
            return Ok(auction.status);
        }

        let status = self.ledger.order_status(&auction.formatted()).await?;
        if status == Status::None && auction.status == Status::None {
            return Ok(status);
        }

        self.auctions.set_status(auction.id, status, None, 0).await?;
        Ok(status)
    }
}

/// Common validation of a status assertion: a valid non-NONE status code and
/// a well-formed 32-byte tx hash. The tx content itself is not verified
/// against the ledger.
fn parse_status_assertion(status: u32, tx: &str) -> Result<(Status, B256)> {
    let tx = B256::from_str(tx).map_err(|_| MarketError::validation("Invalid tx hash"))?;
    let status = Status::from_code(status)
        .filter(|s| *s != Status::None)
        .ok_or_else(|| MarketError::validation("Invalid status"))?;
    Ok((status, tx))
}

fn auction_projection(
    account: Address,
    commodity: Address,
    token_id: u64,
    currency: Address,
    min_amount: U256,
    expiry: i64,
) -> FormattedOrder {
    use crate::domain::{AUCTION_ORDER_GRACE_MS, MS_PER_SEC};

    FormattedOrder {
        account,
        side: Side::Sell,
        commodity,
        token_ids: vec![token_id],
        currency,
        amount: min_amount,
        expiry: ((expiry + AUCTION_ORDER_GRACE_MS) / MS_PER_SEC) as u64,
        nonce: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_next_bid_is_three_percent_up() {
        assert_eq!(min_next_bid(&U256::from(100u64)), U256::from(103u64));
        assert_eq!(min_next_bid(&U256::from(1000u64)), U256::from(1030u64));
        // integer division floors
        assert_eq!(min_next_bid(&U256::from(10u64)), U256::from(10u64));
    }

    #[test]
    fn min_next_bid_saturates_near_max() {
        assert_eq!(min_next_bid(&U256::MAX), U256::MAX);
    }

    #[test]
    fn status_assertion_rejects_bad_inputs() {
        let tx = format!("0x{}", "ab".repeat(32));
        assert!(parse_status_assertion(1, &tx).is_ok());
        assert!(parse_status_assertion(999, &tx).is_ok());
        assert!(parse_status_assertion(0, &tx).is_err()); // NONE not assertable
        assert!(parse_status_assertion(5, &tx).is_err());
        assert!(parse_status_assertion(1, "0x1234").is_err());
    }

    #[tokio::test]
    async fn terminated_auction_releases_its_bid_lock() {
        use crate::adapter::sqlite::{
            create_pool, run_migrations, SqliteAuctionStore, SqliteOrderStore,
        };
        use crate::testkit::MockLedger;

        let db = tempfile::NamedTempFile::new().unwrap();
        let pool = create_pool(db.path().to_str().unwrap()).unwrap();
        run_migrations(&pool).unwrap();
        let ledger = Arc::new(MockLedger::new());
        let service = MarketService::new(
            Arc::new(SqliteOrderStore::new(pool.clone())),
            Arc::new(SqliteAuctionStore::new(pool)),
            ledger.clone(),
        );

        let seller = Address::repeat_byte(0x11);
        let commodity = Address::repeat_byte(0x22);
        let currency = Address::repeat_byte(0x33);
        let bidder = Address::repeat_byte(0x44);
        ledger.grant_token(commodity, 7, seller);
        ledger.fund(currency, bidder, U256::from(10_000u64));

        let placed = service
            .add_auction(AuctionDraft {
                account: format!("{seller:#x}"),
                commodity: format!("{commodity:#x}"),
                token_id: 7,
                currency: format!("{currency:#x}"),
                min_amount: "100".into(),
                expiry: now_ms() + 1_000_000,
            })
            .await
            .unwrap();
        let id = placed.auction.id;

        let bid = |amount: &str| BidDraft {
            account: format!("{bidder:#x}"),
            amount: amount.into(),
        };
        service.add_auction_bid(id, bid("100")).await.unwrap();
        assert_eq!(service.bid_locks.len(), 1);

        // the auction's own re-validation failing cascades and drops the lock
        ledger.reject_orders("Order expired");
        assert!(service.add_auction_bid(id, bid("200")).await.is_err());
        assert!(service.bid_locks.is_empty());
    }

    #[test]
    fn projection_matches_auction_formatted() {
        use crate::domain::Auction;

        let auction = Auction {
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
            created: 0,
            next_check: 0,
        };

        let direct = auction_projection(
            auction.account,
            auction.commodity,
            auction.token_id,
            auction.currency,
            auction.min_amount,
            auction.expiry,
        );
        assert_eq!(direct, auction.formatted());
    }
}
