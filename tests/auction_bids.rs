//! Auction lifecycle and the bid competition rules.

mod common;

use alloy_primitives::U256;
use common::*;
use tradepost::domain::{now_ms, Side, Status, DAY_MS};
use tradepost::error::{Error, MarketError};
use tradepost::port::{AuctionStore, OrderStore, Page};

const COMMODITY: u8 = 0x22;
const CURRENCY: u8 = 0x33;
const SELLER: u8 = 0x11;
const ALICE: u8 = 0x55;
const BOB: u8 = 0x66;

/// Auction by SELLER with min amount 100, expiring in 10 days, already
/// re-validatable (token granted).
async fn live_auction(h: &Harness) -> i64 {
    h.ledger.grant_token(addr(COMMODITY), 7, addr(SELLER));
    let placed = h
        .service
        .add_auction(auction_draft(
            addr(SELLER),
            addr(COMMODITY),
            addr(CURRENCY),
            100,
            now_ms() + 10 * DAY_MS,
        ))
        .await
        .unwrap();
    placed.auction.id
}

#[tokio::test]
async fn auction_creation_projects_a_sell_order() {
    let h = Harness::new();
    h.ledger.grant_token(addr(COMMODITY), 7, addr(SELLER));

    let expiry = now_ms() + 10 * DAY_MS;
    let placed = h
        .service
        .add_auction(auction_draft(
            addr(SELLER),
            addr(COMMODITY),
            addr(CURRENCY),
            100,
            expiry,
        ))
        .await
        .unwrap();

    assert_eq!(placed.order.side, Side::Sell);
    assert_eq!(placed.order.amount, U256::from(100u64));
    assert_eq!(placed.order.nonce, 0);
    // the projection's expiry carries the grace window
    assert!(placed.order.expiry > (expiry / 1000) as u64);
    assert!(!placed.auction.active);
}

#[tokio::test]
async fn past_expiry_is_rejected_before_any_ledger_call() {
    let h = Harness::new();
    assert_eq!(
        h.service
            .add_auction(auction_draft(
                addr(SELLER),
                addr(COMMODITY),
                addr(CURRENCY),
                100,
                now_ms() - 1,
            ))
            .await
            .unwrap_err()
            .to_string(),
        "Invalid expiry"
    );
    assert_eq!(h.ledger.call_count(), 0);
}

#[tokio::test]
async fn sign_auction_activates_once() {
    let h = Harness::new();
    let id = live_auction(&h).await;

    h.service.sign_auction(id, &sign_blob(0xaa)).await.unwrap();
    assert!(h.auctions.get(id).await.unwrap().unwrap().active);

    assert_eq!(
        h.service
            .sign_auction(id, &sign_blob(0xbb))
            .await
            .unwrap_err()
            .to_string(),
        "Auction already signed"
    );
}

#[tokio::test]
async fn bid_preconditions() {
    let h = Harness::new();
    let id = live_auction(&h).await;
    fund(&h, addr(CURRENCY), addr(ALICE), 10_000);

    assert!(matches!(
        h.service.add_auction_bid(9999, bid(addr(ALICE), 100)).await.unwrap_err(),
        Error::Market(MarketError::NotFound { kind: "Auction" })
    ));

    assert_eq!(
        h.service
            .add_auction_bid(id, bid(addr(SELLER), 100))
            .await
            .unwrap_err()
            .to_string(),
        "Same account"
    );

    assert_eq!(
        h.service
            .add_auction_bid(id, bid(addr(ALICE), 99))
            .await
            .unwrap_err()
            .to_string(),
        "Low amount"
    );
}

#[tokio::test]
async fn expired_auction_rejects_bids() {
    let h = Harness::new();
    h.ledger.grant_token(addr(COMMODITY), 7, addr(SELLER));
    fund(&h, addr(CURRENCY), addr(ALICE), 10_000);

    // expiry barely in the future passes creation, then lapses
    let placed = h
        .service
        .add_auction(auction_draft(
            addr(SELLER),
            addr(COMMODITY),
            addr(CURRENCY),
            100,
            now_ms() + 20,
        ))
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(30)).await;

    assert_eq!(
        h.service
            .add_auction_bid(placed.auction.id, bid(addr(ALICE), 100))
            .await
            .unwrap_err()
            .to_string(),
        "Auction expired"
    );
}

#[tokio::test]
async fn unsigned_best_bid_is_evicted_by_a_competing_bid() {
    let h = Harness::new();
    let id = live_auction(&h).await;
    fund(&h, addr(CURRENCY), addr(ALICE), 10_000);
    fund(&h, addr(CURRENCY), addr(BOB), 10_000);

    let first = h
        .service
        .add_auction_bid(id, bid(addr(ALICE), 100))
        .await
        .unwrap();

    // 101 is below the 3% step over 100, but the best bid is unsigned:
    // it gets evicted and the new bid stands
    let second = h
        .service
        .add_auction_bid(id, bid(addr(BOB), 101))
        .await
        .unwrap();

    let evicted = h.orders.get(first.id).await.unwrap().unwrap();
    assert_eq!(evicted.status, Status::Failed);
    assert_eq!(
        evicted.status_reason.as_deref(),
        Some("Low amount (created greater bid)")
    );

    let best = h.orders.last_open_bid(id).await.unwrap().unwrap();
    assert_eq!(best.id, second.id);
    assert_eq!(best.amount, U256::from(101u64));
    assert_eq!(best.auction_id, Some(id));
    assert_eq!(best.side, Side::Buy);
}

#[tokio::test]
async fn signed_best_bid_is_a_hard_floor() {
    let h = Harness::new();
    let id = live_auction(&h).await;
    fund(&h, addr(CURRENCY), addr(ALICE), 10_000);
    fund(&h, addr(CURRENCY), addr(BOB), 10_000);

    let first = h
        .service
        .add_auction_bid(id, bid(addr(ALICE), 100))
        .await
        .unwrap();
    h.service.sign_order(first.id, &sign_blob(0xaa)).await.unwrap();

    let err = h
        .service
        .add_auction_bid(id, bid(addr(BOB), 101))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Market(MarketError::BidTooLow { min_bid }) if min_bid == U256::from(103u64)
    ));
    assert_eq!(err.to_string(), "Low amount (exist greater bid)");

    // clearing the step outbids without evicting the signed floor
    let outbid = h
        .service
        .add_auction_bid(id, bid(addr(BOB), 104))
        .await
        .unwrap();
    let signed = h.orders.get(first.id).await.unwrap().unwrap();
    assert_eq!(signed.status, Status::None);
    let best = h.orders.last_open_bid(id).await.unwrap().unwrap();
    assert_eq!(best.id, outbid.id);
}

#[tokio::test]
async fn broken_auction_cascades_to_open_bids() {
    let h = Harness::new();
    let id = live_auction(&h).await;
    fund(&h, addr(CURRENCY), addr(ALICE), 10_000);
    fund(&h, addr(CURRENCY), addr(BOB), 10_000);

    let first = h
        .service
        .add_auction_bid(id, bid(addr(ALICE), 100))
        .await
        .unwrap();

    // the contract now rejects the auction's order projection
    h.ledger.reject_orders("Order expired");
    let err = h
        .service
        .add_auction_bid(id, bid(addr(BOB), 110))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Order expired");

    let auction = h.auctions.get(id).await.unwrap().unwrap();
    assert_eq!(auction.status, Status::Failed);
    assert_eq!(auction.status_reason.as_deref(), Some("Order expired"));
    assert_eq!(auction.next_check, 0);

    let bid_row = h.orders.get(first.id).await.unwrap().unwrap();
    assert_eq!(bid_row.status, Status::Failed);
    assert_eq!(bid_row.next_check, 0);
}

#[tokio::test]
async fn concurrent_bids_leave_exactly_one_open() {
    let h = Harness::new();
    let id = live_auction(&h).await;
    fund(&h, addr(CURRENCY), addr(ALICE), 10_000);
    fund(&h, addr(CURRENCY), addr(BOB), 10_000);

    let (a, b) = tokio::join!(
        h.service.add_auction_bid(id, bid(addr(ALICE), 200)),
        h.service.add_auction_bid(id, bid(addr(BOB), 201)),
    );
    // both are accepted in some order; whichever landed first was unsigned
    // and below the other's floor, so it was evicted
    a.unwrap();
    b.unwrap();

    let open = h.service.auction_bids(id, Page::default()).await.unwrap();
    // listing is restricted to signed bids; check the store directly
    assert!(open.is_empty());
    let best = h.orders.last_open_bid(id).await.unwrap().unwrap();
    let all_bids = h
        .service
        .account_bids(addr(ALICE), None, Default::default(), Page::default())
        .await
        .unwrap()
        .len()
        + h.service
            .account_bids(addr(BOB), None, Default::default(), Page::default())
            .await
            .unwrap()
            .len();
    assert_eq!(all_bids, 2);
    assert_eq!(best.status, Status::None);
}

#[tokio::test]
async fn get_auction_reports_settlement() {
    let h = Harness::new();
    let id = live_auction(&h).await;
    let auction = h.auctions.get(id).await.unwrap().unwrap();

    h.ledger.set_status(&auction.formatted(), Status::Executed);
    assert_eq!(
        h.service.get_auction(id).await.unwrap_err().to_string(),
        "Order status executed"
    );

    let settled = h.auctions.get(id).await.unwrap().unwrap();
    assert_eq!(settled.status, Status::Executed);
    assert_eq!(settled.next_check, 0);
}

#[tokio::test]
async fn live_auction_listing_requires_active_and_unexpired() {
    let h = Harness::new();
    let id = live_auction(&h).await;

    let listed = h
        .service
        .live_auctions(Default::default(), Page::default())
        .await
        .unwrap();
    assert!(listed.is_empty());

    h.service.sign_auction(id, &sign_blob(0xaa)).await.unwrap();
    let listed = h
        .service
        .live_auctions(Default::default(), Page::default())
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, id);

    let mine = h
        .service
        .account_auctions(addr(SELLER), Some(true), Default::default(), Page::default())
        .await
        .unwrap();
    assert_eq!(mine.len(), 1);
}
