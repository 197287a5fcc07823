//! Shared harness for integration tests: tempfile-backed sqlite stores, a
//! programmable mock ledger and the service wired over them.

#![allow(dead_code)]

use std::sync::Arc;

use alloy_primitives::{hex, Address, U256};
use tradepost::adapter::sqlite::{
    create_pool, run_migrations, SqliteAuctionStore, SqliteOrderStore,
};
use tradepost::domain::{AuctionDraft, BidDraft, OrderDraft, Side};
use tradepost::service::MarketService;
use tradepost::testkit::MockLedger;

pub struct Harness {
    pub service: MarketService,
    pub orders: Arc<SqliteOrderStore>,
    pub auctions: Arc<SqliteAuctionStore>,
    pub ledger: Arc<MockLedger>,
    _db: tempfile::NamedTempFile,
}

impl Harness {
    pub fn new() -> Self {
        let db = tempfile::NamedTempFile::new().unwrap();
        let pool = create_pool(db.path().to_str().unwrap()).unwrap();
        run_migrations(&pool).unwrap();

        let orders = Arc::new(SqliteOrderStore::new(pool.clone()));
        let auctions = Arc::new(SqliteAuctionStore::new(pool));
        let ledger = Arc::new(MockLedger::new());
        let service = MarketService::new(orders.clone(), auctions.clone(), ledger.clone());

        Self {
            service,
            orders,
            auctions,
            ledger,
            _db: db,
        }
    }
}

pub fn addr(n: u8) -> Address {
    Address::repeat_byte(n)
}

pub fn hex_addr(a: Address) -> String {
    format!("{a:#x}")
}

/// Well-formed 65-byte signature blob; the mock ledger accepts any of these
/// unless told otherwise.
pub fn sign_blob(seed: u8) -> String {
    let mut bytes = vec![seed; 64];
    bytes.push(27);
    format!("0x{}", hex::encode(bytes))
}

pub fn buy_draft(account: Address, commodity: Address, currency: Address, amount: u64) -> OrderDraft {
    OrderDraft {
        account: hex_addr(account),
        side: Side::Buy,
        commodity: hex_addr(commodity),
        token_id: 7,
        currency: hex_addr(currency),
        amount: amount.to_string(),
        expiry: None,
    }
}

pub fn sell_draft(
    account: Address,
    commodity: Address,
    currency: Address,
    amount: u64,
) -> OrderDraft {
    OrderDraft {
        side: Side::Sell,
        ..buy_draft(account, commodity, currency, amount)
    }
}

pub fn auction_draft(
    account: Address,
    commodity: Address,
    currency: Address,
    min_amount: u64,
    expiry: i64,
) -> AuctionDraft {
    AuctionDraft {
        account: hex_addr(account),
        commodity: hex_addr(commodity),
        token_id: 7,
        currency: hex_addr(currency),
        min_amount: min_amount.to_string(),
        expiry,
    }
}

pub fn bid(account: Address, amount: u64) -> BidDraft {
    BidDraft {
        account: hex_addr(account),
        amount: amount.to_string(),
    }
}

/// Fund an account for buy orders up to `amount`.
pub fn fund(harness: &Harness, currency: Address, account: Address, amount: u64) {
    harness.ledger.fund(currency, account, U256::from(amount));
}
