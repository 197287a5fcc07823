//! Database row types and their domain conversions.
//!
//! Addresses persist as lowercase `0x…` hex, amounts as canonical decimal
//! strings, timestamps as unix milliseconds.

use std::str::FromStr;

use alloy_primitives::{Address, B256, U256};
use diesel::prelude::*;

use super::schema::{auctions, orders};
use crate::domain::{Auction, Order, Side, Status};
use crate::error::Error;

/// Database row for an order.
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = orders)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct OrderRow {
    pub id: i64,
    pub account: String,
    pub side: i32,
    pub commodity: String,
    pub token_id: i64,
    pub token_type: Option<i32>,
    pub currency: String,
    pub amount: String,
    pub expiry: i64,
    pub nonce: i32,
    pub auction_id: Option<i64>,
    pub sign: Option<String>,
    pub status: i32,
    pub status_tx: Option<String>,
    pub status_reason: Option<String>,
    pub created: i64,
    pub next_check: i64,
}

/// Database row for an order (insertable; id assigned by sqlite).
#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = orders)]
pub struct NewOrderRow {
    pub account: String,
    pub side: i32,
    pub commodity: String,
    pub token_id: i64,
    pub token_type: Option<i32>,
    pub currency: String,
    pub amount: String,
    pub expiry: i64,
    pub nonce: i32,
    pub auction_id: Option<i64>,
    pub created: i64,
    pub next_check: i64,
}

/// Database row for an auction.
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = auctions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AuctionRow {
    pub id: i64,
    pub account: String,
    pub commodity: String,
    pub token_id: i64,
    pub token_type: Option<i32>,
    pub currency: String,
    pub min_amount: String,
    pub expiry: i64,
    pub nonce: i32,
    pub active: i32,
    pub status: i32,
    pub status_tx: Option<String>,
    pub status_reason: Option<String>,
    pub created: i64,
    pub next_check: i64,
}

/// Database row for an auction (insertable).
#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = auctions)]
pub struct NewAuctionRow {
    pub account: String,
    pub commodity: String,
    pub token_id: i64,
    pub token_type: Option<i32>,
    pub currency: String,
    pub min_amount: String,
    pub expiry: i64,
    pub nonce: i32,
    pub active: i32,
    pub created: i64,
    pub next_check: i64,
}

/// Canonical storage form of an address: lowercase hex with `0x` prefix.
pub fn address_to_db(addr: Address) -> String {
    format!("{addr:#x}")
}

/// Canonical storage form of an amount: decimal string.
pub fn amount_to_db(amount: &U256) -> String {
    amount.to_string()
}

pub fn tx_to_db(tx: B256) -> String {
    format!("{tx:#x}")
}

fn parse_address(raw: &str, column: &str) -> Result<Address, Error> {
    Address::from_str(raw).map_err(|e| Error::Parse(format!("{column}: {e}")))
}

fn parse_amount(raw: &str, column: &str) -> Result<U256, Error> {
    U256::from_str_radix(raw, 10).map_err(|e| Error::Parse(format!("{column}: {e}")))
}

fn parse_status(code: i32) -> Result<Status, Error> {
    Status::from_code(code as u32).ok_or_else(|| Error::Parse(format!("status: {code}")))
}

impl TryFrom<OrderRow> for Order {
    type Error = Error;

    fn try_from(row: OrderRow) -> Result<Self, Error> {
        Ok(Order {
            id: row.id,
            account: parse_address(&row.account, "orders.account")?,
            side: Side::from_code(row.side as u8)
                .ok_or_else(|| Error::Parse(format!("orders.side: {}", row.side)))?,
            commodity: parse_address(&row.commodity, "orders.commodity")?,
            token_id: row.token_id as u64,
            token_type: row.token_type.map(|t| t as u32),
            currency: parse_address(&row.currency, "orders.currency")?,
            amount: parse_amount(&row.amount, "orders.amount")?,
            expiry: row.expiry,
            nonce: row.nonce as u32,
            auction_id: row.auction_id,
            sign: row.sign,
            status: parse_status(row.status)?,
            status_tx: row
                .status_tx
                .as_deref()
                .map(|raw| {
                    B256::from_str(raw).map_err(|e| Error::Parse(format!("orders.status_tx: {e}")))
                })
                .transpose()?,
            status_reason: row.status_reason,
            created: row.created,
            next_check: row.next_check,
        })
    }
}

impl TryFrom<AuctionRow> for Auction {
    type Error = Error;

    fn try_from(row: AuctionRow) -> Result<Self, Error> {
        Ok(Auction {
            id: row.id,
            account: parse_address(&row.account, "auctions.account")?,
            commodity: parse_address(&row.commodity, "auctions.commodity")?,
            token_id: row.token_id as u64,
            token_type: row.token_type.map(|t| t as u32),
            currency: parse_address(&row.currency, "auctions.currency")?,
            min_amount: parse_amount(&row.min_amount, "auctions.min_amount")?,
            expiry: row.expiry,
            nonce: row.nonce as u32,
            active: row.active != 0,
            status: parse_status(row.status)?,
            status_tx: row
                .status_tx
                .as_deref()
                .map(|raw| {
                    B256::from_str(raw)
                        .map_err(|e| Error::Parse(format!("auctions.status_tx: {e}")))
                })
                .transpose()?,
            status_reason: row.status_reason,
            created: row.created,
            next_check: row.next_check,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_storage_is_lowercase() {
        let addr = Address::from_str("0xDAb770d15397fddfbac85d334709C92C2B473b01").unwrap();
        let stored = address_to_db(addr);
        assert_eq!(stored, stored.to_lowercase());
        assert!(stored.starts_with("0x"));
        assert_eq!(parse_address(&stored, "t").unwrap(), addr);
    }

    #[test]
    fn amount_storage_round_trips() {
        let amount = U256::from_str_radix("1200000000000000000000", 10).unwrap();
        assert_eq!(amount_to_db(&amount), "1200000000000000000000");
        assert_eq!(parse_amount(&amount_to_db(&amount), "t").unwrap(), amount);
    }

    #[test]
    fn bad_status_code_is_a_parse_error() {
        assert!(parse_status(998).is_err());
        assert!(parse_status(999).is_ok());
    }
}
