//! Order records and the canonical ledger projection.

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

use super::status::{Side, Status};
use super::{DEFAULT_ORDER_NONCE, MS_PER_SEC};

/// Serialize a `U256` as its decimal string, matching the contract ABI's
/// string-encoded amounts on the wire.
pub mod u256_decimal {
    use alloy_primitives::U256;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let raw = String::deserialize(deserializer)?;
        U256::from_str_radix(&raw, 10).map_err(D::Error::custom)
    }
}

/// A standing offer to trade a currency amount for one commodity token.
///
/// Owned by the record store; the domain service is the only mutator, except
/// for the reconciliation loop which touches only `status`, `status_tx`,
/// `status_reason` and `next_check`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    pub id: i64,
    pub account: Address,
    pub side: Side,
    pub commodity: Address,
    pub token_id: u64,
    pub token_type: Option<u32>,
    pub currency: Address,
    #[serde(with = "u256_decimal")]
    pub amount: U256,
    /// Absolute expiry, unix milliseconds.
    pub expiry: i64,
    pub nonce: u32,
    /// Present when this order is a bid on an auction.
    pub auction_id: Option<i64>,
    pub sign: Option<String>,
    pub status: Status,
    pub status_tx: Option<B256>,
    pub status_reason: Option<String>,
    pub created: i64,
    /// Next reconciliation due-time (unix ms); 0 means settled.
    #[serde(skip)]
    pub next_check: i64,
}

impl Order {
    /// Canonical projection sent to the ledger for validation, signature
    /// checks and status hashing.
    pub fn formatted(&self) -> FormattedOrder {
        FormattedOrder {
            account: self.account,
            side: self.side,
            commodity: self.commodity,
            token_ids: vec![self.token_id],
            currency: self.currency,
            amount: self.amount,
            expiry: (self.expiry / MS_PER_SEC) as u64,
            nonce: self.nonce,
        }
    }
}

/// The order struct the settlement contract hashes and validates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattedOrder {
    pub account: Address,
    pub side: Side,
    pub commodity: Address,
    pub token_ids: Vec<u64>,
    pub currency: Address,
    #[serde(with = "u256_decimal")]
    pub amount: U256,
    /// Unix seconds, as the contract stores a `uint64` timestamp.
    pub expiry: u64,
    pub nonce: u32,
}

/// Unvalidated order submission as received from a client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderDraft {
    pub account: String,
    #[serde(default)]
    pub side: Side,
    pub commodity: String,
    pub token_id: u64,
    pub currency: String,
    /// Decimal string in the currency's smallest unit.
    pub amount: String,
    /// Unix milliseconds; defaults to now + 90 days when absent.
    #[serde(default)]
    pub expiry: Option<i64>,
}

/// Unvalidated bid submission for an existing auction.
#[derive(Debug, Clone, Deserialize)]
pub struct BidDraft {
    pub account: String,
    pub amount: String,
}

/// Fully validated order fields, ready to persist or to format for the
/// ledger. Produced only by the domain service's check pipeline.
#[derive(Debug, Clone)]
pub struct CheckedOrder {
    pub account: Address,
    pub side: Side,
    pub commodity: Address,
    pub token_id: u64,
    pub currency: Address,
    pub amount: U256,
    pub expiry: i64,
}

impl CheckedOrder {
    pub fn formatted(&self, nonce: u32) -> FormattedOrder {
        FormattedOrder {
            account: self.account,
            side: self.side,
            commodity: self.commodity,
            token_ids: vec![self.token_id],
            currency: self.currency,
            amount: self.amount,
            expiry: (self.expiry / MS_PER_SEC) as u64,
            nonce,
        }
    }
}

/// Default projection nonce for a not-yet-persisted order.
pub fn draft_nonce() -> u32 {
    DEFAULT_ORDER_NONCE
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn addr(n: u8) -> Address {
        Address::repeat_byte(n)
    }

    fn sample_order() -> Order {
        Order {
            id: 1,
            account: addr(0x11),
            side: Side::Sell,
            commodity: addr(0x22),
            token_id: 109,
            token_type: Some(1),
            currency: addr(0x33),
            amount: U256::from_str("1200000000000000000000").unwrap(),
            expiry: 1_700_000_000_000,
            nonce: 100,
            auction_id: None,
            sign: None,
            status: Status::None,
            status_tx: None,
            status_reason: None,
            created: 1_690_000_000_000,
            next_check: 1_690_000_180_000,
        }
    }

    #[test]
    fn formatted_converts_expiry_to_seconds() {
        let formatted = sample_order().formatted();
        assert_eq!(formatted.expiry, 1_700_000_000);
        assert_eq!(formatted.token_ids, vec![109]);
        assert_eq!(formatted.nonce, 100);
    }

    #[test]
    fn formatted_amount_serializes_as_decimal_string() {
        let json = serde_json::to_value(sample_order().formatted()).unwrap();
        assert_eq!(json["amount"], "1200000000000000000000");
        assert_eq!(json["expiry"], 1_700_000_000u64);
        assert_eq!(json["side"], 1);
    }

    #[test]
    fn formatted_round_trips_through_json() {
        let formatted = sample_order().formatted();
        let json = serde_json::to_string(&formatted).unwrap();
        let back: FormattedOrder = serde_json::from_str(&json).unwrap();
        assert_eq!(back, formatted);
    }
}
