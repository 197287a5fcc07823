//! Read-only gateway to the settlement contract and token contracts.

use alloy_primitives::{Address, U256};
use async_trait::async_trait;

use crate::domain::{FormattedOrder, SignatureParts, Status};
use crate::error::Result;

/// Validating proxy to the on-chain exchange.
///
/// All calls are reads; settlement happens on-chain outside this system and
/// is only observed. Contract reverts surface as
/// [`crate::error::MarketError::ContractRejected`]; transport failures as
/// [`crate::error::Error::Rpc`].
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Authoritative structural/business validation of an order.
    async fn check_order(&self, order: &FormattedOrder) -> Result<()>;

    /// Verify a typed signature over the order struct against its account.
    async fn check_signature(&self, order: &FormattedOrder, sig: &SignatureParts) -> Result<()>;

    /// Authoritative settlement state, derived from the order's content hash.
    async fn order_status(&self, order: &FormattedOrder) -> Result<Status>;

    /// Commodity token classification.
    ///
    /// Returns `None` when the commodity cannot answer the call (the probe
    /// is optional on token contracts); other failures are real errors.
    async fn token_type(&self, commodity: Address, token_id: u64) -> Result<Option<u32>>;

    /// Current owner of a commodity token (sell-side capability check).
    async fn owner_of(&self, commodity: Address, token_id: u64) -> Result<Address>;

    /// Whether the exchange may move the token, via per-token approval or
    /// operator approval (sell-side capability check).
    async fn is_approved(&self, commodity: Address, token_id: u64, owner: Address) -> Result<bool>;

    /// Currency balance of an account (buy-side capability check).
    async fn balance_of(&self, currency: Address, account: Address) -> Result<U256>;

    /// Currency allowance granted by `owner` to the exchange (buy-side
    /// capability check).
    async fn allowance(&self, currency: Address, owner: Address) -> Result<U256>;
}
