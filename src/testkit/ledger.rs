//! Programmable in-memory [`LedgerGateway`] for tests.
//!
//! State is keyed the way the real contracts key it: order statuses by the
//! full order struct (stand-in for the content hash), ownership by
//! (commodity, token), balances and allowances by (currency, account).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::domain::{FormattedOrder, SignatureParts, Status};
use crate::error::{code, Error, MarketError, Result};
use crate::port::LedgerGateway;

#[derive(Default)]
struct LedgerState {
    /// Order status by order content; absent means NONE.
    statuses: HashMap<FormattedOrder, Status>,
    /// Token owner by (commodity, token_id).
    owners: HashMap<(Address, u64), Address>,
    /// Per-token approvals granted to the exchange.
    approvals: HashSet<(Address, u64)>,
    /// Operator approvals granted to the exchange, by (commodity, owner).
    operators: HashSet<(Address, Address)>,
    /// Balances by (currency, account).
    balances: HashMap<(Address, Address), U256>,
    /// Exchange allowances by (currency, owner).
    allowances: HashMap<(Address, Address), U256>,
    /// Token type by (commodity, token_id); absent means unanswerable probe.
    token_types: HashMap<(Address, u64), u32>,
    /// When set, `check_order` reverts with this reason.
    reject_orders: Option<String>,
    /// When true, `check_signature` reverts.
    reject_signatures: bool,
    /// Remaining calls that fail with a transport error before recovering.
    rpc_failures: u32,
    /// Total ledger calls observed.
    calls: u64,
}

/// In-memory ledger with setter knobs for every scenario the service and the
/// reconciler can hit.
#[derive(Default, Clone)]
pub struct MockLedger {
    state: Arc<Mutex<LedgerState>>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&self, order: &FormattedOrder, status: Status) {
        self.state.lock().statuses.insert(order.clone(), status);
    }

    pub fn set_owner(&self, commodity: Address, token_id: u64, owner: Address) {
        self.state.lock().owners.insert((commodity, token_id), owner);
    }

    pub fn approve_token(&self, commodity: Address, token_id: u64) {
        self.state.lock().approvals.insert((commodity, token_id));
    }

    pub fn approve_operator(&self, commodity: Address, owner: Address) {
        self.state.lock().operators.insert((commodity, owner));
    }

    pub fn set_balance(&self, currency: Address, account: Address, amount: U256) {
        self.state.lock().balances.insert((currency, account), amount);
    }

    pub fn set_allowance(&self, currency: Address, owner: Address, amount: U256) {
        self.state.lock().allowances.insert((currency, owner), amount);
    }

    pub fn set_token_type(&self, commodity: Address, token_id: u64, token_type: u32) {
        self.state
            .lock()
            .token_types
            .insert((commodity, token_id), token_type);
    }

    /// Make `check_order` revert with the given reason until cleared.
    pub fn reject_orders(&self, reason: &str) {
        self.state.lock().reject_orders = Some(reason.to_string());
    }

    pub fn accept_orders(&self) {
        self.state.lock().reject_orders = None;
    }

    pub fn reject_signatures(&self, reject: bool) {
        self.state.lock().reject_signatures = reject;
    }

    /// Fail the next `n` calls with a transport error, then recover.
    pub fn fail_next_calls(&self, n: u32) {
        self.state.lock().rpc_failures = n;
    }

    pub fn call_count(&self) -> u64 {
        self.state.lock().calls
    }

    /// Grant an account everything a buy order of `amount` needs.
    pub fn fund(&self, currency: Address, account: Address, amount: U256) {
        let mut state = self.state.lock();
        state.balances.insert((currency, account), amount);
        state.allowances.insert((currency, account), amount);
    }

    /// Give an account a token plus the approval a sell order needs.
    pub fn grant_token(&self, commodity: Address, token_id: u64, owner: Address) {
        let mut state = self.state.lock();
        state.owners.insert((commodity, token_id), owner);
        state.approvals.insert((commodity, token_id));
    }

    fn enter(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.calls += 1;
        if state.rpc_failures > 0 {
            state.rpc_failures -= 1;
            return Err(Error::Rpc("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerGateway for MockLedger {
    async fn check_order(&self, _order: &FormattedOrder) -> Result<()> {
        self.enter()?;
        if let Some(reason) = self.state.lock().reject_orders.clone() {
            return Err(MarketError::ContractRejected {
                reason,
                code: code::CONTRACT_ERROR,
            }
            .into());
        }
        Ok(())
    }

    async fn check_signature(&self, _order: &FormattedOrder, _sig: &SignatureParts) -> Result<()> {
        self.enter()?;
        if self.state.lock().reject_signatures {
            return Err(MarketError::ContractRejected {
                reason: "Signature: invalid signature".into(),
                code: code::CONTRACT_ERROR,
            }
            .into());
        }
        Ok(())
    }

    async fn order_status(&self, order: &FormattedOrder) -> Result<Status> {
        self.enter()?;
        Ok(self
            .state
            .lock()
            .statuses
            .get(order)
            .copied()
            .unwrap_or(Status::None))
    }

    async fn token_type(&self, commodity: Address, token_id: u64) -> Result<Option<u32>> {
        self.enter()?;
        Ok(self
            .state
            .lock()
            .token_types
            .get(&(commodity, token_id))
            .copied())
    }

    async fn owner_of(&self, commodity: Address, token_id: u64) -> Result<Address> {
        self.enter()?;
        self.state
            .lock()
            .owners
            .get(&(commodity, token_id))
            .copied()
            .ok_or_else(|| {
                MarketError::ContractRejected {
                    reason: "ERC721: invalid token ID".into(),
                    code: code::CONTRACT_ERROR,
                }
                .into()
            })
    }

    async fn is_approved(&self, commodity: Address, token_id: u64, owner: Address) -> Result<bool> {
        self.enter()?;
        let state = self.state.lock();
        Ok(state.operators.contains(&(commodity, owner))
            || state.approvals.contains(&(commodity, token_id)))
    }

    async fn balance_of(&self, currency: Address, account: Address) -> Result<U256> {
        self.enter()?;
        Ok(self
            .state
            .lock()
            .balances
            .get(&(currency, account))
            .copied()
            .unwrap_or_default())
    }

    async fn allowance(&self, currency: Address, owner: Address) -> Result<U256> {
        self.enter()?;
        Ok(self
            .state
            .lock()
            .allowances
            .get(&(currency, owner))
            .copied()
            .unwrap_or_default())
    }
}
