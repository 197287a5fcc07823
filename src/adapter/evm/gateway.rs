//! Read-only JSON-RPC gateway to the settlement and token contracts.
//!
//! Every method opens a fresh HTTP provider for the call; there is no
//! session state to keep. Reverts carry the contract's reason string back
//! to the caller, transport failures stay retryable.

use alloy_primitives::{Address, U256};
use alloy_provider::ProviderBuilder;
use alloy_sol_types::sol;
use async_trait::async_trait;
use tracing::debug;

use crate::domain::{FormattedOrder, SignatureParts, Status};
use crate::error::{code, Error, MarketError, Result};
use crate::port::LedgerGateway;

sol! {
    #[sol(rpc)]
    contract IExchange {
        struct Order {
            address account;
            uint8 side;
            address commodity;
            uint256[] tokenIds;
            address currency;
            uint256 amount;
            uint64 expiry;
            uint32 nonce;
        }

        struct Sig {
            uint8 v;
            bytes32 r;
            bytes32 s;
        }

        function checkOrder(Order calldata order) external view;
        function checkSignature(Order calldata order, Sig calldata sig) external view;
        function hashOrder(Order calldata order) external view returns (bytes32);
        function orderStates(bytes32 orderHash) external view returns (uint256);
    }

    #[sol(rpc)]
    contract IERC721 {
        function ownerOf(uint256 tokenId) external view returns (address);
        function getApproved(uint256 tokenId) external view returns (address);
        function isApprovedForAll(address owner, address operator) external view returns (bool);
        function getTokenType(uint256 tokenId) external view returns (uint256);
    }

    #[sol(rpc)]
    contract IERC20 {
        function balanceOf(address account) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
    }
}

/// Ledger gateway backed by an EVM JSON-RPC endpoint.
pub struct EvmLedgerGateway {
    rpc_url: url::Url,
    /// Settlement contract address; also the approval spender for tokens.
    exchange: Address,
}

impl EvmLedgerGateway {
    #[must_use]
    pub fn new(rpc_url: url::Url, exchange: Address) -> Self {
        Self { rpc_url, exchange }
    }

    fn provider(&self) -> impl alloy_provider::Provider + Clone {
        ProviderBuilder::new().connect_http(self.rpc_url.clone())
    }
}

fn to_contract_order(order: &FormattedOrder) -> IExchange::Order {
    IExchange::Order {
        account: order.account,
        side: order.side.code(),
        commodity: order.commodity,
        tokenIds: order.token_ids.iter().map(|id| U256::from(*id)).collect(),
        currency: order.currency,
        amount: order.amount,
        expiry: order.expiry,
        nonce: order.nonce,
    }
}

/// Whether a call failure is the contract declining (revert / no data), as
/// opposed to the transport failing.
fn is_revert(text: &str) -> bool {
    text.contains("execution reverted") || text.contains("revert")
}

/// Map a contract call failure: reverts become [`MarketError::ContractRejected`]
/// with the contract's reason, anything else stays a transport error.
fn contract_error(err: alloy_contract::Error, prefix: &str) -> Error {
    let text = err.to_string();
    if is_revert(&text) {
        let reason = text
            .split("execution reverted")
            .nth(1)
            .map(|tail| tail.trim_start_matches([':', ' ']).trim_matches('"').trim())
            .filter(|tail| !tail.is_empty())
            .unwrap_or("execution reverted")
            .to_string();
        MarketError::ContractRejected {
            reason: format!("{prefix}{reason}"),
            code: code::CONTRACT_ERROR,
        }
        .into()
    } else {
        Error::Rpc(text)
    }
}

#[async_trait]
impl LedgerGateway for EvmLedgerGateway {
    async fn check_order(&self, order: &FormattedOrder) -> Result<()> {
        let provider = self.provider();
        let exchange = IExchange::new(self.exchange, &provider);

        debug!(account = %order.account, nonce = order.nonce, "Checking order on contract");
        exchange
            .checkOrder(to_contract_order(order))
            .call()
            .await
            .map_err(|e| contract_error(e, ""))?;
        Ok(())
    }

    async fn check_signature(&self, order: &FormattedOrder, sig: &SignatureParts) -> Result<()> {
        let provider = self.provider();
        let exchange = IExchange::new(self.exchange, &provider);

        exchange
            .checkSignature(
                to_contract_order(order),
                IExchange::Sig {
                    v: sig.v,
                    r: sig.r,
                    s: sig.s,
                },
            )
            .call()
            .await
            .map_err(|e| contract_error(e, "Signature: "))?;
        Ok(())
    }

    async fn order_status(&self, order: &FormattedOrder) -> Result<Status> {
        let provider = self.provider();
        let exchange = IExchange::new(self.exchange, &provider);

        let hash = exchange
            .hashOrder(to_contract_order(order))
            .call()
            .await
            .map_err(|e| contract_error(e, ""))?;
        let raw = exchange
            .orderStates(hash)
            .call()
            .await
            .map_err(|e| contract_error(e, ""))?;

        let code = u32::try_from(raw).map_err(|_| Error::Parse(format!("order state: {raw}")))?;
        Status::from_code(code).ok_or_else(|| Error::Parse(format!("order state: {code}")))
    }

    async fn token_type(&self, commodity: Address, token_id: u64) -> Result<Option<u32>> {
        let provider = self.provider();
        let nft = IERC721::new(commodity, &provider);

        // The probe is optional on token contracts: a revert or empty return
        // means this commodity does not classify its tokens.
        match nft.getTokenType(U256::from(token_id)).call().await {
            Ok(raw) => {
                let value =
                    u32::try_from(raw).map_err(|_| Error::Parse(format!("token type: {raw}")))?;
                Ok(Some(value))
            }
            Err(err) => {
                let text = err.to_string();
                if is_revert(&text) || matches!(err, alloy_contract::Error::AbiError(_)) {
                    debug!(%commodity, token_id, "Commodity has no token type");
                    Ok(None)
                } else {
                    Err(Error::Rpc(text))
                }
            }
        }
    }

    async fn owner_of(&self, commodity: Address, token_id: u64) -> Result<Address> {
        let provider = self.provider();
        let nft = IERC721::new(commodity, &provider);

        nft.ownerOf(U256::from(token_id))
            .call()
            .await
            .map_err(|e| contract_error(e, ""))
    }

    async fn is_approved(&self, commodity: Address, token_id: u64, owner: Address) -> Result<bool> {
        let provider = self.provider();
        let nft = IERC721::new(commodity, &provider);

        // Operator approval is optional on older contracts; treat a failing
        // call as "not approved for all" and fall through to the per-token
        // check.
        let approved_all = nft
            .isApprovedForAll(owner, self.exchange)
            .call()
            .await
            .unwrap_or(false);
        if approved_all {
            return Ok(true);
        }

        let approved = nft
            .getApproved(U256::from(token_id))
            .call()
            .await
            .map_err(|e| contract_error(e, ""))?;
        Ok(approved == self.exchange)
    }

    async fn balance_of(&self, currency: Address, account: Address) -> Result<U256> {
        let provider = self.provider();
        let token = IERC20::new(currency, &provider);

        token
            .balanceOf(account)
            .call()
            .await
            .map_err(|e| contract_error(e, ""))
    }

    async fn allowance(&self, currency: Address, owner: Address) -> Result<U256> {
        let provider = self.provider();
        let token = IERC20::new(currency, &provider);

        token
            .allowance(owner, self.exchange)
            .call()
            .await
            .map_err(|e| contract_error(e, ""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Side;

    #[test]
    fn formatted_order_maps_to_contract_struct() {
        let order = FormattedOrder {
            account: Address::repeat_byte(0x11),
            side: Side::Sell,
            commodity: Address::repeat_byte(0x22),
            token_ids: vec![109],
            currency: Address::repeat_byte(0x33),
            amount: U256::from(1200u64),
            expiry: 1_700_000_000,
            nonce: 100,
        };

        let mapped = to_contract_order(&order);
        assert_eq!(mapped.side, 1);
        assert_eq!(mapped.tokenIds, vec![U256::from(109u64)]);
        assert_eq!(mapped.expiry, 1_700_000_000);
        assert_eq!(mapped.nonce, 100);
    }

    #[test]
    fn revert_detection() {
        assert!(is_revert("server returned an error response: execution reverted: Order expired"));
        assert!(!is_revert("error sending request for url"));
    }
}
