//! Hex signature parsing into the `{v, r, s}` triple the contract verifies.

use alloy_primitives::{hex, B256};

use crate::error::MarketError;

/// An ECDSA signature split for the contract's `checkSignature` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureParts {
    pub v: u8,
    pub r: B256,
    pub s: B256,
}

/// Minimum accepted length: `0x` + 65 hex-encoded bytes.
const MIN_SIGN_LEN: usize = 132;

/// Parse a client-supplied hex signature.
///
/// Accepts the standard 65-byte `r || s || v` layout; `v` is normalized to
/// 27/28. Only the format is validated here; cryptographic verification is
/// the ledger gateway's job.
pub fn parse_signature(sign: &str) -> Result<SignatureParts, MarketError> {
    if !sign.starts_with("0x") || sign.len() < MIN_SIGN_LEN {
        return Err(MarketError::validation("Invalid sign"));
    }

    let bytes = hex::decode(sign).map_err(|_| MarketError::validation("Invalid sign"))?;
    if bytes.len() < 65 {
        return Err(MarketError::validation("Invalid sign"));
    }

    let r = B256::from_slice(&bytes[0..32]);
    let s = B256::from_slice(&bytes[32..64]);
    let mut v = bytes[64];
    if v < 27 {
        v += 27;
    }

    Ok(SignatureParts { v, r, s })
}
