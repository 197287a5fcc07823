use alloy_primitives::U256;
use thiserror::Error;

/// Stable numeric error codes surfaced to API clients.
///
/// Kept identical across releases so wallets and frontends can branch on
/// them without parsing messages.
pub mod code {
    pub const OTHER: u32 = 9999;

    pub const DB_ERROR: u32 = 2000;
    pub const CONTRACT_ERROR: u32 = 3000;

    pub const CONTRACT_NOT_OWNER_NFT: u32 = 3021;
    pub const CONTRACT_NOT_ALLOWED_NFT: u32 = 3023;
    pub const CONTRACT_NOT_ALLOWED_ERC20: u32 = 3024;

    pub const CONTRACT_INSUFFICIENT_ERC20: u32 = 3031;
}

/// User-caused failures of market operations.
///
/// Every variant maps to a 4xx response; none of them are retried.
#[derive(Error, Debug)]
pub enum MarketError {
    #[error("{message}")]
    Validation { message: String },

    #[error("Duplicated data")]
    Duplicate { existing_id: i64 },

    #[error("{kind} not found")]
    NotFound { kind: &'static str },

    #[error("{kind} already signed")]
    AlreadySigned { kind: &'static str },

    #[error("{kind} status changed")]
    StatusChanged { kind: &'static str },

    #[error("Low amount (exist greater bid)")]
    BidTooLow { min_bid: U256 },

    /// The settlement contract (or a token contract) declined the request.
    #[error("{reason}")]
    ContractRejected { reason: String, code: u32 },
}

impl MarketError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Machine-readable code carried alongside the message.
    pub fn code(&self) -> u32 {
        match self {
            Self::Duplicate { .. } => code::DB_ERROR,
            Self::ContractRejected { code, .. } => *code,
            _ => code::OTHER,
        }
    }

    /// HTTP-equivalent status for the presentation layer.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            _ => 400,
        }
    }
}

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Market(#[from] MarketError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("database error: {0}")]
    Database(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("ledger RPC error: {0}")]
    Rpc(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
}

impl Error {
    /// Infrastructure failures worth an immediate retry; user errors are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::Connection(_) | Self::Rpc(_)
        )
    }
}

impl From<diesel::result::Error> for Error {
    fn from(err: diesel::result::Error) -> Self {
        Error::Database(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_404() {
        let err = MarketError::NotFound { kind: "Order" };
        assert_eq!(err.http_status(), 404);
        assert_eq!(err.to_string(), "Order not found");
    }

    #[test]
    fn duplicate_carries_db_code() {
        let err = MarketError::Duplicate { existing_id: 7 };
        assert_eq!(err.http_status(), 400);
        assert_eq!(err.code(), code::DB_ERROR);
    }

    #[test]
    fn contract_rejection_keeps_its_code() {
        let err = MarketError::ContractRejected {
            reason: "Not owner of NFT".into(),
            code: code::CONTRACT_NOT_OWNER_NFT,
        };
        assert_eq!(err.code(), code::CONTRACT_NOT_OWNER_NFT);
        assert_eq!(err.to_string(), "Not owner of NFT");
    }

    #[test]
    fn transient_classification() {
        assert!(Error::Rpc("timeout".into()).is_transient());
        assert!(Error::Database("locked".into()).is_transient());
        assert!(!Error::Market(MarketError::validation("bad")).is_transient());
    }
}
