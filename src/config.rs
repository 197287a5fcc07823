//! Daemon configuration loading and validation.
//!
//! Configuration is loaded from a TOML file; the database URL can be
//! overridden through the `DATABASE_URL` environment variable.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use alloy_primitives::Address;
use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{ConfigError, Result};
use crate::service::ReconcilerConfig;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub network: NetworkConfig,
    pub market: MarketConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize)]
pub struct NetworkConfig {
    /// JSON-RPC endpoint of the chain carrying the settlement contract.
    pub rpc_url: String,
}

#[derive(Debug, Deserialize)]
pub struct MarketConfig {
    /// Settlement contract address.
    pub exchange: String,
}

#[derive(Debug, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
}

fn default_database_url() -> String {
    "tradepost.sqlite".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
        }
    }
}

/// Reconciliation loop timings, all in seconds.
#[derive(Debug, Deserialize)]
pub struct ReconcileConfig {
    #[serde(default = "default_order_interval_secs")]
    pub order_interval_secs: u64,
    #[serde(default = "default_auction_interval_secs")]
    pub auction_interval_secs: u64,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    #[serde(default = "default_recheck_period_secs")]
    pub recheck_period_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

const fn default_order_interval_secs() -> u64 {
    15
}

const fn default_auction_interval_secs() -> u64 {
    20
}

const fn default_retry_delay_secs() -> u64 {
    30
}

const fn default_recheck_period_secs() -> u64 {
    180
}

const fn default_max_retries() -> u32 {
    3
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            order_interval_secs: default_order_interval_secs(),
            auction_interval_secs: default_auction_interval_secs(),
            retry_delay_secs: default_retry_delay_secs(),
            recheck_period_secs: default_recheck_period_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl ReconcileConfig {
    /// Loop config for the order reconciler.
    pub fn for_orders(&self) -> ReconcilerConfig {
        self.with_interval(self.order_interval_secs)
    }

    /// Loop config for the auction reconciler.
    pub fn for_auctions(&self) -> ReconcilerConfig {
        self.with_interval(self.auction_interval_secs)
    }

    fn with_interval(&self, interval_secs: u64) -> ReconcilerConfig {
        ReconcilerConfig {
            interval: Duration::from_secs(interval_secs),
            retry_delay: Duration::from_secs(self.retry_delay_secs),
            recheck_period: Duration::from_secs(self.recheck_period_secs),
            max_retries: self.max_retries,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;

        let mut config: Self = toml::from_str(&content).map_err(ConfigError::Parse)?;

        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.store.database_url = url;
        }

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.network.rpc_url.is_empty() {
            return Err(ConfigError::MissingField { field: "rpc_url" }.into());
        }
        url::Url::parse(&self.network.rpc_url).map_err(|e| ConfigError::InvalidValue {
            field: "rpc_url",
            reason: e.to_string(),
        })?;

        if self.market.exchange.is_empty() {
            return Err(ConfigError::MissingField { field: "exchange" }.into());
        }
        Address::from_str(&self.market.exchange).map_err(|e| ConfigError::InvalidValue {
            field: "exchange",
            reason: e.to_string(),
        })?;

        if self.store.database_url.is_empty() {
            return Err(ConfigError::MissingField {
                field: "database_url",
            }
            .into());
        }

        Ok(())
    }

    /// Parsed RPC endpoint. Only valid after [`Config::load`].
    pub fn rpc_url(&self) -> Result<url::Url> {
        url::Url::parse(&self.network.rpc_url).map_err(Into::into)
    }

    /// Parsed settlement contract address. Only valid after [`Config::load`].
    pub fn exchange_address(&self) -> Result<Address> {
        Address::from_str(&self.market.exchange).map_err(|e| {
            ConfigError::InvalidValue {
                field: "exchange",
                reason: e.to_string(),
            }
            .into()
        })
    }

    pub fn init_logging(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.logging.level));

        match self.logging.format.as_str() {
            "json" => {
                fmt().json().with_env_filter(filter).init();
            }
            _ => {
                fmt().with_env_filter(filter).init();
            }
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: NetworkConfig {
                rpc_url: "http://127.0.0.1:8545".into(),
            },
            market: MarketConfig {
                exchange: String::new(),
            },
            store: StoreConfig::default(),
            reconcile: ReconcileConfig::default(),
            logging: LoggingConfig {
                level: "info".into(),
                format: "pretty".into(),
            },
        }
    }
}
