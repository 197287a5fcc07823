//! Process wiring: configuration to running reconcilers.

use std::sync::Arc;

use tracing::info;

use crate::adapter::evm::EvmLedgerGateway;
use crate::adapter::sqlite::{create_pool, run_migrations, SqliteAuctionStore, SqliteOrderStore};
use crate::config::Config;
use crate::error::Result;
use crate::port::{LedgerGateway, StatusSource};
use crate::service::Reconciler;

pub struct App;

impl App {
    /// Build the stores and gateway from config and run both reconciliation
    /// loops until the process is stopped.
    pub async fn run(config: Config) -> Result<()> {
        let pool = create_pool(&config.store.database_url)?;
        run_migrations(&pool)?;
        info!(database = %config.store.database_url, "Store ready");

        let rpc_url = config.rpc_url()?;
        let exchange = config.exchange_address()?;
        info!(rpc = %rpc_url, exchange = %exchange, "Ledger gateway ready");

        let ledger: Arc<dyn LedgerGateway> =
            Arc::new(EvmLedgerGateway::new(rpc_url, exchange));
        let orders: Arc<dyn StatusSource> = Arc::new(SqliteOrderStore::new(pool.clone()));
        let auctions: Arc<dyn StatusSource> = Arc::new(SqliteAuctionStore::new(pool));

        let order_loop = Reconciler::new(
            "orders",
            orders,
            ledger.clone(),
            config.reconcile.for_orders(),
        );
        let auction_loop = Reconciler::new(
            "auctions",
            auctions,
            ledger,
            config.reconcile.for_auctions(),
        );

        tokio::join!(order_loop.run(), auction_loop.run());
        Ok(())
    }
}
