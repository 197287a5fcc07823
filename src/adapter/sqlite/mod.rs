//! SQLite-backed record store using Diesel ORM.

pub mod auction_store;
pub mod connection;
pub mod model;
pub mod order_store;
pub mod schema;

pub use auction_store::SqliteAuctionStore;
pub use connection::{create_pool, run_migrations, DbPool};
pub use order_store::SqliteOrderStore;
