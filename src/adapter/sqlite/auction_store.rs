//! SQLite auction store.
//!
//! Mirrors the order store for the auctions collection: identity-tuple
//! dedup on (account, commodity, token_id, currency), atomic due-record
//! claims, and the auction's order-shaped projection for the loop.

use alloy_primitives::B256;
use async_trait::async_trait;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, PooledConnection};

use super::connection::{configure_sqlite_connection, DbPool, LastInsertRowId};
use super::model::{address_to_db, amount_to_db, tx_to_db, AuctionRow, NewAuctionRow};
use super::schema::auctions;
use crate::domain::{now_ms, Auction, Status, AUCTION_CHECK_PERIOD_MS, MAX_LIST_LIMIT};
use crate::error::{Error, MarketError, Result};
use crate::port::store::{AuctionFilter, AuctionStore, DueRecord, NewAuction, Page, StatusSource};

/// SQLite-backed auction store.
pub struct SqliteAuctionStore {
    pool: DbPool,
}

impl SqliteAuctionStore {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> Result<PooledConnection<ConnectionManager<SqliteConnection>>> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        configure_sqlite_connection(&mut conn)?;
        Ok(conn)
    }
}

#[async_trait]
impl AuctionStore for SqliteAuctionStore {
    async fn insert(&self, new: NewAuction) -> Result<Auction> {
        let now = now_ms();
        let mut conn = self.conn()?;

        let row = conn.immediate_transaction::<AuctionRow, Error, _>(|conn| {
            let account = address_to_db(new.account);
            let commodity = address_to_db(new.commodity);
            let currency = address_to_db(new.currency);

            let dup: Option<AuctionRow> = auctions::table
                .filter(auctions::account.eq(&account))
                .filter(auctions::commodity.eq(&commodity))
                .filter(auctions::token_id.eq(new.token_id as i64))
                .filter(auctions::currency.eq(&currency))
                .order(auctions::nonce.desc())
                .first(conn)
                .optional()?;

            let nonce = match dup {
                Some(dup) if dup.next_check > 0 => {
                    return Err(MarketError::Duplicate {
                        existing_id: dup.id,
                    }
                    .into());
                }
                Some(dup) => dup.nonce + 1,
                None => 0,
            };

            diesel::insert_into(auctions::table)
                .values(&NewAuctionRow {
                    account,
                    commodity,
                    token_id: new.token_id as i64,
                    token_type: new.token_type.map(|t| t as i32),
                    currency,
                    min_amount: amount_to_db(&new.min_amount),
                    expiry: new.expiry,
                    nonce,
                    active: 0,
                    created: now,
                    next_check: now + AUCTION_CHECK_PERIOD_MS,
                })
                .execute(conn)?;

            let id = diesel::sql_query("SELECT last_insert_rowid() AS id")
                .get_result::<LastInsertRowId>(conn)
                .map(|row| row.id)?;

            auctions::table.find(id).first(conn).map_err(Error::from)
        })?;

        row.try_into()
    }

    async fn get(&self, id: i64) -> Result<Option<Auction>> {
        let mut conn = self.conn()?;
        let row: Option<AuctionRow> = auctions::table.find(id).first(&mut conn).optional()?;
        row.map(TryInto::try_into).transpose()
    }

    async fn activate(&self, id: i64) -> Result<()> {
        let mut conn = self.conn()?;
        diesel::update(auctions::table.find(id))
            .set(auctions::active.eq(1))
            .execute(&mut conn)?;
        Ok(())
    }

    async fn set_status(
        &self,
        id: i64,
        status: Status,
        tx: Option<B256>,
        next_check: i64,
    ) -> Result<()> {
        let mut conn = self.conn()?;
        match tx {
            Some(tx) => {
                diesel::update(auctions::table.find(id))
                    .set((
                        auctions::status.eq(status.code() as i32),
                        auctions::status_tx.eq(tx_to_db(tx)),
                        auctions::next_check.eq(next_check),
                    ))
                    .execute(&mut conn)?;
            }
            None => {
                diesel::update(auctions::table.find(id))
                    .set((
                        auctions::status.eq(status.code() as i32),
                        auctions::next_check.eq(next_check),
                    ))
                    .execute(&mut conn)?;
            }
        }
        Ok(())
    }

    async fn mark_failed(&self, id: i64, reason: &str, status: Status) -> Result<()> {
        let mut conn = self.conn()?;
        diesel::update(auctions::table.find(id))
            .set((
                auctions::status.eq(status.code() as i32),
                auctions::status_reason.eq(reason),
                auctions::next_check.eq(0i64),
            ))
            .execute(&mut conn)?;
        Ok(())
    }

    async fn list(&self, filter: &AuctionFilter, page: &Page) -> Result<Vec<Auction>> {
        let mut conn = self.conn()?;
        let mut query = auctions::table.into_boxed();

        if let Some(account) = filter.account {
            query = query.filter(auctions::account.eq(address_to_db(account)));
        }
        if !filter.commodity.is_empty() {
            let values: Vec<String> = filter.commodity.iter().copied().map(address_to_db).collect();
            query = query.filter(auctions::commodity.eq_any(values));
        }
        if !filter.currency.is_empty() {
            let values: Vec<String> = filter.currency.iter().copied().map(address_to_db).collect();
            query = query.filter(auctions::currency.eq_any(values));
        }
        if !filter.token_ids.is_empty() {
            let ids: Vec<i64> = filter.token_ids.iter().map(|t| *t as i64).collect();
            query = query.filter(auctions::token_id.eq_any(ids));
        }
        if let Some(status) = filter.status {
            query = query.filter(auctions::status.eq(status.code() as i32));
        }
        if let Some(active) = filter.active {
            query = query.filter(auctions::active.eq(i32::from(active)));
        }
        if let Some(after) = filter.expires_after {
            query = query.filter(auctions::expiry.gt(after));
        }

        query = if page.newest_first {
            query.order(auctions::id.desc())
        } else {
            query.order(auctions::id.asc())
        };
        if let Some(skip) = page.skip {
            query = query.offset(skip);
        }
        // SQLite treats a negative LIMIT as unlimited, so clamp from below
        // as well.
        let limit = page.limit.unwrap_or(MAX_LIST_LIMIT).clamp(0, MAX_LIST_LIMIT);
        query = query.limit(limit);

        let rows: Vec<AuctionRow> = query.load(&mut conn)?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[async_trait]
impl StatusSource for SqliteAuctionStore {
    async fn claim_due(&self, now: i64, reschedule_to: i64) -> Result<Option<DueRecord>> {
        let mut conn = self.conn()?;

        let row = conn.immediate_transaction::<Option<AuctionRow>, Error, _>(|conn| {
            let row: Option<AuctionRow> = auctions::table
                .filter(auctions::next_check.gt(0))
                .filter(auctions::next_check.le(now))
                .order(auctions::next_check.asc())
                .first(conn)
                .optional()?;

            let Some(row) = row else {
                return Ok(None);
            };

            diesel::update(auctions::table.find(row.id))
                .set(auctions::next_check.eq(reschedule_to))
                .execute(conn)?;

            Ok(Some(row))
        })?;

        let Some(row) = row else {
            return Ok(None);
        };
        let auction: Auction = row.try_into()?;
        Ok(Some(DueRecord {
            id: auction.id,
            status: auction.status,
            order: auction.formatted(),
        }))
    }

    async fn settle(&self, id: i64, status: Status) -> Result<()> {
        AuctionStore::set_status(self, id, status, None, 0).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::sqlite::connection::{create_pool, run_migrations};
    use alloy_primitives::{Address, U256};

    fn test_store() -> (SqliteAuctionStore, tempfile::NamedTempFile) {
        let db = tempfile::NamedTempFile::new().unwrap();
        let pool = create_pool(db.path().to_str().unwrap()).unwrap();
        run_migrations(&pool).unwrap();
        (SqliteAuctionStore::new(pool), db)
    }

    fn new_auction() -> NewAuction {
        NewAuction {
            account: Address::repeat_byte(0x11),
            commodity: Address::repeat_byte(0x22),
            token_id: 7,
            token_type: None,
            currency: Address::repeat_byte(0x33),
            min_amount: U256::from(100u64),
            expiry: now_ms() + 1_000_000,
        }
    }

    #[tokio::test]
    async fn first_auction_gets_nonce_zero() {
        let (store, _db) = test_store();
        let auction = store.insert(new_auction()).await.unwrap();
        assert_eq!(auction.nonce, 0);
        assert!(!auction.active);
    }

    #[tokio::test]
    async fn duplicate_tuple_rejected_until_settled() {
        let (store, _db) = test_store();
        let first = store.insert(new_auction()).await.unwrap();

        assert!(matches!(
            store.insert(new_auction()).await.unwrap_err(),
            Error::Market(MarketError::Duplicate { existing_id }) if existing_id == first.id
        ));

        store
            .mark_failed(first.id, "done", Status::Cancelled)
            .await
            .unwrap();
        let second = store.insert(new_auction()).await.unwrap();
        assert_eq!(second.nonce, 1);
    }

    #[tokio::test]
    async fn list_clamps_negative_limit() {
        let (store, _db) = test_store();
        store.insert(new_auction()).await.unwrap();

        let page = Page {
            limit: Some(-1),
            ..Page::default()
        };
        let found = store
            .list(&AuctionFilter::default(), &page)
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn claimed_auction_projects_its_order_shape() {
        let (store, _db) = test_store();
        let auction = store.insert(new_auction()).await.unwrap();
        let now = now_ms();
        AuctionStore::set_status(&store, auction.id, Status::None, None, now - 1)
            .await
            .unwrap();

        let due = store.claim_due(now, now + 60_000).await.unwrap().unwrap();
        assert_eq!(due.id, auction.id);
        assert_eq!(due.order, auction.formatted());
    }
}
