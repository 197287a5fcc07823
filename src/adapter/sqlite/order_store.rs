//! SQLite order store.
//!
//! Implements [`OrderStore`] for the orders collection and [`StatusSource`]
//! for the reconciliation loop. The identity-tuple dedup and the due-record
//! claim both run inside immediate transactions, which is the only
//! concurrency control the rest of the system relies on.

use alloy_primitives::{B256, U256};
use async_trait::async_trait;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, PooledConnection};

use super::connection::{configure_sqlite_connection, DbPool, LastInsertRowId};
use super::model::{address_to_db, amount_to_db, tx_to_db, NewOrderRow, OrderRow};
use super::schema::orders;
use crate::domain::{
    now_ms, Order, Status, DEFAULT_ORDER_NONCE, MAX_LIST_LIMIT, STATUS_CHECK_PERIOD_MS,
};
use crate::error::{Error, MarketError, Result};
use crate::port::store::{DueRecord, NewOrder, OrderFilter, OrderStore, Page, StatusSource};

/// SQLite-backed order store.
pub struct SqliteOrderStore {
    pool: DbPool,
}

impl SqliteOrderStore {
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
impl OrderStore for SqliteOrderStore {
    async fn insert(&self, new: NewOrder) -> Result<Order> {
        let now = now_ms();
        let mut conn = self.conn()?;

        let row = conn.immediate_transaction::<OrderRow, Error, _>(|conn| {
            let account = address_to_db(new.account);
            let commodity = address_to_db(new.commodity);
            let currency = address_to_db(new.currency);
            let amount = amount_to_db(&new.amount);
            let side = i32::from(new.side.code());

            // Highest-nonce order with the same identity tuple decides
            // whether this is a duplicate or a resubmission.
            let dup: Option<OrderRow> = orders::table
                .filter(orders::account.eq(&account))
                .filter(orders::side.eq(side))
                .filter(orders::commodity.eq(&commodity))
                .filter(orders::token_id.eq(new.token_id as i64))
                .filter(orders::currency.eq(&currency))
                .filter(orders::amount.eq(&amount))
                .order(orders::nonce.desc())
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
                None => DEFAULT_ORDER_NONCE as i32,
            };

            diesel::insert_into(orders::table)
                .values(&NewOrderRow {
                    account,
                    side,
                    commodity,
                    token_id: new.token_id as i64,
                    token_type: new.token_type.map(|t| t as i32),
                    currency,
                    amount,
                    expiry: new.expiry,
                    nonce,
                    auction_id: new.auction_id,
                    created: now,
                    next_check: now + STATUS_CHECK_PERIOD_MS,
                })
                .execute(conn)?;

            let id = diesel::sql_query("SELECT last_insert_rowid() AS id")
                .get_result::<LastInsertRowId>(conn)
                .map(|row| row.id)?;

            orders::table.find(id).first(conn).map_err(Error::from)
        })?;

        row.try_into()
    }

    async fn get(&self, id: i64) -> Result<Option<Order>> {
        let mut conn = self.conn()?;
        let row: Option<OrderRow> = orders::table.find(id).first(&mut conn).optional()?;
        row.map(TryInto::try_into).transpose()
    }

    async fn set_sign(&self, id: i64, sign: &str) -> Result<()> {
        let mut conn = self.conn()?;
        diesel::update(orders::table.find(id))
            .set(orders::sign.eq(sign))
            .execute(&mut conn)?;
        Ok(())
    }

    async fn reduce(&self, id: i64, amount: &U256, sign: &str) -> Result<()> {
        let mut conn = self.conn()?;
        diesel::update(orders::table.find(id))
            .set((
                orders::amount.eq(amount_to_db(amount)),
                orders::sign.eq(sign),
            ))
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
                diesel::update(orders::table.find(id))
                    .set((
                        orders::status.eq(status.code() as i32),
                        orders::status_tx.eq(tx_to_db(tx)),
                        orders::next_check.eq(next_check),
                    ))
                    .execute(&mut conn)?;
            }
            None => {
                diesel::update(orders::table.find(id))
                    .set((
                        orders::status.eq(status.code() as i32),
                        orders::next_check.eq(next_check),
                    ))
                    .execute(&mut conn)?;
            }
        }
        Ok(())
    }

    async fn mark_failed(&self, id: i64, reason: &str, status: Status) -> Result<()> {
        let mut conn = self.conn()?;
        diesel::update(orders::table.find(id))
            .set((
                orders::status.eq(status.code() as i32),
                orders::status_reason.eq(reason),
                orders::next_check.eq(0i64),
            ))
            .execute(&mut conn)?;
        Ok(())
    }

    async fn fail_auction_bids(
        &self,
        auction_id: i64,
        reason: &str,
        status: Status,
    ) -> Result<usize> {
        let mut conn = self.conn()?;
        let affected = diesel::update(
            orders::table
                .filter(orders::auction_id.eq(auction_id))
                .filter(orders::status.eq(Status::None.code() as i32)),
        )
        .set((
            orders::status.eq(status.code() as i32),
            orders::status_reason.eq(reason),
            orders::next_check.eq(0i64),
        ))
        .execute(&mut conn)?;
        Ok(affected)
    }

    async fn last_open_bid(&self, auction_id: i64) -> Result<Option<Order>> {
        let mut conn = self.conn()?;
        let row: Option<OrderRow> = orders::table
            .filter(orders::auction_id.eq(auction_id))
            .filter(orders::status.eq(Status::None.code() as i32))
            .order(orders::id.desc())
            .first(&mut conn)
            .optional()?;
        row.map(TryInto::try_into).transpose()
    }

    async fn list(&self, filter: &OrderFilter, page: &Page) -> Result<Vec<Order>> {
        let mut conn = self.conn()?;
        let mut query = orders::table.into_boxed();

        if let Some(side) = filter.side {
            query = query.filter(orders::side.eq(i32::from(side.code())));
        }
        if let Some(account) = filter.account {
            query = query.filter(orders::account.eq(address_to_db(account)));
        }
        if !filter.commodity.is_empty() {
            let values: Vec<String> = filter.commodity.iter().copied().map(address_to_db).collect();
            query = query.filter(orders::commodity.eq_any(values));
        }
        if !filter.currency.is_empty() {
            let values: Vec<String> = filter.currency.iter().copied().map(address_to_db).collect();
            query = query.filter(orders::currency.eq_any(values));
        }
        if !filter.token_ids.is_empty() {
            let ids: Vec<i64> = filter.token_ids.iter().map(|t| *t as i64).collect();
            query = query.filter(orders::token_id.eq_any(ids));
        }
        if let Some(status) = filter.status {
            query = query.filter(orders::status.eq(status.code() as i32));
        }
        match filter.signed {
            Some(true) => query = query.filter(orders::sign.is_not_null()),
            Some(false) => query = query.filter(orders::sign.is_null()),
            None => {}
        }
        match filter.is_bid {
            Some(true) => query = query.filter(orders::auction_id.is_not_null()),
            Some(false) => query = query.filter(orders::auction_id.is_null()),
            None => {}
        }
        if let Some(auction_id) = filter.auction_id {
            query = query.filter(orders::auction_id.eq(auction_id));
        }

        query = if page.newest_first {
            query.order(orders::id.desc())
        } else {
            query.order(orders::id.asc())
        };
        if let Some(skip) = page.skip {
            query = query.offset(skip);
        }
        // SQLite treats a negative LIMIT as unlimited, so clamp from below
        // as well.
        let limit = page.limit.unwrap_or(MAX_LIST_LIMIT).clamp(0, MAX_LIST_LIMIT);
        query = query.limit(limit);

        let rows: Vec<OrderRow> = query.load(&mut conn)?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[async_trait]
impl StatusSource for SqliteOrderStore {
    async fn claim_due(&self, now: i64, reschedule_to: i64) -> Result<Option<DueRecord>> {
        let mut conn = self.conn()?;

        let row = conn.immediate_transaction::<Option<OrderRow>, Error, _>(|conn| {
            let row: Option<OrderRow> = orders::table
                .filter(orders::next_check.gt(0))
                .filter(orders::next_check.le(now))
                .order(orders::next_check.asc())
                .first(conn)
                .optional()?;

            let Some(row) = row else {
                return Ok(None);
            };

            diesel::update(orders::table.find(row.id))
                .set(orders::next_check.eq(reschedule_to))
                .execute(conn)?;

            Ok(Some(row))
        })?;

        let Some(row) = row else {
            return Ok(None);
        };
        let order: Order = row.try_into()?;
        Ok(Some(DueRecord {
            id: order.id,
            status: order.status,
            order: order.formatted(),
        }))
    }

    async fn settle(&self, id: i64, status: Status) -> Result<()> {
        OrderStore::set_status(self, id, status, None, 0).await
    }
}
