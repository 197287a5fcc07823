//! Status reconciliation loop.
//!
//! One reconciler per entity kind polls its [`StatusSource`] for due
//! records, reads the authoritative status from the ledger and settles the
//! record on mismatch. The claim itself bumps `next_check`, so a record
//! lost to a crashed tick resurfaces after the re-check period.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::domain::{now_ms, FormattedOrder, Status};
use crate::error::Result;
use crate::port::{LedgerGateway, StatusSource};

/// Loop timing knobs; defaults mirror production cadence.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Delay between successful ticks.
    pub interval: Duration,
    /// Backoff after a failed tick.
    pub retry_delay: Duration,
    /// How far a claim pushes `next_check` forward.
    pub recheck_period: Duration,
    /// Immediate in-tick retries of a transient ledger read failure.
    pub max_retries: u32,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15),
            retry_delay: Duration::from_secs(30),
            recheck_period: Duration::from_secs(180),
            max_retries: 3,
        }
    }
}

/// What a single tick did, for observability and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    pub id: i64,
    pub before: Status,
    pub after: Status,
}

/// Polls one [`StatusSource`] and converges claimed records to ledger truth.
pub struct Reconciler {
    name: &'static str,
    source: Arc<dyn StatusSource>,
    ledger: Arc<dyn LedgerGateway>,
    config: ReconcilerConfig,
}

impl Reconciler {
    pub fn new(
        name: &'static str,
        source: Arc<dyn StatusSource>,
        ledger: Arc<dyn LedgerGateway>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            name,
            source,
            ledger,
            config,
        }
    }

    /// Claim and reconcile at most one due record.
    ///
    /// Returns `None` when nothing was due. A NONE/NONE agreement leaves the
    /// claim's `next_check` bump in place, so the record is simply polled
    /// again after the re-check period.
    pub async fn tick(&self) -> Result<Option<TickOutcome>> {
        let now = now_ms();
        let reschedule_to = now + self.config.recheck_period.as_millis() as i64;

        let Some(due) = self.source.claim_due(now, reschedule_to).await? else {
            debug!(source = self.name, "No records due");
            return Ok(None);
        };

        debug!(source = self.name, id = due.id, "Checking status");
        let status = self.read_status(&due.order).await?;

        let outcome = TickOutcome {
            id: due.id,
            before: due.status,
            after: status,
        };

        if status == Status::None && due.status == Status::None {
            return Ok(Some(outcome));
        }

        self.source.settle(due.id, status).await?;
        if due.status != status {
            info!(
                source = self.name,
                id = due.id,
                before = %due.status,
                after = %status,
                "Status changed"
            );
        }

        Ok(Some(outcome))
    }

    /// Ledger read with bounded immediate retries of transient failures.
    async fn read_status(&self, order: &FormattedOrder) -> Result<Status> {
        let mut attempt = 0;
        loop {
            match self.ledger.order_status(order).await {
                Ok(status) => return Ok(status),
                Err(err) if err.is_transient() && attempt < self.config.max_retries => {
                    attempt += 1;
                    warn!(
                        source = self.name,
                        attempt,
                        error = %err,
                        "Status read failed, retrying"
                    );
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Run forever. Errors are logged and backed off, never propagated; the
    /// claimed record's bumped `next_check` guarantees it is retried.
    pub async fn run(&self) {
        info!(
            source = self.name,
            interval = ?self.config.interval,
            "Reconciler started"
        );

        loop {
            match self.tick().await {
                Ok(_) => sleep(self.config.interval).await,
                Err(err) => {
                    warn!(source = self.name, error = %err, "Tick failed");
                    sleep(self.config.retry_delay).await;
                }
            }
        }
    }
}
