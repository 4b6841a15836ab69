//! Postgres-backed work queue.
//!
//! Rows are claimed with `FOR UPDATE SKIP LOCKED` and hidden for a
//! visibility timeout. A claim that is neither acked nor nacked before the
//! timeout becomes visible again, which gives broker-style redelivery after
//! a crash. Prefetch is enforced per process as an in-flight credit count.

use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::PgPool;
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::time::Duration;

use super::{Delivery, WorkQueue};
use crate::config::QueueConfig;
use crate::types::work::WorkItem;
use crate::utils::error::{Result, SwapIndexerError};

pub struct PgWorkQueue {
    pool: PgPool,
    name: String,
    visibility_timeout: Duration,
    poll_interval: Duration,
    prefetch: AtomicU16,
    in_flight: AtomicUsize,
}

/// Releases a reserved credit unless the claim succeeded.
struct Credit<'a> {
    in_flight: &'a AtomicUsize,
    armed: bool,
}

impl Credit<'_> {
    fn keep(mut self) {
        self.armed = false;
    }
}

impl Drop for Credit<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.in_flight.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

impl PgWorkQueue {
    #[must_use]
    pub fn new(pool: PgPool, config: &QueueConfig, prefetch: u16) -> Self {
        Self {
            pool,
            name: config.name.clone(),
            visibility_timeout: Duration::from_secs(config.visibility_timeout_secs),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            prefetch: AtomicU16::new(prefetch),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Creates the queue table.
    ///
    /// # Errors
    ///
    /// Fails when the schema cannot be created; fatal at startup.
    pub async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS swap_work_queue (
                id BIGSERIAL PRIMARY KEY,
                queue TEXT NOT NULL,
                payload BYTEA NOT NULL,
                delivery_count INTEGER NOT NULL DEFAULT 0,
                claimed_until TIMESTAMPTZ,
                enqueued_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_swap_work_queue_ready
            ON swap_work_queue(queue, id)
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn reserve_credit(&self) -> Option<Credit<'_>> {
        let limit = usize::from(self.prefetch.load(Ordering::Acquire));
        self.in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (limit == 0 || n < limit).then_some(n + 1)
            })
            .ok()
            .map(|_| Credit {
                in_flight: &self.in_flight,
                armed: true,
            })
    }

    fn release_credit(&self) {
        let _ = self
            .in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    async fn claim(&self) -> Result<Option<Delivery>> {
        let row = sqlx::query(
            r"
            UPDATE swap_work_queue
            SET claimed_until = NOW() + ($2::float8 * INTERVAL '1 second'),
                delivery_count = delivery_count + 1
            WHERE id = (
                SELECT id FROM swap_work_queue
                WHERE queue = $1 AND (claimed_until IS NULL OR claimed_until < NOW())
                ORDER BY id
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            RETURNING id, payload, delivery_count
            ",
        )
        .bind(&self.name)
        .bind(self.visibility_timeout.as_secs_f64())
        .fetch_optional(&self.pool)
        .await
        .map_err(queue_error)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let id: i64 = row.try_get("id")?;
        let delivery_count: i32 = row.try_get("delivery_count")?;
        Ok(Some(Delivery {
            tag: u64::try_from(id).unwrap_or_default(),
            payload: row.try_get("payload")?,
            redelivered: delivery_count > 1,
        }))
    }
}

/// Connection-level failures become `QueueClosed` so workers reconnect.
/// An acquire timeout only means the pool is busy; the caller backs off.
fn queue_error(err: sqlx::Error) -> SwapIndexerError {
    match err {
        sqlx::Error::PoolTimedOut => SwapIndexerError::QueueError(err.to_string()),
        sqlx::Error::PoolClosed | sqlx::Error::Io(_) => SwapIndexerError::QueueClosed(err.to_string()),
        other => SwapIndexerError::DatabaseError(other),
    }
}

fn tag_id(tag: u64) -> i64 {
    i64::try_from(tag).unwrap_or(i64::MAX)
}

#[async_trait]
impl WorkQueue for PgWorkQueue {
    async fn publish(&self, item: &WorkItem) -> Result<()> {
        sqlx::query("INSERT INTO swap_work_queue (queue, payload) VALUES ($1, $2)")
            .bind(&self.name)
            .bind(item.to_json()?)
            .execute(&self.pool)
            .await
            .map_err(queue_error)?;
        Ok(())
    }

    async fn consume(&self) -> Result<Delivery> {
        loop {
            if let Some(credit) = self.reserve_credit()
                && let Some(delivery) = self.claim().await?
            {
                credit.keep();
                return Ok(delivery);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn ack(&self, tag: u64) -> Result<()> {
        let result = sqlx::query("DELETE FROM swap_work_queue WHERE id = $1")
            .bind(tag_id(tag))
            .execute(&self.pool)
            .await
            .map_err(queue_error);
        self.release_credit();
        result?;
        Ok(())
    }

    async fn nack(&self, tag: u64, requeue: bool) -> Result<()> {
        let query = if requeue {
            "UPDATE swap_work_queue SET claimed_until = NULL WHERE id = $1"
        } else {
            "DELETE FROM swap_work_queue WHERE id = $1"
        };
        let result = sqlx::query(query)
            .bind(tag_id(tag))
            .execute(&self.pool)
            .await
            .map_err(queue_error);
        self.release_credit();
        result?;
        if !requeue {
            tracing::warn!(tag, queue = %self.name, "Discarded rejected delivery");
        }
        Ok(())
    }

    async fn depth(&self) -> Result<u64> {
        let depth: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*) FROM swap_work_queue
            WHERE queue = $1 AND (claimed_until IS NULL OR claimed_until < NOW())
            ",
        )
        .bind(&self.name)
        .fetch_one(&self.pool)
        .await
        .map_err(queue_error)?;
        Ok(u64::try_from(depth).unwrap_or_default())
    }

    async fn set_prefetch(&self, prefetch: u16) -> Result<()> {
        self.prefetch.store(prefetch, Ordering::Release);
        Ok(())
    }

    /// Claims are rows, not connection state, so held deliveries keep their
    /// credits and are still settled by their workers.
    async fn reconnect(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(queue_error)?;
        Ok(())
    }
}
