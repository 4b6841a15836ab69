//! Queue consumer.
//!
//! A worker cycles `Idle -> Claimed -> Processing -> Acked | Nacked -> Idle`
//! until its cancellation token fires. Cancellation while an item is held
//! hands the item back to the queue.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use super::processor::BlockProcessor;
use crate::config::RetryConfig;
use crate::queue::{Delivery, WorkQueue};
use crate::types::swap::SwapLog;
use crate::types::traits::{SwapBroadcaster, SwapRepository};
use crate::types::work::WorkItem;
use crate::utils::error::SwapIndexerError;
use crate::utils::logging;
use crate::utils::retry::retry_with_backoff;

const CONSUME_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Collaborators shared by every worker of a pool.
pub struct WorkerContext {
    pub queue: Arc<dyn WorkQueue>,
    pub processor: Arc<BlockProcessor>,
    pub repository: Arc<dyn SwapRepository>,
    pub broadcaster: Option<Arc<dyn SwapBroadcaster>>,
    pub insert_retry: RetryConfig,
    pub reconnect_retry: RetryConfig,
    /// Serializes reconnects so one closed connection is re-opened once.
    pub reconnect_lock: tokio::sync::Mutex<()>,
}

impl WorkerContext {
    #[must_use]
    pub fn new(
        queue: Arc<dyn WorkQueue>,
        processor: Arc<BlockProcessor>,
        repository: Arc<dyn SwapRepository>,
    ) -> Self {
        Self {
            queue,
            processor,
            repository,
            broadcaster: None,
            insert_retry: RetryConfig::batch_insert(),
            reconnect_retry: RetryConfig::reconnect(),
            reconnect_lock: tokio::sync::Mutex::new(()),
        }
    }

    #[must_use]
    pub fn with_broadcaster(mut self, broadcaster: Arc<dyn SwapBroadcaster>) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    #[must_use]
    pub fn with_retry(mut self, insert: RetryConfig, reconnect: RetryConfig) -> Self {
        self.insert_retry = insert;
        self.reconnect_retry = reconnect;
        self
    }
}

/// How a single delivery ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Acked,
    /// Malformed payload, discarded.
    Rejected,
    /// Handed back for redelivery.
    Requeued,
}

pub struct Worker {
    id: usize,
    ctx: Arc<WorkerContext>,
    cancel: CancellationToken,
}

impl Worker {
    #[must_use]
    pub fn new(id: usize, ctx: Arc<WorkerContext>, cancel: CancellationToken) -> Self {
        Self { id, ctx, cancel }
    }

    /// Runs until cancelled or until the queue connection cannot be restored.
    pub async fn run(self) {
        tracing::debug!(worker_id = self.id, "Worker started");
        loop {
            let next = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                next = self.ctx.queue.consume() => next,
            };

            match next {
                Ok(delivery) => {
                    self.handle(delivery).await;
                }
                Err(SwapIndexerError::QueueClosed(reason)) => {
                    if !self.reconnect(&reason).await {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(worker_id = self.id, error = %e, "Consume failed");
                    tokio::select! {
                        () = self.cancel.cancelled() => break,
                        () = tokio::time::sleep(CONSUME_ERROR_BACKOFF) => {}
                    }
                }
            }
        }
        tracing::debug!(worker_id = self.id, "Worker stopped");
    }

    /// Processes one delivery through to ack or nack.
    pub async fn handle(&self, delivery: Delivery) -> ItemOutcome {
        let item = match WorkItem::from_json(&delivery.payload) {
            Ok(item) => item,
            Err(e) => {
                tracing::warn!(worker_id = self.id, tag = delivery.tag, error = %e, "Rejecting malformed work item");
                self.settle(delivery.tag, Some(false)).await;
                return ItemOutcome::Rejected;
            }
        };

        let started = Instant::now();
        if delivery.redelivered {
            self.clear_previous_attempt(&item).await;
        }

        let swaps = self.ctx.processor.process(&item);
        if swaps.is_empty() {
            self.settle(delivery.tag, None).await;
            logging::log_batch(item.block_number, item.transactions.len(), 0, elapsed_ms(started));
            return ItemOutcome::Acked;
        }

        let insert = self.insert(&swaps);
        let inserted = tokio::select! {
            biased;
            () = self.cancel.cancelled() => {
                self.settle(delivery.tag, Some(true)).await;
                return ItemOutcome::Requeued;
            }
            result = insert => result,
        };

        match inserted {
            Ok(()) => {
                self.settle(delivery.tag, None).await;
                if let Some(broadcaster) = &self.ctx.broadcaster {
                    broadcaster.broadcast_swaps(&swaps);
                }
                logging::log_batch(
                    item.block_number,
                    item.transactions.len(),
                    swaps.len(),
                    elapsed_ms(started),
                );
                ItemOutcome::Acked
            }
            Err(e) => {
                logging::log_error(
                    &format!("Worker {} slot {}", self.id, item.block_number),
                    &e.to_string(),
                );
                self.settle(delivery.tag, Some(true)).await;
                ItemOutcome::Requeued
            }
        }
    }

    async fn insert(&self, swaps: &[SwapLog]) -> crate::Result<()> {
        retry_with_backoff(&self.ctx.insert_retry, "insert_swaps", || {
            self.ctx.repository.insert_swaps(swaps)
        })
        .await
        .map_err(|err| {
            let attempts = match &err {
                SwapIndexerError::RetryExhausted { attempts, .. } => *attempts,
                _ => 1,
            };
            SwapIndexerError::BatchInsertFailed {
                attempts,
                last_error: err.to_string(),
            }
        })
    }

    /// A redelivered item may have been partially persisted by a crashed
    /// worker; drop those rows before inserting again.
    async fn clear_previous_attempt(&self, item: &WorkItem) {
        for tx in &item.transactions {
            if let Err(e) = self.ctx.repository.delete_swaps_using_tx(&tx.signature).await {
                tracing::warn!(
                    worker_id = self.id,
                    signature = %tx.signature,
                    error = %e,
                    "Failed to clear swaps of redelivered transaction"
                );
            }
        }
    }

    /// `None` acks, `Some(requeue)` nacks.
    async fn settle(&self, tag: u64, nack: Option<bool>) {
        let result = match nack {
            None => self.ctx.queue.ack(tag).await,
            Some(requeue) => self.ctx.queue.nack(tag, requeue).await,
        };
        if let Err(e) = result {
            // The broker redelivers anything we failed to settle.
            tracing::warn!(worker_id = self.id, tag, error = %e, "Failed to settle delivery");
        }
    }

    async fn reconnect(&self, reason: &str) -> bool {
        tracing::warn!(worker_id = self.id, reason, "Queue connection closed, reconnecting");
        let _guard = self.ctx.reconnect_lock.lock().await;
        let attempt = retry_with_backoff(&self.ctx.reconnect_retry, "queue_reconnect", || {
            self.ctx.queue.reconnect()
        });
        let result = tokio::select! {
            () = self.cancel.cancelled() => return false,
            result = attempt => result,
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                logging::log_error(&format!("Worker {} giving up", self.id), &e.to_string());
                false
            }
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
