//! Backfill service: re-fetches a closed block range and re-injects its
//! transactions into the work queue.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::queue::WorkQueue;
use crate::types::traits::SwapRepository;
use crate::types::work::WorkItem;
use crate::utils::error::{Result, SwapIndexerError};
use crate::utils::logging;
use crate::utils::rpc::RpcProvider;

/// Per-range counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BackfillReport {
    /// Blocks fetched and marked processed.
    pub fetched: u64,
    /// Slots the ledger never produced.
    pub skipped: u64,
    /// Blocks abandoned after an error.
    pub failed: u64,
    /// Work items published.
    pub published: u64,
}

pub struct BackfillService {
    clients: Vec<Arc<dyn RpcProvider>>,
    next_client: AtomicUsize,
    repository: Arc<dyn SwapRepository>,
    queue: Arc<dyn WorkQueue>,
    shutdown: CancellationToken,
}

impl BackfillService {
    /// # Errors
    ///
    /// `ConfigError` when `clients` is empty.
    pub fn new(
        clients: Vec<Arc<dyn RpcProvider>>,
        repository: Arc<dyn SwapRepository>,
        queue: Arc<dyn WorkQueue>,
    ) -> Result<Self> {
        if clients.is_empty() {
            return Err(SwapIndexerError::ConfigError(
                "backfill needs at least one node client".to_string(),
            ));
        }
        Ok(Self {
            clients,
            next_client: AtomicUsize::new(0),
            repository,
            queue,
            shutdown: CancellationToken::new(),
        })
    }

    /// Stops range iteration when `shutdown` fires.
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    fn client(&self) -> &Arc<dyn RpcProvider> {
        let index = self.next_client.fetch_add(1, Ordering::Relaxed) % self.clients.len();
        &self.clients[index]
    }

    /// Processes `from_block..=to_block` sequentially. A `to_block` of 0
    /// means the ledger's current slot.
    ///
    /// Individual block failures are counted and skipped; only resolving the
    /// current slot can fail the call.
    ///
    /// # Errors
    ///
    /// Returns the node error when `to_block` is 0 and the slot lookup fails.
    pub async fn handle_backfill(&self, from_block: u64, to_block: u64) -> Result<BackfillReport> {
        let to_block = if to_block == 0 {
            self.client().get_slot().await?
        } else {
            to_block
        };

        let mut report = BackfillReport::default();
        if from_block > to_block {
            return Ok(report);
        }
        tracing::info!(from = from_block, to = to_block, "Starting backfill");

        for slot in from_block..=to_block {
            if self.shutdown.is_cancelled() {
                tracing::info!(slot, "Backfill interrupted by shutdown");
                break;
            }
            self.backfill_block(slot, &mut report).await;
        }

        tracing::info!(
            from = from_block,
            to = to_block,
            fetched = report.fetched,
            skipped = report.skipped,
            failed = report.failed,
            published = report.published,
            "Backfill finished"
        );
        Ok(report)
    }

    async fn backfill_block(&self, slot: u64, report: &mut BackfillReport) {
        let block = match self.client().get_block(slot).await {
            Ok(block) => block,
            Err(SwapIndexerError::BlockNotFound(_)) => {
                tracing::debug!(slot, "Slot skipped by the ledger");
                report.skipped += 1;
                return;
            }
            Err(e) => {
                logging::log_error(&format!("Backfill slot {slot}"), &e.to_string());
                report.failed += 1;
                return;
            }
        };

        if let Err(e) = self.repository.mark_block_processed(slot).await {
            logging::log_error(&format!("Backfill slot {slot}"), &e.to_string());
            report.failed += 1;
            return;
        }
        report.fetched += 1;

        for item in WorkItem::from_block(slot, &block) {
            match self.queue.publish(&item).await {
                Ok(()) => report.published += 1,
                Err(e) => logging::log_error(&format!("Backfill publish slot {slot}"), &e.to_string()),
            }
        }
    }

    /// Runs a backfill in the background.
    #[must_use]
    pub fn spawn(self: &Arc<Self>, from_block: u64, to_block: u64) -> JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = service.handle_backfill(from_block, to_block).await {
                logging::log_error(&format!("Backfill {from_block}..={to_block}"), &e.to_string());
            }
        })
    }
}

/// Groups sorted block numbers into inclusive contiguous ranges.
#[must_use]
pub fn group_ranges(blocks: &[u64]) -> Vec<(u64, u64)> {
    let mut ranges: Vec<(u64, u64)> = Vec::new();
    for &block in blocks {
        match ranges.last_mut() {
            Some((_, end)) if end.checked_add(1) == Some(block) => *end = block,
            _ => ranges.push((block, block)),
        }
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_ranges() {
        assert!(group_ranges(&[]).is_empty());
        assert_eq!(group_ranges(&[5]), vec![(5, 5)]);
        assert_eq!(
            group_ranges(&[1, 2, 3, 7, 9, 10]),
            vec![(1, 3), (7, 7), (9, 10)]
        );
    }
}
