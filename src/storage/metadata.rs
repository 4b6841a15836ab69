//! Token and pair metadata lookup queue.
//!
//! `add_to_queue` is a non-blocking channel send. A background writer drains
//! the channel in deduplicated batches into `token_metadata_queue`, which the
//! external metadata service polls.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::PgRepository;
use crate::types::traits::MetadataQueue;

const DEFAULT_BATCH_SIZE: usize = 500;
const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct ChannelMetadataQueue {
    sender: mpsc::UnboundedSender<String>,
}

impl ChannelMetadataQueue {
    /// Creates the queue and the receiving half for a [`MetadataWriter`].
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl MetadataQueue for ChannelMetadataQueue {
    fn add_to_queue(&self, address: &str) {
        if address.is_empty() {
            return;
        }
        if self.sender.send(address.to_string()).is_err() {
            tracing::trace!(address, "Metadata writer gone, dropping lookup");
        }
    }
}

/// Takes every lookup already sitting in `receiver`, deduplicated, without waiting.
#[must_use]
pub fn drain_pending(receiver: &mut mpsc::UnboundedReceiver<String>) -> Vec<String> {
    let mut pending = BTreeSet::new();
    while let Ok(address) = receiver.try_recv() {
        pending.insert(address);
    }
    pending.into_iter().collect()
}

pub struct MetadataWriter {
    repository: Arc<PgRepository>,
    receiver: mpsc::UnboundedReceiver<String>,
    batch_size: usize,
    flush_interval: Duration,
}

impl MetadataWriter {
    #[must_use]
    pub fn new(repository: Arc<PgRepository>, receiver: mpsc::UnboundedReceiver<String>) -> Self {
        Self {
            repository,
            receiver,
            batch_size: DEFAULT_BATCH_SIZE,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
        }
    }

    /// Drains until `shutdown` fires or every sender is dropped, flushing
    /// whatever is buffered on the way out.
    #[must_use]
    pub fn spawn(mut self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut batch = BTreeSet::new();
            let mut ticker = tokio::time::interval(self.flush_interval);
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    received = self.receiver.recv() => match received {
                        Some(address) => {
                            batch.insert(address);
                            if batch.len() >= self.batch_size {
                                self.flush(&mut batch).await;
                            }
                        }
                        None => break,
                    },
                    _ = ticker.tick() => self.flush(&mut batch).await,
                }
            }
            batch.extend(drain_pending(&mut self.receiver));
            self.flush(&mut batch).await;
        })
    }

    async fn flush(&self, batch: &mut BTreeSet<String>) {
        if batch.is_empty() {
            return;
        }
        let addresses: Vec<String> = std::mem::take(batch).into_iter().collect();
        if let Err(e) = self.repository.enqueue_metadata(&addresses).await {
            tracing::warn!(count = addresses.len(), error = %e, "Failed to queue metadata lookups");
        }
    }
}
