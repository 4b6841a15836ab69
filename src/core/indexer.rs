//! Pipeline wiring: listener and backfill feed the work queue, the elastic
//! worker pool drains it into the repository.

use solana_sdk::signature::Signature;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::{QueueBackend, SwapIndexerConfig};
use crate::core::backfill::{BackfillReport, BackfillService, group_ranges};
use crate::core::execution::{BlockProcessor, NodeClient, WorkerContext, WorkerPool};
use crate::core::matchers::ProtocolRegistry;
use crate::core::swaps::SwapHandler;
use crate::queue::{InMemoryWorkQueue, PgWorkQueue, WorkQueue};
use crate::storage::{ChannelBroadcaster, ChannelMetadataQueue, MetadataWriter, PgRepository, drain_pending};
use crate::streams::BlockListener;
use crate::types::swap::SwapLog;
use crate::types::traits::SwapRepository;
use crate::types::transaction::{RawTransaction, transaction_succeeded};
use crate::utils::error::{Result, SwapIndexerError};
use crate::utils::logging;
use crate::utils::rpc::{DefaultRpcProvider, RpcProvider};

const DB_MAX_CONNECTIONS: u32 = 20;
const BROADCAST_CAPACITY: usize = 1024;

/// The assembled swap indexer.
///
/// # Example
///
/// ```no_run
/// use solana_swap_indexer::{SwapIndexer, SwapIndexerConfigBuilder};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = SwapIndexerConfigBuilder::new()
///     .with_rpc("http://127.0.0.1:8899")
///     .with_ws("ws://127.0.0.1:8900")
///     .with_database("postgresql://localhost/swaps")
///     .build()?;
///
/// let indexer = SwapIndexer::new(config).await?;
/// indexer.start().await?;
/// # Ok(())
/// # }
/// ```
pub struct SwapIndexer {
    config: SwapIndexerConfig,
    repository: Arc<PgRepository>,
    queue: Arc<dyn WorkQueue>,
    clients: Vec<Arc<dyn RpcProvider>>,
    processor: Arc<BlockProcessor>,
    metadata_receiver: Option<mpsc::UnboundedReceiver<String>>,
    broadcaster: ChannelBroadcaster,
    shutdown: CancellationToken,
}

impl SwapIndexer {
    /// Connects storage, prepares the queue and node clients.
    ///
    /// # Errors
    ///
    /// Database connection or schema failures; these are fatal at startup.
    pub async fn new(config: SwapIndexerConfig) -> Result<Self> {
        let repository = Arc::new(PgRepository::connect(&config.database_url, DB_MAX_CONNECTIONS).await?);
        repository.initialize().await?;

        let queue: Arc<dyn WorkQueue> = match config.queue.backend {
            QueueBackend::Postgres => {
                let queue = PgWorkQueue::new(
                    repository.pool().clone(),
                    &config.queue,
                    config.pool.baseline_prefetch,
                );
                queue.initialize().await?;
                Arc::new(queue)
            }
            QueueBackend::Memory => Arc::new(InMemoryWorkQueue::new(config.pool.baseline_prefetch)),
        };

        let clients = config
            .rpc_urls
            .iter()
            .map(|url| {
                Arc::new(NodeClient::new(
                    DefaultRpcProvider::new_with_commitment(url, config.commitment.into()),
                    config.node_retry,
                )) as Arc<dyn RpcProvider>
            })
            .collect();

        let (metadata_queue, metadata_receiver) = ChannelMetadataQueue::new();
        let handler = SwapHandler::new(ProtocolRegistry::new()).with_metadata_queue(Arc::new(metadata_queue));

        Ok(Self {
            config,
            repository,
            queue,
            clients,
            processor: Arc::new(BlockProcessor::new(handler)),
            metadata_receiver: Some(metadata_receiver),
            broadcaster: ChannelBroadcaster::new(BROADCAST_CAPACITY),
            shutdown: CancellationToken::new(),
        })
    }

    /// Fan-out channel the websocket server subscribes to.
    #[must_use]
    pub fn broadcaster(&self) -> &ChannelBroadcaster {
        &self.broadcaster
    }

    /// Cancelling this token stops the pipeline.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    fn backfill_service(&self) -> Result<Arc<BackfillService>> {
        Ok(Arc::new(
            BackfillService::new(
                self.clients.clone(),
                self.repository.clone(),
                self.queue.clone(),
            )?
            .with_shutdown(self.shutdown.clone()),
        ))
    }

    /// Runs until Ctrl-C or the shutdown token fires.
    ///
    /// # Errors
    ///
    /// Fails when the worker pool cannot be started.
    pub async fn start(mut self) -> Result<()> {
        logging::log_startup(
            &self.config.rpc_urls,
            &self.config.ws_url,
            self.config.pool.baseline_workers,
        );

        let writer = self.metadata_receiver.take().map(|receiver| {
            MetadataWriter::new(self.repository.clone(), receiver).spawn(self.shutdown.clone())
        });

        let ctx = WorkerContext::new(
            self.queue.clone(),
            self.processor.clone(),
            self.repository.clone(),
        )
        .with_broadcaster(Arc::new(self.broadcaster.clone()))
        .with_retry(self.config.insert_retry, self.config.reconnect_retry);
        let pool = WorkerPool::new(Arc::new(ctx), self.config.pool.clone(), self.shutdown.child_token());
        pool.start().await?;
        let monitor = pool.spawn_monitor();

        let backfill = self.backfill_service()?;
        self.recover_gaps(&backfill).await;

        let listener = Arc::new(
            BlockListener::new(
                self.config.ws_url.clone(),
                self.config.listener,
                self.queue.clone(),
                self.repository.clone(),
            )
            .with_backfill(backfill)
            .with_shutdown(self.shutdown.clone()),
        )
        .spawn();

        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    logging::log_error("Signal handler", &e.to_string());
                }
                tracing::info!("Shutdown requested");
            }
            () = self.shutdown.cancelled() => {}
        }
        self.shutdown.cancel();

        if let Err(e) = listener.await {
            logging::log_error("Block listener task", &e.to_string());
        }
        if let Err(e) = monitor.await {
            logging::log_error("Pool monitor task", &e.to_string());
        }
        pool.shutdown().await;
        if let Some(writer) = writer
            && let Err(e) = writer.await
        {
            logging::log_error("Metadata writer task", &e.to_string());
        }
        self.repository.close().await;
        tracing::info!("Swap indexer stopped");
        Ok(())
    }

    /// Backfills every gap in the processed-block ledger in the background.
    async fn recover_gaps(&self, backfill: &Arc<BackfillService>) {
        let missing = match self.repository.find_missing_blocks().await {
            Ok(missing) => missing,
            Err(e) => {
                logging::log_error("Startup gap scan", &e.to_string());
                return;
            }
        };
        for (from, to) in group_ranges(&missing) {
            tracing::info!(from, to, "Recovering missing blocks");
            let _handle = backfill.spawn(from, to);
        }
    }

    /// Backfills `from..=to` into the queue and waits for it to finish.
    ///
    /// The published items outlive this call, so the queue must be durable.
    ///
    /// # Errors
    ///
    /// Fails on the in-memory queue backend, or when `to` is 0 and the
    /// current slot cannot be resolved.
    pub async fn backfill(&self, from: u64, to: u64) -> Result<BackfillReport> {
        self.config.require_durable_queue("backfill")?;
        self.backfill_service()?.handle_backfill(from, to).await
    }

    /// Re-runs detection for one transaction, replacing its stored swaps.
    ///
    /// # Errors
    ///
    /// Malformed signature, node or database failures.
    pub async fn reprocess_transaction(&mut self, signature: &str) -> Result<Vec<SwapLog>> {
        let parsed = Signature::from_str(signature)
            .map_err(|e| SwapIndexerError::DecodingError(format!("invalid signature {signature}: {e}")))?;
        let client = self
            .clients
            .first()
            .ok_or_else(|| SwapIndexerError::ConfigError("no RPC URL configured".to_string()))?;
        let fetched = client.get_transaction(&parsed).await?;

        let deleted = self.repository.delete_swaps_using_tx(signature).await?;
        if !transaction_succeeded(&fetched.transaction) {
            tracing::info!(signature, deleted, "Transaction failed on chain, no swaps");
            return Ok(Vec::new());
        }

        let raw = RawTransaction::try_from(&fetched.transaction)?;
        let swaps = self.processor.process_transaction(
            &raw,
            fetched.block_time.unwrap_or_default(),
            fetched.slot,
        );
        self.repository.insert_swaps(&swaps).await?;
        self.flush_metadata().await?;
        tracing::info!(signature, deleted, inserted = swaps.len(), "Transaction reprocessed");
        Ok(swaps)
    }

    /// Writes lookups queued outside the pipeline, where no writer task runs.
    async fn flush_metadata(&mut self) -> Result<()> {
        let Some(receiver) = self.metadata_receiver.as_mut() else {
            return Ok(());
        };
        let pending = drain_pending(receiver);
        if !pending.is_empty() {
            self.repository.enqueue_metadata(&pending).await?;
        }
        Ok(())
    }
}
