//! `solana-swap-indexer` - swap ingestion for Solana DEX programs.
//!
//! Blocks arrive over a websocket `blockSubscribe` stream (or are fetched by
//! the backfill service), are split into per-transaction work items and
//! published to a durable work queue. An elastic pool of workers drains the
//! queue: each transaction is reduced to a list of value transfers, protocol
//! matchers turn transfer windows into swap candidates, and validated swaps
//! are written to Postgres and fanned out to subscribers.
//!
//! # Quick Start
//!
//! ```no_run
//! use solana_swap_indexer::{SwapIndexer, SwapIndexerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     dotenvy::dotenv().ok();
//!     let config = SwapIndexerConfig::from_env()?;
//!     SwapIndexer::new(config).await?.start().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Detecting swaps without the pipeline
//!
//! ```no_run
//! use solana_swap_indexer::{BlockProcessor, RawTransaction};
//!
//! fn detect(tx: &RawTransaction) {
//!     let processor = BlockProcessor::default();
//!     for swap in processor.process_transaction(tx, 1_700_000_000, 250_000_000) {
//!         println!("{} {} {} via {}", swap.action.as_str(), swap.amount_in, swap.token, swap.source);
//!     }
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `RPC_URLS`: comma separated node endpoints
//! - `WS_URL`: websocket endpoint for `blockSubscribe`
//! - `DATABASE_URL`: Postgres connection string
//! - `COMMITMENT`, `QUEUE_BACKEND`, `QUEUE_NAME`, `BASELINE_WORKERS`,
//!   `BASELINE_PREFETCH`, `MONITOR_INTERVAL_SECS`, `RUST_LOG` (optional)

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub use config::{
    CommitmentLevel, ListenerConfig, PoolConfig, QueueBackend, QueueConfig, RetryConfig,
    ScalingStep, SwapIndexerConfig, SwapIndexerConfigBuilder,
};
pub use core::backfill::{BackfillReport, BackfillService};
pub use core::execution::{BlockProcessor, NodeClient, Worker, WorkerContext, WorkerPool};
pub use core::indexer::SwapIndexer;
pub use core::matchers::{ProtocolMatcher, ProtocolRegistry};
pub use core::swaps::SwapHandler;
pub use core::transfers::TransferReconstructor;
pub use queue::{Delivery, InMemoryWorkQueue, PgWorkQueue, WorkQueue};
pub use storage::{ChannelBroadcaster, ChannelMetadataQueue, MetadataWriter, PgRepository};
pub use streams::BlockListener;
pub use types::events::{EventDiscriminator, PumpTradeEvent, calculate_discriminator};
pub use types::protocol::Protocol;
pub use types::swap::{SwapAction, SwapCandidate, SwapLog, Transfer, TransferKind};
pub use types::traits::{MetadataQueue, SwapBroadcaster, SwapRepository};
pub use types::transaction::RawTransaction;
pub use types::work::WorkItem;
pub use utils::error::{Result, SwapIndexerError};
pub use utils::rpc::{DefaultRpcProvider, RpcProvider};

pub mod config;
pub mod core;
pub mod queue;
pub mod storage;
pub mod streams;
pub mod telemetry;
pub mod types;
pub mod utils;
