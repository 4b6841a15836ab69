//! Collaborators the core calls but does not own.

use async_trait::async_trait;

use super::swap::SwapLog;
use crate::utils::error::Result;

/// Swap persistence and the processed-block ledger.
///
/// Inserting the same swap twice must be harmless: implementations key rows
/// on (id, pair, action, amount in, amount out, block, timestamp).
#[async_trait]
pub trait SwapRepository: Send + Sync {
    /// Idempotent upsert into the processed-block ledger.
    async fn mark_block_processed(&self, block_number: u64) -> Result<()>;

    async fn insert_swaps(&self, swaps: &[SwapLog]) -> Result<()>;

    /// Removes every swap recorded for `signature`; returns the row count.
    async fn delete_swaps_using_tx(&self, signature: &str) -> Result<u64>;

    /// Block numbers missing between the lowest and highest processed block.
    async fn find_missing_blocks(&self) -> Result<Vec<u64>>;
}

/// Token / pair metadata lookup queue. Must never block the caller.
pub trait MetadataQueue: Send + Sync {
    fn add_to_queue(&self, address: &str);
}

/// Websocket fan-out of finished swap batches. Fire-and-forget.
pub trait SwapBroadcaster: Send + Sync {
    fn broadcast_swaps(&self, swaps: &[SwapLog]);
}
