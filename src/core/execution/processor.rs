//! Per-item processing: transfer reconstruction followed by swap handling.

use crate::core::swaps::SwapHandler;
use crate::core::transfers::TransferReconstructor;
use crate::types::swap::SwapLog;
use crate::types::transaction::RawTransaction;
use crate::types::work::WorkItem;

/// Pure CPU stage shared by all workers.
pub struct BlockProcessor {
    handler: SwapHandler,
}

impl BlockProcessor {
    #[must_use]
    pub fn new(handler: SwapHandler) -> Self {
        Self { handler }
    }

    /// Swaps of every transaction in `item`, in transaction order.
    #[must_use]
    pub fn process(&self, item: &WorkItem) -> Vec<SwapLog> {
        item.transactions
            .iter()
            .flat_map(|tx| self.process_transaction(tx, item.block_time, item.block_number))
            .collect()
    }

    #[must_use]
    pub fn process_transaction(
        &self,
        tx: &RawTransaction,
        block_time: i64,
        block_number: u64,
    ) -> Vec<SwapLog> {
        let transfers = TransferReconstructor::reconstruct(tx);
        self.handler
            .handle_swaps(&transfers, tx, block_time, block_number)
    }
}

impl Default for BlockProcessor {
    fn default() -> Self {
        Self::new(SwapHandler::default())
    }
}
