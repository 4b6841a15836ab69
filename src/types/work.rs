use serde::{Deserialize, Serialize};
use solana_transaction_status::UiConfirmedBlock;

use super::transaction::{RawTransaction, transaction_succeeded};

/// One queued unit of work: transactions from a single block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub block_number: u64,
    pub block_time: i64,
    pub transactions: Vec<RawTransaction>,
}

impl WorkItem {
    /// Work item carrying exactly one transaction.
    #[must_use]
    pub fn single(block_number: u64, block_time: i64, transaction: RawTransaction) -> Self {
        Self {
            block_number,
            block_time,
            transactions: vec![transaction],
        }
    }

    /// # Errors
    ///
    /// Returns `SerializationError` when encoding fails.
    pub fn to_json(&self) -> crate::Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// # Errors
    ///
    /// Returns `SerializationError` on malformed payloads.
    pub fn from_json(payload: &[u8]) -> crate::Result<Self> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// One work item per successful transaction of `block`.
    ///
    /// Failed transactions and transactions that cannot be converted are
    /// skipped; the latter are logged.
    #[must_use]
    pub fn from_block(block_number: u64, block: &UiConfirmedBlock) -> Vec<Self> {
        let block_time = block.block_time.unwrap_or_default();
        block
            .transactions
            .iter()
            .flatten()
            .filter(|tx| transaction_succeeded(tx))
            .filter_map(|tx| match RawTransaction::try_from(tx) {
                Ok(raw) => Some(Self::single(block_number, block_time, raw)),
                Err(e) => {
                    tracing::debug!(slot = block_number, error = %e, "Skipping undecodable transaction");
                    None
                }
            })
            .collect()
    }
}
