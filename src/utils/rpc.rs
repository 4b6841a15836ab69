use async_trait::async_trait;
use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::{RpcBlockConfig, RpcTransactionConfig};
use solana_client::rpc_request::RpcError;
use solana_sdk::{commitment_config::CommitmentConfig, signature::Signature};
use solana_transaction_status::{
    EncodedConfirmedTransactionWithStatusMeta, TransactionDetails, UiConfirmedBlock,
    UiTransactionEncoding,
};

use crate::utils::error::{Result, SwapIndexerError};

/// Slot was skipped, or is missing from long-term storage.
pub const SLOT_SKIPPED: i64 = -32007;
pub const LONG_TERM_STORAGE_SLOT_SKIPPED: i64 = -32009;

/// The node calls the pipeline depends on.
#[async_trait]
pub trait RpcProvider: Send + Sync {
    async fn get_transaction(
        &self,
        signature: &Signature,
    ) -> Result<EncodedConfirmedTransactionWithStatusMeta>;

    async fn get_block(&self, slot: u64) -> Result<UiConfirmedBlock>;

    async fn get_slot(&self) -> Result<u64>;
}

pub struct DefaultRpcProvider {
    client: RpcClient,
    commitment: CommitmentConfig,
}

impl DefaultRpcProvider {
    /// Creates a provider with a specific commitment configuration.
    pub fn new_with_commitment(rpc_url: &str, commitment: CommitmentConfig) -> Self {
        Self {
            client: RpcClient::new_with_commitment(rpc_url.to_string(), commitment),
            commitment,
        }
    }
}

/// Maps a client error, turning "slot skipped" responses into `BlockNotFound`.
pub fn map_block_error(slot: u64, err: ClientError) -> SwapIndexerError {
    if let ClientErrorKind::RpcError(RpcError::RpcResponseError { code, .. }) = err.kind()
        && (*code == SLOT_SKIPPED || *code == LONG_TERM_STORAGE_SLOT_SKIPPED)
    {
        return SwapIndexerError::BlockNotFound(slot);
    }
    SwapIndexerError::from(err)
}

#[async_trait]
impl RpcProvider for DefaultRpcProvider {
    async fn get_transaction(
        &self,
        signature: &Signature,
    ) -> Result<EncodedConfirmedTransactionWithStatusMeta> {
        Ok(self
            .client
            .get_transaction_with_config(
                signature,
                RpcTransactionConfig {
                    encoding: Some(UiTransactionEncoding::Json),
                    commitment: Some(self.commitment),
                    max_supported_transaction_version: Some(0),
                },
            )
            .await?)
    }

    async fn get_block(&self, slot: u64) -> Result<UiConfirmedBlock> {
        self.client
            .get_block_with_config(
                slot,
                RpcBlockConfig {
                    encoding: Some(UiTransactionEncoding::Json),
                    transaction_details: Some(TransactionDetails::Full),
                    rewards: Some(false),
                    commitment: Some(self.commitment),
                    max_supported_transaction_version: Some(0),
                },
            )
            .await
            .map_err(|e| map_block_error(slot, e))
    }

    async fn get_slot(&self) -> Result<u64> {
        Ok(self.client.get_slot_with_commitment(self.commitment).await?)
    }
}
