//! Retrying node client.

use async_trait::async_trait;
use solana_sdk::signature::Signature;
use solana_transaction_status::{EncodedConfirmedTransactionWithStatusMeta, UiConfirmedBlock};
use std::future::Future;
use std::str::FromStr;

use crate::config::RetryConfig;
use crate::utils::error::{Result, SwapIndexerError};
use crate::utils::retry::retry_with_backoff;
use crate::utils::rpc::{DefaultRpcProvider, RpcProvider};

/// Wraps an [`RpcProvider`] with bounded retry.
///
/// Transport errors and non-200 responses are retried per the policy
/// (default: 3 retries, 100ms x attempt). Exhaustion surfaces as
/// `NodeUnavailable`. `BlockNotFound` is returned on the first occurrence.
pub struct NodeClient<P = DefaultRpcProvider> {
    provider: P,
    retry: RetryConfig,
}

impl NodeClient<DefaultRpcProvider> {
    /// Client for `rpc_url` with the default node retry policy.
    #[must_use]
    pub fn connect(rpc_url: &str, commitment: solana_sdk::commitment_config::CommitmentConfig) -> Self {
        Self::new(
            DefaultRpcProvider::new_with_commitment(rpc_url, commitment),
            RetryConfig::node(),
        )
    }
}

impl<P: RpcProvider> NodeClient<P> {
    #[must_use]
    pub fn new(provider: P, retry: RetryConfig) -> Self {
        Self { provider, retry }
    }

    /// Fetches a transaction by base58 signature.
    ///
    /// # Errors
    ///
    /// `DecodingError` for a malformed signature, `NodeUnavailable` when
    /// every attempt fails.
    pub async fn get_tx(&self, signature: &str) -> Result<EncodedConfirmedTransactionWithStatusMeta> {
        let signature = Signature::from_str(signature)
            .map_err(|e| SwapIndexerError::DecodingError(format!("invalid signature {signature}: {e}")))?;
        self.get_transaction(&signature).await
    }

    /// Fetches a full block.
    ///
    /// # Errors
    ///
    /// `BlockNotFound` for skipped slots, `NodeUnavailable` otherwise.
    pub async fn get_block_by_number(&self, slot: u64) -> Result<UiConfirmedBlock> {
        self.get_block(slot).await
    }

    async fn with_retry<T, F, Fut>(&self, label: &str, op: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        retry_with_backoff(&self.retry, label, op)
            .await
            .map_err(|err| match err {
                SwapIndexerError::RetryExhausted {
                    attempts,
                    last_error,
                } => SwapIndexerError::NodeUnavailable {
                    attempts,
                    last_error,
                },
                other => other,
            })
    }
}

#[async_trait]
impl<P: RpcProvider> RpcProvider for NodeClient<P> {
    async fn get_transaction(
        &self,
        signature: &Signature,
    ) -> Result<EncodedConfirmedTransactionWithStatusMeta> {
        self.with_retry("get_transaction", || self.provider.get_transaction(signature))
            .await
    }

    async fn get_block(&self, slot: u64) -> Result<UiConfirmedBlock> {
        self.with_retry("get_block", || self.provider.get_block(slot))
            .await
    }

    async fn get_slot(&self) -> Result<u64> {
        self.with_retry("get_slot", || self.provider.get_slot()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackoffStrategy;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Flaky {
        calls: AtomicU32,
        failures: u32,
        error: fn(u64) -> SwapIndexerError,
    }

    #[async_trait]
    impl RpcProvider for Flaky {
        async fn get_transaction(
            &self,
            _signature: &Signature,
        ) -> Result<EncodedConfirmedTransactionWithStatusMeta> {
            Err(SwapIndexerError::RpcError("unused".into()))
        }

        async fn get_block(&self, slot: u64) -> Result<UiConfirmedBlock> {
            Err((self.error)(slot))
        }

        async fn get_slot(&self) -> Result<u64> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                Err((self.error)(0))
            } else {
                Ok(42)
            }
        }
    }

    fn fast() -> RetryConfig {
        RetryConfig {
            initial_backoff_ms: 1,
            strategy: BackoffStrategy::Linear,
            ..RetryConfig::node()
        }
    }

    #[tokio::test]
    async fn test_recovers_within_retry_budget() {
        let client = NodeClient::new(
            Flaky {
                calls: AtomicU32::new(0),
                failures: 3,
                error: |_| SwapIndexerError::RpcError("503".into()),
            },
            fast(),
        );
        assert_eq!(client.get_slot().await.unwrap(), 42);
        assert_eq!(client.provider.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_exhaustion_is_node_unavailable() {
        let client = NodeClient::new(
            Flaky {
                calls: AtomicU32::new(0),
                failures: 10,
                error: |_| SwapIndexerError::RpcError("503".into()),
            },
            fast(),
        );
        match client.get_slot().await {
            Err(SwapIndexerError::NodeUnavailable { attempts, .. }) => assert_eq!(attempts, 4),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_block_not_found_is_not_retried() {
        let client = NodeClient::new(
            Flaky {
                calls: AtomicU32::new(0),
                failures: 0,
                error: SwapIndexerError::BlockNotFound,
            },
            fast(),
        );
        assert!(matches!(
            client.get_block_by_number(7).await,
            Err(SwapIndexerError::BlockNotFound(7))
        ));
    }

    #[tokio::test]
    async fn test_rejects_malformed_signature() {
        let client = NodeClient::new(
            Flaky {
                calls: AtomicU32::new(0),
                failures: 0,
                error: SwapIndexerError::BlockNotFound,
            },
            fast(),
        );
        assert!(matches!(
            client.get_tx("not-a-signature").await,
            Err(SwapIndexerError::DecodingError(_))
        ));
    }
}
