//! Streaming block subscription.
//!
//! Each connection attempt runs `Connect -> Subscribe -> Stream` and ends in
//! a disconnect or an error, after which the listener waits and starts over.
//! The first block seen after a recovery is compared with the last block
//! processed; a gap launches a background backfill and streaming carries on.

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use solana_transaction_status::UiConfirmedBlock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;

use crate::config::{CommitmentLevel, ListenerConfig};
use crate::core::backfill::BackfillService;
use crate::queue::WorkQueue;
use crate::types::traits::SwapRepository;
use crate::types::work::WorkItem;
use crate::utils::error::{Result, SwapIndexerError};
use crate::utils::logging;

/// blockSubscribe notification envelope.
#[derive(Debug, Deserialize)]
struct BlockNotification {
    params: BlockNotificationParams,
}

#[derive(Debug, Deserialize)]
struct BlockNotificationParams {
    result: BlockNotificationResult,
}

#[derive(Debug, Deserialize)]
struct BlockNotificationResult {
    value: BlockNotificationValue,
}

#[derive(Debug, Deserialize)]
struct BlockNotificationValue {
    slot: u64,
    block: Option<UiConfirmedBlock>,
    #[serde(default)]
    err: Option<serde_json::Value>,
}

/// Subscription response from the node.
#[derive(Debug, Deserialize)]
struct SubscriptionResponse {
    result: Option<u64>,
    error: Option<serde_json::Value>,
}

/// `blockSubscribe` request for every block at `commitment`.
#[must_use]
pub fn subscribe_request(commitment: CommitmentLevel) -> serde_json::Value {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "blockSubscribe",
        "params": [
            "all",
            {
                "commitment": commitment.as_str(),
                "encoding": "json",
                "transactionDetails": "full",
                "maxSupportedTransactionVersion": 0,
                "showRewards": false
            }
        ]
    })
}

/// Extracts `(slot, block)` from a notification. Anything else, including
/// notifications that carry an error or no block, yields `None`.
#[must_use]
pub fn parse_block_notification(text: &str) -> Option<(u64, UiConfirmedBlock)> {
    let notification: BlockNotification = serde_json::from_str(text).ok()?;
    let value = notification.params.result.value;
    if value.err.as_ref().is_some_and(|err| !err.is_null()) {
        return None;
    }
    Some((value.slot, value.block?))
}

/// Missing range between the last processed block and the first block seen
/// on a new connection.
#[must_use]
pub fn detect_gap(last_processed: Option<u64>, first_seen: u64) -> Option<(u64, u64)> {
    let last = last_processed?;
    (first_seen > last.saturating_add(1)).then(|| (last + 1, first_seen - 1))
}

pub struct BlockListener {
    ws_url: String,
    config: ListenerConfig,
    queue: Arc<dyn WorkQueue>,
    repository: Arc<dyn SwapRepository>,
    backfill: Option<Arc<BackfillService>>,
    /// 0 until the first block is processed.
    last_processed: AtomicU64,
    shutdown: CancellationToken,
}

impl BlockListener {
    #[must_use]
    pub fn new(
        ws_url: impl Into<String>,
        config: ListenerConfig,
        queue: Arc<dyn WorkQueue>,
        repository: Arc<dyn SwapRepository>,
    ) -> Self {
        Self {
            ws_url: ws_url.into(),
            config,
            queue,
            repository,
            backfill: None,
            last_processed: AtomicU64::new(0),
            shutdown: CancellationToken::new(),
        }
    }

    /// Gaps found after a reconnect are handed to `backfill`.
    #[must_use]
    pub fn with_backfill(mut self, backfill: Arc<BackfillService>) -> Self {
        self.backfill = Some(backfill);
        self
    }

    #[must_use]
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    #[must_use]
    pub fn last_processed(&self) -> Option<u64> {
        match self.last_processed.load(Ordering::Acquire) {
            0 => None,
            slot => Some(slot),
        }
    }

    #[must_use]
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    /// Connect loop; returns on shutdown only.
    pub async fn run(&self) {
        let mut delay = Duration::from_millis(self.config.initial_delay_ms);
        let mut recovering = false;

        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }

            match self.stream_once(&mut recovering).await {
                Ok(()) => break,
                Err(e) => {
                    logging::log_error("Block listener", &e.to_string());
                    recovering = true;
                }
            }
            delay = Duration::from_millis(self.config.reconnect_delay_ms);
        }
        tracing::info!("Block listener stopped");
    }

    /// One connection: subscribe and stream until shutdown (`Ok`) or failure.
    async fn stream_once(&self, recovering: &mut bool) -> Result<()> {
        tracing::info!(ws_url = %logging::redact_url(&self.ws_url), "Connecting block subscription");
        let (ws_stream, _) = connect_async(self.ws_url.as_str())
            .await
            .map_err(|e| SwapIndexerError::ConnectionError(format!("WebSocket connection failed: {e}")))?;
        let (mut write, mut read) = ws_stream.split();

        write
            .send(Message::Text(subscribe_request(self.config.commitment).to_string()))
            .await
            .map_err(|e| SwapIndexerError::ConnectionError(format!("Failed to send subscription: {e}")))?;

        let subscription_id = loop {
            match read.next().await {
                Some(Ok(Message::Text(text))) => {
                    if let Ok(response) = serde_json::from_str::<SubscriptionResponse>(&text) {
                        if let Some(error) = response.error {
                            return Err(SwapIndexerError::ConnectionError(format!(
                                "blockSubscribe rejected: {error}"
                            )));
                        }
                        if let Some(id) = response.result {
                            break id;
                        }
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(SwapIndexerError::ConnectionError(e.to_string())),
                None => {
                    return Err(SwapIndexerError::ConnectionError(
                        "stream closed before subscription".to_string(),
                    ));
                }
            }
        };
        tracing::info!(subscription_id, "Block subscription active");

        loop {
            let message = tokio::select! {
                () = self.shutdown.cancelled() => return Ok(()),
                message = read.next() => message,
            };

            match message {
                Some(Ok(Message::Text(text))) => {
                    let Some((slot, block)) = parse_block_notification(&text) else {
                        continue;
                    };
                    if *recovering {
                        *recovering = false;
                        self.recover_gap(slot);
                    }
                    if let Err(e) = self.handle_block(slot, &block).await {
                        logging::log_error(&format!("Block listener slot {slot}"), &e.to_string());
                    }
                }
                Some(Ok(Message::Ping(payload))) => {
                    write
                        .send(Message::Pong(payload))
                        .await
                        .map_err(|e| SwapIndexerError::ConnectionError(e.to_string()))?;
                }
                Some(Ok(Message::Close(_))) | None => {
                    return Err(SwapIndexerError::ConnectionError(
                        "block subscription closed".to_string(),
                    ));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(SwapIndexerError::ConnectionError(e.to_string())),
            }
        }
    }

    fn recover_gap(&self, first_seen: u64) {
        let Some((from, to)) = detect_gap(self.last_processed(), first_seen) else {
            return;
        };
        tracing::warn!(from, to, "Gap after reconnect, launching backfill");
        if let Some(backfill) = &self.backfill {
            let _handle = backfill.spawn(from, to);
        }
    }

    /// Marks `slot` processed and publishes one work item per successful
    /// transaction. Returns the number published.
    ///
    /// # Errors
    ///
    /// Fails when the block cannot be marked processed or an item cannot be
    /// published.
    pub async fn handle_block(&self, slot: u64, block: &UiConfirmedBlock) -> Result<usize> {
        let items = WorkItem::from_block(slot, block);
        self.repository.mark_block_processed(slot).await?;
        for item in &items {
            self.queue.publish(item).await?;
        }
        self.last_processed.fetch_max(slot, Ordering::AcqRel);
        Ok(items.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_request_shape() {
        let request = subscribe_request(CommitmentLevel::Confirmed);
        assert_eq!(request["method"], "blockSubscribe");
        assert_eq!(request["params"][0], "all");
        assert_eq!(request["params"][1]["commitment"], "confirmed");
        assert_eq!(request["params"][1]["transactionDetails"], "full");
        assert_eq!(request["params"][1]["maxSupportedTransactionVersion"], 0);
    }

    #[test]
    fn test_detect_gap() {
        assert_eq!(detect_gap(None, 100), None);
        assert_eq!(detect_gap(Some(99), 100), None);
        assert_eq!(detect_gap(Some(100), 100), None);
        assert_eq!(detect_gap(Some(95), 100), Some((96, 99)));
    }

    #[test]
    fn test_ignores_non_block_messages() {
        assert!(parse_block_notification(r#"{"jsonrpc":"2.0","result":5,"id":1}"#).is_none());
        let errored = r#"{"jsonrpc":"2.0","method":"blockNotification","params":{"result":{"context":{"slot":5},"value":{"slot":5,"block":null,"err":"BlockStoreError"}},"subscription":1}}"#;
        assert!(parse_block_notification(errored).is_none());
    }
}
