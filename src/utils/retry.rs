//! Retry and backoff helpers.
//!
//! - [`compute_backoff`] turns a [`RetryConfig`] and attempt number into a delay.
//! - [`is_transient`] classifies a [`SwapIndexerError`] as retryable or not.
//! - [`retry_with_backoff`] drives an async operation under a policy.

use crate::config::{BackoffStrategy, RetryConfig};
use crate::utils::error::{Result, SwapIndexerError};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Computes the delay before the next retry.
///
/// `attempt` is 1-indexed: `attempt = 1` is the delay before the first retry.
/// The result is capped at `max_backoff_ms`, then jittered by +/-25% if enabled.
#[must_use]
pub fn compute_backoff(cfg: &RetryConfig, attempt: u32) -> Duration {
    let attempt = attempt.max(1);
    let base = match cfg.strategy {
        BackoffStrategy::Fixed => cfg.initial_backoff_ms as f64,
        BackoffStrategy::Linear => cfg.initial_backoff_ms as f64 * f64::from(attempt),
        BackoffStrategy::Exponential { multiplier } => {
            cfg.initial_backoff_ms as f64 * multiplier.powi(attempt.saturating_sub(1) as i32)
        }
    };
    let capped = base.min(cfg.max_backoff_ms as f64);

    let ms = if cfg.jitter {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos();
        // factor in [0.75, 1.25]
        let factor = 0.75 + f64::from(nanos % 1_000_000) / 1_000_000.0 * 0.5;
        capped * factor
    } else {
        capped
    };

    Duration::from_millis(ms as u64)
}

/// Returns `true` if `err` is a transient failure that is safe to retry.
///
/// | Error variant     | Retried |
/// |-------------------|---------|
/// | `RpcError`        | yes     |
/// | `RpcClientError`  | yes     |
/// | `ConnectionError` | yes     |
/// | `QueueClosed`     | yes     |
/// | `DatabaseError`   | yes     |
/// | `InternalError`   | yes     |
/// | `BlockNotFound`   | no      |
/// | `DecodingError`   | no      |
/// | `ConfigError`     | no      |
/// | everything else   | no      |
#[must_use]
pub fn is_transient(err: &SwapIndexerError) -> bool {
    matches!(
        err,
        SwapIndexerError::RpcError(_)
            | SwapIndexerError::RpcClientError(_)
            | SwapIndexerError::ConnectionError(_)
            | SwapIndexerError::QueueClosed(_)
            | SwapIndexerError::DatabaseError(_)
            | SwapIndexerError::InternalError(_)
    )
}

/// Calls `op` until it succeeds, fails permanently, or the policy runs out.
///
/// Permanent errors (per `is_transient`) return immediately. Exhaustion yields
/// `SwapIndexerError::RetryExhausted` carrying the attempt count and the last
/// error's message.
///
/// # Errors
///
/// The first permanent error, or `RetryExhausted`.
pub async fn retry_with_backoff<F, Fut, T>(cfg: &RetryConfig, label: &str, op: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    let mut last_error = String::from("unknown");

    while attempt < cfg.max_attempts() {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if !is_transient(&err) => return Err(err),
            Err(err) => {
                last_error = err.to_string();
                if attempt >= cfg.max_attempts() {
                    break;
                }
                let delay = compute_backoff(cfg, attempt);
                tracing::warn!(
                    operation = label,
                    attempt,
                    max = cfg.max_attempts(),
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient failure, retrying"
                );
                sleep(delay).await;
            }
        }
    }

    Err(SwapIndexerError::RetryExhausted {
        attempts: attempt,
        last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_backoff_ms: 1,
            strategy: BackoffStrategy::Exponential { multiplier: 2.0 },
            max_backoff_ms: 10,
            jitter: false,
        }
    }

    #[test]
    fn test_linear_backoff_matches_node_policy() {
        let cfg = RetryConfig::node();
        assert_eq!(compute_backoff(&cfg, 1), Duration::from_millis(100));
        assert_eq!(compute_backoff(&cfg, 2), Duration::from_millis(200));
        assert_eq!(compute_backoff(&cfg, 3), Duration::from_millis(300));
    }

    #[test]
    fn test_exponential_backoff_matches_reconnect_policy() {
        let cfg = RetryConfig::reconnect();
        let delays: Vec<u128> = (1..=5).map(|a| compute_backoff(&cfg, a).as_millis()).collect();
        assert_eq!(delays, vec![1_000, 2_000, 4_000, 8_000, 16_000]);
    }

    #[test]
    fn test_fixed_backoff() {
        let cfg = RetryConfig::batch_insert();
        assert_eq!(compute_backoff(&cfg, 1), compute_backoff(&cfg, 3));
        assert_eq!(compute_backoff(&cfg, 3), Duration::from_secs(2));
    }

    #[test]
    fn test_backoff_capped() {
        let cfg = RetryConfig {
            max_backoff_ms: 500,
            initial_backoff_ms: 100,
            strategy: BackoffStrategy::Exponential { multiplier: 10.0 },
            ..RetryConfig::node()
        };
        assert_eq!(compute_backoff(&cfg, 4).as_millis(), 500);
    }

    #[test]
    fn test_jitter_stays_in_band() {
        let cfg = RetryConfig {
            jitter: true,
            ..RetryConfig::batch_insert()
        };
        let d = compute_backoff(&cfg, 1).as_millis();
        assert!((1_500..=2_500).contains(&d), "jittered delay out of band: {d}");
    }

    #[test]
    fn test_transient_classification() {
        assert!(is_transient(&SwapIndexerError::RpcError("timeout".into())));
        assert!(is_transient(&SwapIndexerError::QueueClosed("gone".into())));
        assert!(!is_transient(&SwapIndexerError::BlockNotFound(7)));
        assert!(!is_transient(&SwapIndexerError::DecodingError("bad".into())));
        assert!(!is_transient(&SwapIndexerError::ConfigError("missing".into())));
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result = retry_with_backoff(&fast(5), "test", || {
            let counter = counter.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if n <= 2 {
                    Err(SwapIndexerError::RpcError("transient".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<()> = retry_with_backoff(&fast(5), "test", || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(SwapIndexerError::BlockNotFound(1))
            }
        })
        .await;

        assert!(matches!(result, Err(SwapIndexerError::BlockNotFound(1))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_reports_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<()> = retry_with_backoff(&fast(3), "test", || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(SwapIndexerError::ConnectionError("reset".into()))
            }
        })
        .await;

        match result {
            Err(SwapIndexerError::RetryExhausted { attempts, last_error }) => {
                assert_eq!(attempts, 4);
                assert!(last_error.contains("reset"));
            }
            other => panic!("expected RetryExhausted, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
