//! Configuration management for the swap indexer.
//!
//! `SwapIndexerConfigBuilder` follows the usual fluent `with_*` pattern and
//! validates required fields in `build()`. `SwapIndexerConfig::from_env`
//! reads the same settings from the process environment.

use crate::telemetry::TelemetryConfig;
use crate::utils::error::{Result, SwapIndexerError};
use serde::{Deserialize, Serialize};
use solana_sdk::commitment_config::CommitmentConfig;
use std::time::Duration;

/// Commitment level used for subscriptions and RPC reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CommitmentLevel {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

impl CommitmentLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::Confirmed => "confirmed",
            Self::Finalized => "finalized",
        }
    }

    fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "processed" => Ok(Self::Processed),
            "confirmed" => Ok(Self::Confirmed),
            "finalized" => Ok(Self::Finalized),
            other => Err(SwapIndexerError::ConfigError(format!(
                "unknown commitment level '{other}'"
            ))),
        }
    }
}

impl From<CommitmentLevel> for CommitmentConfig {
    fn from(level: CommitmentLevel) -> Self {
        match level {
            CommitmentLevel::Processed => CommitmentConfig::processed(),
            CommitmentLevel::Confirmed => CommitmentConfig::confirmed(),
            CommitmentLevel::Finalized => CommitmentConfig::finalized(),
        }
    }
}

/// How the delay between attempts grows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BackoffStrategy {
    /// Same delay before every retry.
    Fixed,
    /// `initial * attempt`.
    Linear,
    /// `initial * multiplier^(attempt - 1)`.
    Exponential { multiplier: f64 },
}

/// Retry policy shared by the node client, worker reconnects and batch inserts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// Base delay in milliseconds.
    pub initial_backoff_ms: u64,
    /// Growth of the delay between attempts.
    pub strategy: BackoffStrategy,
    /// Upper bound on any single delay.
    pub max_backoff_ms: u64,
    /// Apply +/-25% jitter to each delay.
    pub jitter: bool,
}

impl RetryConfig {
    /// Node client policy: 3 retries, 100ms * attempt.
    #[must_use]
    pub fn node() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 100,
            strategy: BackoffStrategy::Linear,
            max_backoff_ms: 1_000,
            jitter: false,
        }
    }

    /// Worker reconnect policy: 5 attempts, exponential from 1s.
    #[must_use]
    pub fn reconnect() -> Self {
        Self {
            max_retries: 4,
            initial_backoff_ms: 1_000,
            strategy: BackoffStrategy::Exponential { multiplier: 2.0 },
            max_backoff_ms: 16_000,
            jitter: false,
        }
    }

    /// Batch insert policy: 3 retries, fixed 2s.
    #[must_use]
    pub fn batch_insert() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 2_000,
            strategy: BackoffStrategy::Fixed,
            max_backoff_ms: 2_000,
            jitter: false,
        }
    }

    /// Total number of attempts this policy allows.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::node()
    }
}

/// One row of the autoscaling table: when queue depth is strictly greater
/// than `min_depth`, run `workers` workers with `prefetch` credits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingStep {
    pub min_depth: u64,
    pub workers: usize,
    pub prefetch: u16,
}

/// Worker pool sizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Size the pool starts at and falls back to when the queue is shallow.
    pub baseline_workers: usize,
    /// Prefetch credits at baseline size.
    pub baseline_prefetch: u16,
    /// How often the monitor samples queue depth.
    pub monitor_interval_secs: u64,
    /// Steps, checked from the deepest threshold down.
    pub steps: Vec<ScalingStep>,
}

impl PoolConfig {
    /// Maps a queue depth to `(workers, prefetch)`.
    #[must_use]
    pub fn target_for_depth(&self, depth: u64) -> (usize, u16) {
        let mut steps = self.steps.clone();
        steps.sort_by(|a, b| b.min_depth.cmp(&a.min_depth));
        steps
            .iter()
            .find(|step| depth > step.min_depth)
            .map_or((self.baseline_workers, self.baseline_prefetch), |step| {
                (step.workers, step.prefetch)
            })
    }

    #[must_use]
    pub fn monitor_interval(&self) -> Duration {
        Duration::from_secs(self.monitor_interval_secs)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            baseline_workers: 500,
            baseline_prefetch: 500,
            monitor_interval_secs: 10,
            steps: vec![
                ScalingStep { min_depth: 1500, workers: 2500, prefetch: 2000 },
                ScalingStep { min_depth: 1000, workers: 2000, prefetch: 1500 },
                ScalingStep { min_depth: 750, workers: 1500, prefetch: 1000 },
                ScalingStep { min_depth: 500, workers: 1000, prefetch: 750 },
            ],
        }
    }
}

/// Block listener timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerConfig {
    /// Delay before the very first connect attempt.
    pub initial_delay_ms: u64,
    /// Delay after any connection error or disconnect.
    pub reconnect_delay_ms: u64,
    pub commitment: CommitmentLevel,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1_000,
            reconnect_delay_ms: 5_000,
            commitment: CommitmentLevel::Confirmed,
        }
    }
}

/// Which work queue implementation backs the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QueueBackend {
    #[default]
    Postgres,
    Memory,
}

/// Work queue settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    pub backend: QueueBackend,
    /// Logical queue name; rows of different queues share one table.
    pub name: String,
    /// Claimed but unacknowledged items become visible again after this long.
    pub visibility_timeout_secs: u64,
    /// Sleep between claim attempts when the queue is empty.
    pub poll_interval_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: QueueBackend::Postgres,
            name: "swap_blocks".to_string(),
            visibility_timeout_secs: 300,
            poll_interval_ms: 250,
        }
    }
}

/// Configuration for a swap indexer instance.
///
/// Use [`SwapIndexerConfigBuilder`] or [`SwapIndexerConfig::from_env`] to
/// construct one.
#[derive(Debug, Clone)]
pub struct SwapIndexerConfig {
    /// HTTP JSON-RPC endpoints; backfill round-robins across them.
    pub rpc_urls: Vec<String>,
    /// WebSocket endpoint used for `blockSubscribe`.
    pub ws_url: String,
    /// Postgres connection string.
    pub database_url: String,
    pub commitment: CommitmentLevel,
    pub pool: PoolConfig,
    pub node_retry: RetryConfig,
    pub reconnect_retry: RetryConfig,
    pub insert_retry: RetryConfig,
    pub listener: ListenerConfig,
    pub queue: QueueConfig,
    pub telemetry: TelemetryConfig,
}

impl SwapIndexerConfig {
    /// Loads configuration from environment variables.
    ///
    /// Required: `RPC_URLS` (comma separated), `WS_URL`, `DATABASE_URL`.
    /// Optional: `COMMITMENT`, `QUEUE_BACKEND`, `QUEUE_NAME`,
    /// `BASELINE_WORKERS`, `BASELINE_PREFETCH`, `MONITOR_INTERVAL_SECS`,
    /// `RUST_LOG`.
    ///
    /// # Errors
    ///
    /// Returns `SwapIndexerError::ConfigError` when a required variable is
    /// missing or a value does not parse.
    pub fn from_env() -> Result<Self> {
        let rpc_urls = required_env("RPC_URLS")?;
        let mut builder = SwapIndexerConfigBuilder::new()
            .with_rpc_urls(
                rpc_urls
                    .split(',')
                    .map(str::trim)
                    .filter(|url| !url.is_empty())
                    .map(String::from)
                    .collect(),
            )
            .with_ws(required_env("WS_URL")?)
            .with_database(required_env("DATABASE_URL")?);

        if let Ok(commitment) = std::env::var("COMMITMENT") {
            builder = builder.with_commitment(CommitmentLevel::parse(&commitment)?);
        }
        if let Ok(backend) = std::env::var("QUEUE_BACKEND") {
            let backend = match backend.to_ascii_lowercase().as_str() {
                "postgres" => QueueBackend::Postgres,
                "memory" => QueueBackend::Memory,
                other => {
                    return Err(SwapIndexerError::ConfigError(format!(
                        "unknown queue backend '{other}'"
                    )));
                }
            };
            builder = builder.with_queue_backend(backend);
        }
        if let Ok(name) = std::env::var("QUEUE_NAME") {
            builder = builder.with_queue_name(name);
        }
        if let Some(workers) = parse_env::<usize>("BASELINE_WORKERS")? {
            builder = builder.with_baseline_workers(workers);
        }
        if let Some(prefetch) = parse_env::<u16>("BASELINE_PREFETCH")? {
            builder = builder.with_baseline_prefetch(prefetch);
        }
        if let Some(secs) = parse_env::<u64>("MONITOR_INTERVAL_SECS")? {
            builder = builder.with_monitor_interval(secs);
        }
        if let Ok(filter) = std::env::var("RUST_LOG") {
            builder = builder.with_log_filter(filter);
        }

        builder.build()
    }

    /// Primary RPC endpoint.
    #[must_use]
    pub fn rpc_url(&self) -> &str {
        self.rpc_urls.first().map_or("", String::as_str)
    }

    /// Fails for the in-memory queue, whose items die with the process.
    ///
    /// # Errors
    ///
    /// `ConfigError` naming `operation` when the backend is `Memory`.
    pub fn require_durable_queue(&self, operation: &str) -> Result<()> {
        match self.queue.backend {
            QueueBackend::Postgres => Ok(()),
            QueueBackend::Memory => Err(SwapIndexerError::ConfigError(format!(
                "{operation} publishes to the work queue and needs QUEUE_BACKEND=postgres"
            ))),
        }
    }
}

fn required_env(name: &str) -> Result<String> {
    std::env::var(name).map_err(|e| SwapIndexerError::ConfigError(format!("{name}: {e}")))
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| SwapIndexerError::ConfigError(format!("{key} has invalid value '{raw}'"))),
        Err(_) => Ok(None),
    }
}

/// Builder for `SwapIndexerConfig`.
///
/// # Example
///
/// ```
/// use solana_swap_indexer::SwapIndexerConfigBuilder;
///
/// let config = SwapIndexerConfigBuilder::new()
///     .with_rpc("http://127.0.0.1:8899")
///     .with_ws("ws://127.0.0.1:8900")
///     .with_database("postgresql://localhost/swaps")
///     .with_baseline_workers(8)
///     .build()
///     .unwrap();
/// assert_eq!(config.pool.baseline_workers, 8);
/// ```
#[derive(Debug, Default)]
pub struct SwapIndexerConfigBuilder {
    rpc_urls: Vec<String>,
    ws_url: Option<String>,
    database_url: Option<String>,
    commitment: CommitmentLevel,
    pool: PoolConfig,
    node_retry: Option<RetryConfig>,
    reconnect_retry: Option<RetryConfig>,
    insert_retry: Option<RetryConfig>,
    listener: ListenerConfig,
    queue: QueueConfig,
    telemetry: TelemetryConfig,
}

impl SwapIndexerConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one RPC endpoint.
    #[must_use]
    pub fn with_rpc(mut self, url: impl Into<String>) -> Self {
        self.rpc_urls.push(url.into());
        self
    }

    /// Replaces the RPC endpoint list.
    #[must_use]
    pub fn with_rpc_urls(mut self, urls: Vec<String>) -> Self {
        self.rpc_urls = urls;
        self
    }

    #[must_use]
    pub fn with_ws(mut self, url: impl Into<String>) -> Self {
        self.ws_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_database(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_commitment(mut self, commitment: CommitmentLevel) -> Self {
        self.commitment = commitment;
        self.listener.commitment = commitment;
        self
    }

    #[must_use]
    pub fn with_baseline_workers(mut self, workers: usize) -> Self {
        self.pool.baseline_workers = workers;
        self
    }

    #[must_use]
    pub fn with_baseline_prefetch(mut self, prefetch: u16) -> Self {
        self.pool.baseline_prefetch = prefetch;
        self
    }

    #[must_use]
    pub fn with_monitor_interval(mut self, secs: u64) -> Self {
        self.pool.monitor_interval_secs = secs;
        self
    }

    #[must_use]
    pub fn with_scaling_steps(mut self, steps: Vec<ScalingStep>) -> Self {
        self.pool.steps = steps;
        self
    }

    #[must_use]
    pub fn with_node_retry(mut self, retry: RetryConfig) -> Self {
        self.node_retry = Some(retry);
        self
    }

    #[must_use]
    pub fn with_reconnect_retry(mut self, retry: RetryConfig) -> Self {
        self.reconnect_retry = Some(retry);
        self
    }

    #[must_use]
    pub fn with_insert_retry(mut self, retry: RetryConfig) -> Self {
        self.insert_retry = Some(retry);
        self
    }

    #[must_use]
    pub fn with_listener(mut self, listener: ListenerConfig) -> Self {
        self.listener = listener;
        self
    }

    #[must_use]
    pub fn with_queue_backend(mut self, backend: QueueBackend) -> Self {
        self.queue.backend = backend;
        self
    }

    #[must_use]
    pub fn with_queue_name(mut self, name: impl Into<String>) -> Self {
        self.queue.name = name.into();
        self
    }

    #[must_use]
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.telemetry.log_filter = filter.into();
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns `SwapIndexerError::ConfigError` if no RPC endpoint, WebSocket
    /// URL or database URL was provided, or the pool baseline is zero.
    pub fn build(self) -> Result<SwapIndexerConfig> {
        if self.rpc_urls.is_empty() {
            return Err(SwapIndexerError::ConfigError(
                "at least one RPC URL is required".to_string(),
            ));
        }
        let ws_url = self
            .ws_url
            .ok_or_else(|| SwapIndexerError::ConfigError("WebSocket URL is required".to_string()))?;
        let database_url = self
            .database_url
            .ok_or_else(|| SwapIndexerError::ConfigError("database URL is required".to_string()))?;
        if self.pool.baseline_workers == 0 {
            return Err(SwapIndexerError::ConfigError(
                "baseline worker count must be positive".to_string(),
            ));
        }

        Ok(SwapIndexerConfig {
            rpc_urls: self.rpc_urls,
            ws_url,
            database_url,
            commitment: self.commitment,
            pool: self.pool,
            node_retry: self.node_retry.unwrap_or_else(RetryConfig::node),
            reconnect_retry: self.reconnect_retry.unwrap_or_else(RetryConfig::reconnect),
            insert_retry: self.insert_retry.unwrap_or_else(RetryConfig::batch_insert),
            listener: self.listener,
            queue: self.queue,
            telemetry: self.telemetry,
        })
    }
}
