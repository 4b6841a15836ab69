//! Elastic worker pool.
//!
//! Membership is a map from worker id to cancellation token behind one
//! mutex. Growing starts new workers with fresh ids; shrinking cancels the
//! highest ids. Running workers are never restarted.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::worker::{Worker, WorkerContext};
use crate::config::PoolConfig;
use crate::utils::error::Result;
use crate::utils::logging;

struct PoolState {
    ctx: Arc<WorkerContext>,
    config: PoolConfig,
    workers: Mutex<BTreeMap<usize, CancellationToken>>,
    next_id: AtomicUsize,
    prefetch: AtomicU16,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl PoolState {
    fn members(&self) -> MutexGuard<'_, BTreeMap<usize, CancellationToken>> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cheap to clone; clones share the same pool.
#[derive(Clone)]
pub struct WorkerPool {
    state: Arc<PoolState>,
}

impl WorkerPool {
    /// Creates an empty pool. Workers derive their tokens from `shutdown`.
    #[must_use]
    pub fn new(ctx: Arc<WorkerContext>, config: PoolConfig, shutdown: CancellationToken) -> Self {
        let prefetch = config.baseline_prefetch;
        Self {
            state: Arc::new(PoolState {
                ctx,
                config,
                workers: Mutex::new(BTreeMap::new()),
                next_id: AtomicUsize::new(0),
                prefetch: AtomicU16::new(prefetch),
                shutdown,
                tracker: TaskTracker::new(),
            }),
        }
    }

    /// Applies the baseline prefetch and starts the baseline workers.
    ///
    /// # Errors
    ///
    /// Fails when the queue rejects the prefetch setting.
    pub async fn start(&self) -> Result<()> {
        let prefetch = self.state.config.baseline_prefetch;
        self.state.ctx.queue.set_prefetch(prefetch).await?;
        self.state.prefetch.store(prefetch, Ordering::Release);
        self.resize(self.state.config.baseline_workers);
        Ok(())
    }

    /// Grows or shrinks to `target` workers in one step. Returns the size
    /// before the change.
    pub fn resize(&self, target: usize) -> usize {
        let mut members = self.state.members();
        let before = members.len();

        while members.len() < target {
            let id = self.state.next_id.fetch_add(1, Ordering::Relaxed);
            let token = self.state.shutdown.child_token();
            members.insert(id, token.clone());
            self.spawn_worker(id, token);
        }
        while members.len() > target {
            if let Some((_, token)) = members.pop_last() {
                token.cancel();
            }
        }

        before
    }

    fn spawn_worker(&self, id: usize, token: CancellationToken) {
        let worker = Worker::new(id, self.state.ctx.clone(), token);
        let state = self.state.clone();
        self.state.tracker.spawn(async move {
            worker.run().await;
            // Ids are never reused, so this only removes this worker.
            state.members().remove(&id);
        });
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.state.members().len()
    }

    #[must_use]
    pub fn worker_ids(&self) -> Vec<usize> {
        self.state.members().keys().copied().collect()
    }

    /// Cancellation token of a live worker.
    #[must_use]
    pub fn worker_token(&self, id: usize) -> Option<CancellationToken> {
        self.state.members().get(&id).cloned()
    }

    #[must_use]
    pub fn prefetch(&self) -> u16 {
        self.state.prefetch.load(Ordering::Acquire)
    }

    /// One monitor sample: read depth, pick the step, apply prefetch and size.
    /// Returns the resulting `(workers, prefetch)`.
    ///
    /// # Errors
    ///
    /// Fails when depth cannot be read or prefetch cannot be applied; the
    /// pool is left unchanged.
    pub async fn monitor_tick(&self) -> Result<(usize, u16)> {
        let depth = self.state.ctx.queue.depth().await?;
        let (workers, prefetch) = self.state.config.target_for_depth(depth);

        if prefetch != self.prefetch() {
            self.state.ctx.queue.set_prefetch(prefetch).await?;
            self.state.prefetch.store(prefetch, Ordering::Release);
        }
        let before = self.resize(workers);
        logging::log_pool_resize(depth, before, workers, prefetch);
        Ok((workers, prefetch))
    }

    /// Samples depth every monitor interval until shutdown.
    #[must_use]
    pub fn spawn_monitor(&self) -> JoinHandle<()> {
        let pool = self.clone();
        let interval = self.state.config.monitor_interval();
        let shutdown = self.state.shutdown.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = pool.monitor_tick().await {
                            logging::log_error("Pool monitor", &e.to_string());
                        }
                    }
                }
            }
        })
    }

    /// Cancels every worker and waits for them to hand back in-flight items.
    pub async fn shutdown(&self) {
        self.state.shutdown.cancel();
        self.state.tracker.close();
        self.state.tracker.wait().await;
        tracing::info!("Worker pool stopped");
    }
}
