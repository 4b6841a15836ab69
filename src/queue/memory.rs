//! In-process queue with broker semantics, for tests and single-node runs.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

use super::{Delivery, WorkQueue};
use crate::types::work::WorkItem;
use crate::utils::error::{Result, SwapIndexerError};

#[derive(Debug)]
struct Pending {
    payload: Vec<u8>,
    redelivered: bool,
}

#[derive(Debug)]
struct State {
    ready: VecDeque<Pending>,
    unacked: HashMap<u64, Pending>,
    next_tag: u64,
    prefetch: u16,
    closed: bool,
}

/// `Mutex<VecDeque>` plus a [`Notify`] for waiting consumers.
///
/// A prefetch of 0 means unlimited.
#[derive(Debug)]
pub struct InMemoryWorkQueue {
    state: Mutex<State>,
    notify: Notify,
}

impl InMemoryWorkQueue {
    #[must_use]
    pub fn new(prefetch: u16) -> Self {
        Self {
            state: Mutex::new(State {
                ready: VecDeque::new(),
                unacked: HashMap::new(),
                next_tag: 1,
                prefetch,
                closed: false,
            }),
            notify: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Simulates a dropped connection: unacked deliveries return to the head
    /// of the queue and consumers see `QueueClosed` until `reconnect`.
    pub fn close(&self) {
        {
            let mut state = self.lock();
            state.closed = true;
            let mut tags: Vec<u64> = state.unacked.keys().copied().collect();
            tags.sort_unstable_by(|a, b| b.cmp(a));
            for tag in tags {
                if let Some(mut pending) = state.unacked.remove(&tag) {
                    pending.redelivered = true;
                    state.ready.push_front(pending);
                }
            }
        }
        self.notify.notify_waiters();
    }

    #[must_use]
    pub fn unacked(&self) -> usize {
        self.lock().unacked.len()
    }

    #[must_use]
    pub fn prefetch(&self) -> u16 {
        self.lock().prefetch
    }

    fn settle(&self, tag: u64) -> Result<Pending> {
        self.lock()
            .unacked
            .remove(&tag)
            .ok_or_else(|| SwapIndexerError::QueueError(format!("unknown delivery tag {tag}")))
    }
}

impl Default for InMemoryWorkQueue {
    fn default() -> Self {
        Self::new(0)
    }
}

#[async_trait]
impl WorkQueue for InMemoryWorkQueue {
    async fn publish(&self, item: &WorkItem) -> Result<()> {
        let payload = item.to_json()?;
        self.lock().ready.push_back(Pending {
            payload,
            redelivered: false,
        });
        self.notify.notify_waiters();
        Ok(())
    }

    async fn consume(&self) -> Result<Delivery> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if state.closed {
                    return Err(SwapIndexerError::QueueClosed("in-memory queue closed".into()));
                }
                let has_credit =
                    state.prefetch == 0 || state.unacked.len() < usize::from(state.prefetch);
                if has_credit && let Some(pending) = state.ready.pop_front() {
                    let tag = state.next_tag;
                    state.next_tag += 1;
                    let delivery = Delivery {
                        tag,
                        payload: pending.payload.clone(),
                        redelivered: pending.redelivered,
                    };
                    state.unacked.insert(tag, pending);
                    return Ok(delivery);
                }
            }

            notified.await;
        }
    }

    async fn ack(&self, tag: u64) -> Result<()> {
        self.settle(tag)?;
        self.notify.notify_waiters();
        Ok(())
    }

    async fn nack(&self, tag: u64, requeue: bool) -> Result<()> {
        let mut pending = self.settle(tag)?;
        if requeue {
            pending.redelivered = true;
            self.lock().ready.push_front(pending);
        }
        self.notify.notify_waiters();
        Ok(())
    }

    async fn depth(&self) -> Result<u64> {
        Ok(self.lock().ready.len() as u64)
    }

    async fn set_prefetch(&self, prefetch: u16) -> Result<()> {
        self.lock().prefetch = prefetch;
        self.notify.notify_waiters();
        Ok(())
    }

    async fn reconnect(&self) -> Result<()> {
        self.lock().closed = false;
        self.notify.notify_waiters();
        Ok(())
    }
}
