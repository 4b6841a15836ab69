//! Durable, acknowledgement-based work queue.
//!
//! Delivery is at-least-once: an item leaves the queue only when acked. A
//! nack with requeue, a lost connection or an expired claim hands it back,
//! and the next delivery of that item is flagged `redelivered`.

pub mod memory;
pub mod postgres;

pub use memory::InMemoryWorkQueue;
pub use postgres::PgWorkQueue;

use async_trait::async_trait;

use crate::types::work::WorkItem;
use crate::utils::error::Result;

/// One claimed item. Exactly one consumer holds a given tag at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub tag: u64,
    pub payload: Vec<u8>,
    pub redelivered: bool,
}

#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Enqueues the JSON encoding of `item`.
    async fn publish(&self, item: &WorkItem) -> Result<()>;

    /// Waits for the next delivery within the prefetch limit.
    ///
    /// Dropping the returned future never loses an item: either the item was
    /// handed out or it is still queued.
    ///
    /// # Errors
    ///
    /// `QueueClosed` when the connection is gone; callers should `reconnect`.
    async fn consume(&self) -> Result<Delivery>;

    async fn ack(&self, tag: u64) -> Result<()>;

    /// Rejects a delivery. With `requeue` it goes back to the head of the
    /// queue, otherwise it is discarded.
    async fn nack(&self, tag: u64, requeue: bool) -> Result<()>;

    /// Items waiting to be delivered.
    async fn depth(&self) -> Result<u64>;

    /// Caps unacknowledged deliveries held by this process.
    async fn set_prefetch(&self, prefetch: u16) -> Result<()>;

    /// Re-establishes the connection after `QueueClosed`.
    async fn reconnect(&self) -> Result<()>;
}
