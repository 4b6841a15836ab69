//! Node access and the elastic worker pool.

pub mod node_client;
pub mod pool;
pub mod processor;
pub mod worker;

pub use node_client::NodeClient;
pub use pool::WorkerPool;
pub use processor::BlockProcessor;
pub use worker::{Worker, WorkerContext};
