//! Live block ingestion.

pub mod block_listener;

pub use block_listener::BlockListener;
