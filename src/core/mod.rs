pub mod backfill;
pub mod decoding;
pub mod execution;
pub mod indexer;
pub mod matchers;
pub mod swaps;
pub mod transfers;

pub use backfill::{BackfillReport, BackfillService};
pub use indexer::SwapIndexer;
pub use matchers::{ProtocolMatcher, ProtocolRegistry};
pub use swaps::SwapHandler;
pub use transfers::TransferReconstructor;
