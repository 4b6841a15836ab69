//! Websocket fan-out channel. The websocket server subscribes; the pipeline
//! never waits on it.

use std::sync::Arc;
use tokio::sync::broadcast;

use crate::types::swap::SwapLog;
use crate::types::traits::SwapBroadcaster;

#[derive(Debug, Clone)]
pub struct ChannelBroadcaster {
    sender: broadcast::Sender<Arc<Vec<SwapLog>>>,
}

impl ChannelBroadcaster {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Vec<SwapLog>>> {
        self.sender.subscribe()
    }
}

impl Default for ChannelBroadcaster {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl SwapBroadcaster for ChannelBroadcaster {
    fn broadcast_swaps(&self, swaps: &[SwapLog]) {
        if swaps.is_empty() {
            return;
        }
        // No subscribers is fine.
        let _ = self.sender.send(Arc::new(swaps.to_vec()));
    }
}
