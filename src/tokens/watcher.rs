use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{Bridge, BridgeRegistry};
use crate::metrics;

/// Keeps the bridges' cached latest heights fresh
pub struct HeightWatcher {
    bridges: Arc<BridgeRegistry>,
    poll_interval: Duration,
}

impl HeightWatcher {
    pub fn new(bridges: Arc<BridgeRegistry>, poll_interval_ms: u64) -> Self {
        Self {
            bridges,
            poll_interval: Duration::from_millis(poll_interval_ms),
        }
    }

    /// Poll until a shutdown message arrives
    pub async fn run(&self, mut shutdown_rx: mpsc::Receiver<()>) -> eyre::Result<()> {
        info!(interval_ms = self.poll_interval.as_millis() as u64, "Height watcher started");
        loop {
            self.poll_once().await;
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Height watcher stopping");
                    return Ok(());
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    /// Refresh both endpoints once
    pub async fn poll_once(&self) {
        refresh(&self.bridges.src).await;
        refresh(&self.bridges.dst).await;
    }
}

async fn refresh(bridge: &Bridge) {
    let chain = &bridge.common().chain.block_chain;
    match bridge.get_latest_block_number().await {
        Ok(height) => {
            // Never move backwards on a lagging RPC node
            if height > bridge.latest_block_height() {
                bridge.set_latest_block_height(height);
                metrics::set_latest_height(chain, height);
                debug!(chain = %chain, height, "Latest height updated");
            }
        }
        Err(e) => {
            warn!(chain = %chain, error = %e, "Failed to refresh latest height");
        }
    }
}
