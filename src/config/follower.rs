use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_BLOCK_INVENTORY_SIZE;
use crate::constants::DEFAULT_IDLE_INTERVAL_MS;
use crate::constants::DEFAULT_INVENTORY_REFRESH_BLOCKS;
use crate::constants::DEFAULT_MAX_BLOCK_ATTEMPTS;
use crate::constants::DEFAULT_RETRY_BACKOFF_MS;
use crate::constants::DEFAULT_TRANSACTION_WORKERS;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FollowerConfig {
    /// How far behind the tip a fresh follower reaches back
    pub block_inventory_size: u64,
    /// Height the first-block walk starts from, defaults to the chain tip
    pub discovery_start_height: Option<u64>,
    pub idle_interval_ms: u64,
    pub retry_backoff_ms: u64,
    pub max_block_attempts: usize,
    pub inventory_refresh_blocks: u64,
    /// Concurrent transaction fetches inside one block, 1 keeps it sequential
    pub transaction_workers: usize,
}

impl Default for FollowerConfig {
    fn default() -> Self {
        Self {
            block_inventory_size: DEFAULT_BLOCK_INVENTORY_SIZE,
            discovery_start_height: None,
            idle_interval_ms: DEFAULT_IDLE_INTERVAL_MS,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
            max_block_attempts: DEFAULT_MAX_BLOCK_ATTEMPTS,
            inventory_refresh_blocks: DEFAULT_INVENTORY_REFRESH_BLOCKS,
            transaction_workers: DEFAULT_TRANSACTION_WORKERS,
        }
    }
}

impl FollowerConfig {
    pub fn idle_interval(&self) -> Duration { Duration::from_millis(self.idle_interval_ms) }

    pub fn retry_backoff(&self) -> Duration { Duration::from_millis(self.retry_backoff_ms) }
}
