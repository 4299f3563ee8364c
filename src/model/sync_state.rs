use serde::Deserialize;
use serde::Serialize;

use crate::constants::FOLLOWER_INFO_KEY;

/// Persisted checkpoint, the only state that survives a restart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowerInfo {
    /// Chain tip at the last poll
    pub height: u64,
    /// Oldest block this follower will ever process
    pub first_block: u64,
    /// Next block to process
    pub sync_height: u64,
    /// Generation of the last applied inventory snapshot
    pub inventory_height: u64,
}

impl FollowerInfo {
    pub const KEY: &'static str = FOLLOWER_INFO_KEY;
}

/// In-process view of the checkpoint. `sync_height` only moves forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncState {
    info: FollowerInfo,
}

impl SyncState {
    pub fn resume(info: FollowerInfo) -> Self {
        let mut info = info;
        info.sync_height = info.sync_height.max(info.first_block);
        Self { info }
    }

    /// Fresh checkpoint right after first-block discovery
    pub fn start_at(
        first_block: u64,
        height: u64,
    ) -> Self {
        Self {
            info: FollowerInfo {
                height,
                first_block,
                sync_height: first_block,
                inventory_height: 0,
            },
        }
    }

    pub fn info(&self) -> FollowerInfo { self.info }

    pub fn sync_height(&self) -> u64 { self.info.sync_height }

    pub fn height(&self) -> u64 { self.info.height }

    pub fn first_block(&self) -> u64 { self.info.first_block }

    pub fn inventory_height(&self) -> u64 { self.info.inventory_height }

    pub fn is_caught_up(&self) -> bool { self.info.sync_height >= self.info.height }

    pub fn set_height(
        &mut self,
        height: u64,
    ) {
        self.info.height = height;
    }

    /// Mark the block at `sync_height` as committed
    pub fn advance(&mut self) -> u64 {
        self.info.sync_height += 1;
        self.info.sync_height
    }

    /// Generations never move backwards, a snapshot without one keeps the current marker
    pub fn record_inventory(
        &mut self,
        generation: u64,
    ) {
        self.info.inventory_height = self.info.inventory_height.max(generation);
    }

    /// Blocks synced since the later of the last applied snapshot and `last_attempt`
    pub fn blocks_since_inventory(
        &self,
        last_attempt: u64,
    ) -> u64 {
        self.info.sync_height.saturating_sub(self.info.inventory_height.max(last_attempt))
    }
}
