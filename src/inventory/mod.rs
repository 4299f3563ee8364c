pub mod geo;
pub mod reconciler;
pub mod snapshot;

use std::path::PathBuf;

use async_trait::async_trait;

pub use geo::geo_point;
pub use reconciler::InventoryReconciler;
pub use snapshot::load_local_inventory;
pub use snapshot::parse_snapshot;

use crate::error::Result;
use crate::model::HotspotRecord;

/// A full gateway inventory, ready to be applied with replace semantics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InventorySnapshot {
    pub records: Vec<HotspotRecord>,
    /// Block height the snapshot was cut at, 0 when unknown
    pub generation: u64,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InventorySource: Send + Sync {
    /// Short label for logs
    fn describe(&self) -> String;

    async fn fetch(&self) -> Result<InventorySnapshot>;
}

/// Snapshot file on disk, used for cold bootstrap
#[derive(Debug, Clone)]
pub struct LocalInventory {
    path: PathBuf,
}

impl LocalInventory {
    pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into() } }
}

#[async_trait]
impl InventorySource for LocalInventory {
    fn describe(&self) -> String { self.path.display().to_string() }

    async fn fetch(&self) -> Result<InventorySnapshot> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || load_local_inventory(&path)).await?
    }
}
