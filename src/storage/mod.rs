pub mod in_memory;
pub mod migration;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use tracing::instrument;

pub use in_memory::InMemoryGraphStore;
pub use postgres::PostgresGraphStore;

use crate::config::Config;
use crate::error::Result;
use crate::model::BlockRecords;
use crate::model::FollowerInfo;
use crate::model::HotspotRecord;
use crate::storage::postgres::make_postgres_pool;
use crate::storage::postgres::PostgresStorage;

/// Graph-oriented document store the follower writes into.
///
/// Vertices are `accounts` and `hotspots`, edges are `payments` and
/// `poc_receipts`, plus the singleton `follower_info` checkpoint. Every write
/// is an upsert keyed by the record's `_key`.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Create collections and indexes when missing, safe to call on every start
    async fn ensure_collections(&self) -> Result<()>;

    async fn load_follower_info(&self) -> Result<Option<FollowerInfo>>;

    /// Replace the checkpoint document
    async fn save_follower_info(
        &self,
        info: &FollowerInfo,
    ) -> Result<()>;

    /// Write one block's records, all or nothing. Existing keys are left untouched.
    async fn commit_block(
        &self,
        records: &BlockRecords,
    ) -> Result<()>;

    /// Inventory upsert, each record replaces any stored document with the same key
    async fn replace_hotspots(
        &self,
        hotspots: &[HotspotRecord],
    ) -> Result<()>;
}

#[instrument(level = "info", skip(config))]
pub async fn make_graph_store(
    engine_name: &str,
    config: &Config,
) -> Result<Arc<PostgresGraphStore>> {
    let pool = make_postgres_pool(engine_name, &config.storage_postgres).await?;
    info!("postgres::created");

    let store = PostgresGraphStore::new(pool);
    store.health_check().await?;

    Ok(Arc::new(store))
}
