pub mod call;
pub mod client;

use async_trait::async_trait;

pub use client::JsonRpcNodeClient;

use crate::error::Result;
use crate::model::Block;
use crate::model::Transaction;

/// Read-only view of the blockchain node
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// Current chain tip, may lag slightly behind the network
    async fn height(&self) -> Result<u64>;

    /// Exactly one of `height` or `hash` must be given.
    /// `None` when the node reports the block as not found.
    async fn get_block(
        &self,
        height: Option<u64>,
        hash: Option<&str>,
    ) -> Result<Option<Block>>;

    /// Fetch a transaction and decode it as `kind`, the tag taken from the block
    async fn get_transaction(
        &self,
        hash: &str,
        kind: &str,
    ) -> Result<Transaction>;

    async fn get_block_at(
        &self,
        height: u64,
    ) -> Result<Option<Block>> {
        self.get_block(Some(height), None).await
    }
}
