use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;

use crate::config::load_config;
use crate::config::Config;
use crate::engine::follower::Follower;
use crate::error::Result;
use crate::inventory::InventoryReconciler;
use crate::inventory::InventorySource;
use crate::inventory::LocalInventory;
use crate::rpc::JsonRpcNodeClient;
use crate::storage::make_graph_store;
use crate::tracing::setup_tracing;

pub const ENGINE_NAME: &str = "tabi";

/// Process wiring around the follower: config, logging, store, node client
/// and shutdown on ctrl-c
pub struct Tabi {
    pub config: Config,
}

impl Tabi {
    pub async fn run(config_path: impl AsRef<Path>) -> Result<()> {
        let config = load_config(config_path)?;

        let _guards = setup_tracing(ENGINE_NAME, &config.logging)?;
        info!("Starting Tabi (تابع): The Follower");

        Tabi { config }.start().await
    }

    async fn start(self) -> Result<()> {
        let store = make_graph_store(ENGINE_NAME, &self.config).await?;
        info!("tabi::run::graph_store::created");

        let node = Arc::new(JsonRpcNodeClient::new(&self.config.node)?);
        info!("tabi::run::node_client::{}", node.address());

        let cancel = CancellationToken::new();
        let mut follower = Follower::new(node, store, self.config.follower.clone(), cancel.clone());

        let feed: Option<Arc<dyn InventorySource>> = InventoryReconciler::from_config(&self.config.inventory)?
            .map(|reconciler| Arc::new(reconciler) as Arc<dyn InventorySource>);
        if let Some(feed) = &feed {
            follower = follower.with_inventory_feed(feed.clone());
        }

        if self.config.inventory.bootstrap {
            let source = match &self.config.inventory.local_path {
                Some(path) => Some(Arc::new(LocalInventory::new(path)) as Arc<dyn InventorySource>),
                None => feed.clone(),
            };
            follower = follower.with_bootstrap(source);
        }

        let mut handle = tokio::spawn(async move { follower.run().await });

        tokio::select! {
            result = &mut handle => {
                let result = result?;
                if let Err(e) = &result {
                    error!("tabi::follower_stopped::{}", e);
                }
                result
            },
            _ = tokio::signal::ctrl_c() => {
                info!("tabi::shutdown_signal_received");
                cancel.cancel();
                handle.await??;
                info!("tabi::shutdown_complete");
                Ok(())
            },
        }
    }
}
