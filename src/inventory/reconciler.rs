use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::error;
use tracing::info;
use url::Url;

use crate::config::InventoryConfig;
use crate::err_with_loc;
use crate::error::InventoryError;
use crate::error::Result;
use crate::inventory::snapshot::parse_snapshot;
use crate::inventory::InventorySnapshot;
use crate::inventory::InventorySource;
use crate::utils::parse_inventory_generation;
use crate::utils::snapshot_file_name;

/// Body of the "latest inventories" endpoint, other keys are ignored
#[derive(Debug, Deserialize)]
struct LatestInventories {
    gateway_inventory: String,
}

/// Pulls the current gateway inventory from the published feed
#[derive(Debug, Clone)]
pub struct InventoryReconciler {
    latest_url: Url,
    http: reqwest::Client,
}

impl InventoryReconciler {
    pub fn new(
        latest_url: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let latest_url = Url::parse(latest_url).map_err(|e| {
            err_with_loc!(InventoryError::Fetch {
                url: latest_url.to_string(),
                reason: e.to_string(),
            })
        })?;
        let http = reqwest::Client::builder().timeout(timeout).build().map_err(|e| {
            err_with_loc!(InventoryError::Fetch {
                url: latest_url.to_string(),
                reason: e.to_string(),
            })
        })?;

        Ok(Self { latest_url, http })
    }

    /// `None` when no feed is configured
    pub fn from_config(config: &InventoryConfig) -> Result<Option<Self>> {
        config
            .latest_url
            .as_deref()
            .map(|url| Self::new(url, Duration::from_millis(config.timeout_ms)))
            .transpose()
    }

    async fn snapshot_url(&self) -> Result<Url> {
        let latest: LatestInventories = self
            .http
            .get(self.latest_url.clone())
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| self.fetch_error(&self.latest_url, e))?
            .json()
            .await
            .map_err(|e| self.fetch_error(&self.latest_url, e))?;

        // The feed may hand out relative links
        self.latest_url.join(&latest.gateway_inventory).map_err(|e| {
            err_with_loc!(InventoryError::Parse {
                source_name: self.latest_url.to_string(),
                reason: format!("bad gateway_inventory url {}: {}", latest.gateway_inventory, e),
            })
        })
    }

    fn fetch_error(
        &self,
        url: &Url,
        e: reqwest::Error,
    ) -> crate::Error {
        error!("inventory_fetch_failed::{}::{}", url, e);
        err_with_loc!(InventoryError::Fetch {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl InventorySource for InventoryReconciler {
    fn describe(&self) -> String { self.latest_url.to_string() }

    async fn fetch(&self) -> Result<InventorySnapshot> {
        let snapshot_url = self.snapshot_url().await?;

        let generation = snapshot_file_name(&snapshot_url)
            .and_then(parse_inventory_generation)
            .ok_or_else(|| {
                err_with_loc!(InventoryError::Parse {
                    source_name: snapshot_url.to_string(),
                    reason: "file name does not carry a generation".to_string(),
                })
            })?;

        info!("inventory_download::{}::generation::{}", snapshot_url, generation);
        let body = self
            .http
            .get(snapshot_url.clone())
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| self.fetch_error(&snapshot_url, e))?
            .bytes()
            .await
            .map_err(|e| self.fetch_error(&snapshot_url, e))?;

        let source_name = snapshot_url.to_string();
        let records = tokio::task::spawn_blocking(move || parse_snapshot(&body, &source_name)).await??;

        Ok(InventorySnapshot { records, generation })
    }
}
