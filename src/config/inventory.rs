use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    /// Endpoint returning the url of the current gateway inventory snapshot
    pub latest_url: Option<String>,
    /// Load the inventory into the hotspots collection once at startup
    pub bootstrap: bool,
    /// Local snapshot used for the startup load instead of the feed
    pub local_path: Option<String>,
    pub timeout_ms: u64,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            latest_url: None,
            bootstrap: false,
            local_path: None,
            timeout_ms: 120_000,
        }
    }
}
