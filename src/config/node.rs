use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// JSON-RPC endpoint of the blockchain node
    pub address: String,
    pub timeout_ms: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            address: "http://127.0.0.1:4467".to_string(),
            timeout_ms: 30_000,
        }
    }
}
