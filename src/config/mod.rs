pub mod follower;
pub mod inventory;
pub mod log;
pub mod node;
pub mod storage;

use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use toml;
use tracing::debug;

pub use follower::FollowerConfig;
pub use inventory::InventoryConfig;
pub use log::LoggingConfig;
pub use node::NodeConfig;
pub use storage::StoragePostgresConfig;
pub use storage::TlsConfig;

use crate::err_with_loc;
use crate::error::ConfigError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub node: NodeConfig,
    pub storage_postgres: StoragePostgresConfig,
    pub follower: FollowerConfig,
    pub inventory: InventoryConfig,
    pub logging: LoggingConfig,
}

impl Config {
    pub fn from_toml_str(config_str: &str) -> crate::Result<Self> {
        toml::from_str(config_str).map_err(|e| err_with_loc!(ConfigError::ParseError(e.to_string())))
    }

    /// Environment variables (and `.env`) win over the file
    pub fn apply_env_overrides(&mut self) -> crate::Result<()> {
        if let Some(address) = env_value::<String>("NODE_ADDRESS")? {
            self.node.address = address;
        }
        if let Some(host) = env_value::<String>("POSTGRES_HOST")? {
            self.storage_postgres.host = host;
        }
        if let Some(port) = env_value::<u16>("POSTGRES_PORT")? {
            self.storage_postgres.port = port;
        }
        if let Some(user) = env_value::<String>("POSTGRES_USER")? {
            self.storage_postgres.user = user;
        }
        if let Some(password) = env_value::<String>("POSTGRES_PASSWORD")? {
            self.storage_postgres.password = password;
        }
        if let Some(db_name) = env_value::<String>("POSTGRES_DATABASE")? {
            self.storage_postgres.db_name = db_name;
        }
        if let Some(size) = env_value::<u64>("BLOCK_INVENTORY_SIZE")? {
            self.follower.block_inventory_size = size;
        }
        if let Some(url) = env_value::<String>("LATEST_INVENTORIES_URL")? {
            self.inventory.latest_url = Some(url);
        }
        if let Some(flag) = env_flag("GATEWAY_INVENTORY_BOOTSTRAP")? {
            self.inventory.bootstrap = flag;
        }
        if let Some(path) = env_value::<String>("GATEWAY_INVENTORY_PATH")? {
            self.inventory.local_path = Some(path);
        }
        if let Some(directory) = env_value::<String>("LOGS_PATH")? {
            self.logging.directory = Some(directory);
        }
        Ok(())
    }
}

pub fn load_config(path: impl AsRef<Path>) -> crate::Result<Config> {
    let path = path.as_ref();
    let config_str = std::fs::read_to_string(path)
        .map_err(|e| err_with_loc!(ConfigError::OpenFileError(format!("{}: {}", path.display(), e))))?;
    let mut config = Config::from_toml_str(&config_str)?;
    config.apply_env_overrides()?;
    debug!("config_loaded::{}", path.display());
    Ok(config)
}

fn env_value<T: FromStr>(key: &'static str) -> crate::Result<Option<T>> {
    match dotenvy::var(key) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| err_with_loc!(ConfigError::InvalidOverride { key, value })),
        Err(_) => Ok(None),
    }
}

fn env_flag(key: &'static str) -> crate::Result<Option<bool>> {
    let Some(value) = env_value::<String>(key)? else {
        return Ok(None);
    };
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(err_with_loc!(ConfigError::InvalidOverride { key, value })),
    }
}
