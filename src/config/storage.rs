use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoragePostgresConfig {
    pub user: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub pool_size: u32,
    pub db_name: String,
    pub tls: Option<TlsConfig>,
}

impl Default for StoragePostgresConfig {
    fn default() -> Self {
        Self {
            user: "postgres".to_string(),
            password: String::new(),
            port: 5432,
            host: "127.0.0.1".to_string(),
            pool_size: 8,
            db_name: "tabi".to_string(),
            tls: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    pub client_identity_path: Option<String>,
    pub ca_path: String,
}
