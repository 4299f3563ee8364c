pub mod graph;

use std::fs::File;
use std::io::Read;
use std::sync::Arc;

use bb8::Pool;
use bb8_postgres::PostgresConnectionManager;
use native_tls::Certificate;
use native_tls::Identity;
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use tokio_postgres::config::SslMode;
use tokio_postgres::Config;
use tracing::error;
use tracing::info;
use tracing::instrument;

pub use graph::PostgresGraphStore;

use crate::config::StoragePostgresConfig;
use crate::config::TlsConfig;
use crate::err_with_loc;
use crate::error::PostgresClientError;
use crate::error::Result;

#[async_trait::async_trait]
pub trait PostgresStorage {
    fn new(pg_pool: Arc<PostgresPool>) -> Self
    where
        Self: Sized;
    async fn health_check(&self) -> Result<()>;
    async fn initialize(&self) -> Result<()>;
}

pub type PostgresPool = Pool<PostgresConnectionManager<MakeTlsConnector>>;

#[instrument(level = "debug", skip(config))]
pub async fn make_postgres_pool(
    engine_name: &str,
    config: &StoragePostgresConfig,
) -> Result<Arc<PostgresPool>> {
    let mut db_config = Config::new();
    db_config
        .user(&config.user)
        .password(&config.password)
        .host(&config.host)
        .port(config.port)
        .dbname(&config.db_name)
        .application_name(engine_name);

    let connector = match &config.tls {
        Some(tls) => {
            db_config.ssl_mode(SslMode::Require);
            make_tls_connector(tls)?
        },
        None => {
            db_config.ssl_mode(SslMode::Disable);
            let tls = TlsConnector::new().map_err(|e| {
                error!("failed_to_build_tls_connector: {}", e);
                err_with_loc!(PostgresClientError::TlsError(format!("failed_to_build_tls_connector: {}", e)))
            })?;
            MakeTlsConnector::new(tls)
        },
    };

    let mgr = PostgresConnectionManager::new(db_config, connector);

    let pool = Pool::builder().max_size(config.pool_size).build(mgr).await.map_err(|e| {
        error!("failed_to_build_pool: {}", e);
        err_with_loc!(PostgresClientError::PoolError(bb8::RunError::User(e)))
    })?;

    info!("postgres::connection_established::{}:{}/{}", config.host, config.port, config.db_name);
    Ok(Arc::new(pool))
}

fn read_file(
    path: &str,
    what: &str,
) -> Result<Vec<u8>> {
    let mut file = File::open(path).map_err(|e| {
        error!("failed_to_open_{}_file: {}", what, e);
        err_with_loc!(PostgresClientError::TlsError(format!("failed_to_open_{}_file: {}", what, e)))
    })?;

    let mut data = vec![];
    file.read_to_end(&mut data).map_err(|e| {
        error!("failed_to_read_{}_file: {}", what, e);
        err_with_loc!(PostgresClientError::TlsError(format!("failed_to_read_{}_file: {}", what, e)))
    })?;
    Ok(data)
}

fn make_tls_connector(config: &TlsConfig) -> Result<MakeTlsConnector> {
    let ca_data = read_file(&config.ca_path, "root_ca")?;
    let certificate = Certificate::from_pem(&ca_data).map_err(|e| {
        error!("failed_to_parse_root_ca_file: {}", e);
        err_with_loc!(PostgresClientError::TlsError(format!("failed_to_parse_root_ca_file: {}", e)))
    })?;

    let mut builder = TlsConnector::builder();
    builder.add_root_certificate(certificate);

    if let Some(identity_path) = &config.client_identity_path {
        let identity_data = read_file(identity_path, "identity")?;
        let identity = Identity::from_pkcs12(&identity_data, "").map_err(|e: native_tls::Error| {
            error!("invalid_identity_file: {}", e);
            err_with_loc!(PostgresClientError::TlsError(format!("invalid_identity_file: {}", e)))
        })?;
        builder.identity(identity);
    }

    let tls = builder.build().map_err(|e| {
        error!("failed_to_build_tls_connector: {}", e);
        err_with_loc!(PostgresClientError::TlsError(format!("failed_to_build_tls_connector: {}", e)))
    })?;

    Ok(MakeTlsConnector::new(tls))
}
