use std::sync::Arc;

use chrono::Utc;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::err_with_loc;
use crate::error::PostgresClientError;
use crate::error::Result;
use crate::storage::postgres::PostgresPool;

/// Highest version in [`Migrator::migrations`], bump it together with a new entry
pub const CURRENT_SCHEMA_VERSION: i64 = 5;

// Serializes concurrent migrators (the follower and the migrate tool) on one database
const MIGRATION_LOCK_ID: i64 = 0x7461_6269;

pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    /// Statements run in order inside one transaction
    pub sql: Vec<&'static str>,
}

/// Versioned schema migrations, tracked in the `migrations` table
pub struct Migrator {
    pool: Arc<PostgresPool>,
}

impl Migrator {
    pub fn new(pool: Arc<PostgresPool>) -> Self { Self { pool } }

    pub async fn run_migrations(&self) -> Result<()> {
        self.create_migrations_table().await?;
        let applied = self.applied_versions().await?;

        let pending: Vec<Migration> =
            Self::migrations().into_iter().filter(|m| !applied.contains(&m.version)).collect();
        if pending.is_empty() {
            info!("migrations::up_to_date::{}", CURRENT_SCHEMA_VERSION);
            return Ok(());
        }

        for migration in &pending {
            self.apply_migration(migration).await?;
        }
        Ok(())
    }

    /// True when every known migration has been applied, nothing is changed
    pub async fn check_schema_version(&self) -> Result<bool> {
        self.create_migrations_table().await?;
        let current_version = self.applied_versions().await?.into_iter().max().unwrap_or(0);

        if current_version < CURRENT_SCHEMA_VERSION {
            warn!("migrations::schema_behind::expected::{}::found::{}", CURRENT_SCHEMA_VERSION, current_version);
            return Ok(false);
        }

        info!("migrations::schema_current::{}", current_version);
        Ok(true)
    }

    async fn create_migrations_table(&self) -> Result<()> {
        let conn = self.pool.get().await.map_err(|e| {
            error!("failed_to_get_client_pool_connection: {}", e);
            err_with_loc!(PostgresClientError::PoolError(e))
        })?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS migrations (
                version BIGINT PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TIMESTAMP WITH TIME ZONE NOT NULL
            )",
            &[],
        )
        .await
        .map_err(|e| {
            error!("failed_to_create_migrations_table: {}", e);
            err_with_loc!(PostgresClientError::QueryError(format!("failed_to_create_migrations_table: {}", e)))
        })?;

        Ok(())
    }

    async fn applied_versions(&self) -> Result<Vec<i64>> {
        let conn = self.pool.get().await.map_err(|e| {
            error!("failed_to_get_client_pool_connection: {}", e);
            err_with_loc!(PostgresClientError::PoolError(e))
        })?;

        let rows = conn.query("SELECT version FROM migrations ORDER BY version ASC", &[]).await.map_err(|e| {
            error!("failed_to_get_applied_migrations: {}", e);
            err_with_loc!(PostgresClientError::QueryError(format!("failed_to_get_applied_migrations: {}", e)))
        })?;

        Ok(rows.iter().map(|row| row.get::<_, i64>(0)).collect())
    }

    async fn apply_migration(
        &self,
        migration: &Migration,
    ) -> Result<()> {
        let mut conn = self.pool.get().await.map_err(|e| {
            error!("failed_to_get_client_pool_connection: {}", e);
            err_with_loc!(PostgresClientError::PoolError(e))
        })?;

        let tx = conn.transaction().await.map_err(|e| {
            error!("failed_to_start_transaction: {}", e);
            err_with_loc!(PostgresClientError::TransactionError(format!("failed_to_start_transaction: {}", e)))
        })?;

        tx.execute("SELECT pg_advisory_xact_lock($1)", &[&MIGRATION_LOCK_ID]).await.map_err(|e| {
            error!("failed_to_take_migration_lock: {}", e);
            err_with_loc!(PostgresClientError::TransactionError(format!("failed_to_take_migration_lock: {}", e)))
        })?;

        // Another migrator may have applied it while we waited for the lock
        let already_applied = tx
            .query_opt("SELECT 1 FROM migrations WHERE version = $1", &[&migration.version])
            .await
            .map_err(|e| {
                error!("failed_to_check_migration::{}: {}", migration.version, e);
                err_with_loc!(PostgresClientError::QueryError(format!("failed_to_check_migration: {}", e)))
            })?
            .is_some();
        if already_applied {
            return Ok(());
        }

        for (i, sql) in migration.sql.iter().enumerate() {
            tx.execute(*sql, &[]).await.map_err(|e| {
                error!("failed_to_execute_migration::{}_{}::statement::{}: {}", migration.version, migration.name, i, e);
                err_with_loc!(PostgresClientError::QueryError(format!(
                    "failed_to_execute_migration {}_{} statement {}: {}",
                    migration.version, migration.name, i, e
                )))
            })?;
        }

        tx.execute("INSERT INTO migrations (version, name, applied_at) VALUES ($1, $2, $3)", &[
            &migration.version,
            &migration.name,
            &Utc::now(),
        ])
        .await
        .map_err(|e| {
            error!("failed_to_record_migration::{}_{}: {}", migration.version, migration.name, e);
            err_with_loc!(PostgresClientError::QueryError(format!(
                "failed_to_record_migration {}_{}: {}",
                migration.version, migration.name, e
            )))
        })?;

        tx.commit().await.map_err(|e| {
            error!("failed_to_commit_transaction: {}", e);
            err_with_loc!(PostgresClientError::TransactionError(format!("failed_to_commit_transaction: {}", e)))
        })?;

        info!("migrations::applied::{}_{}", migration.version, migration.name);
        Ok(())
    }

    /// Get all migrations that should be applied to the database
    fn migrations() -> Vec<Migration> {
        vec![
            Migration {
                version: 1,
                name: "create_accounts_table",
                sql: vec![
                    r#"
                CREATE TABLE IF NOT EXISTS accounts (
                    key TEXT PRIMARY KEY
                )
                "#,
                ],
            },
            Migration {
                version: 2,
                name: "create_hotspots_table",
                sql: vec![
                    r#"
                CREATE TABLE IF NOT EXISTS hotspots (
                    key TEXT PRIMARY KEY,
                    owner TEXT DEFAULT NULL,
                    location TEXT DEFAULT NULL,
                    lon DOUBLE PRECISION DEFAULT NULL,
                    lat DOUBLE PRECISION DEFAULT NULL,
                    name TEXT DEFAULT NULL,
                    mode TEXT DEFAULT NULL,
                    payer TEXT DEFAULT NULL,
                    first_block BIGINT DEFAULT NULL,
                    last_block BIGINT DEFAULT NULL,
                    nonce BIGINT DEFAULT NULL,
                    elevation BIGINT DEFAULT NULL,
                    gain BIGINT DEFAULT NULL,
                    reward_scale DOUBLE PRECISION DEFAULT NULL,
                    first_timestamp TEXT DEFAULT NULL,
                    location_hex TEXT DEFAULT NULL,
                    last_poc_challenge BIGINT DEFAULT NULL,
                    last_poc_onion_key_hash TEXT DEFAULT NULL,
                    witnesses TEXT DEFAULT NULL
                )
                "#,
                    "CREATE INDEX IF NOT EXISTS idx_hotspots_owner ON hotspots (owner)",
                ],
            },
            Migration {
                version: 3,
                name: "create_payments_table",
                sql: vec![
                    r#"
                CREATE TABLE IF NOT EXISTS payments (
                    key TEXT PRIMARY KEY,
                    from_id TEXT NOT NULL,
                    to_id TEXT NOT NULL,
                    hash TEXT NOT NULL,
                    amount BIGINT NOT NULL,
                    block BIGINT NOT NULL,
                    timestamp BIGINT NOT NULL
                )
                "#,
                    "CREATE INDEX IF NOT EXISTS idx_payments_from_id ON payments (from_id)",
                    "CREATE INDEX IF NOT EXISTS idx_payments_to_id ON payments (to_id)",
                    "CREATE INDEX IF NOT EXISTS idx_payments_block ON payments (block)",
                ],
            },
            Migration {
                version: 4,
                name: "create_poc_receipts_table",
                sql: vec![
                    r#"
                CREATE TABLE IF NOT EXISTS poc_receipts (
                    key TEXT PRIMARY KEY,
                    from_id TEXT NOT NULL,
                    to_id TEXT NOT NULL,
                    hash TEXT NOT NULL,
                    frequency DOUBLE PRECISION NOT NULL,
                    datarate TEXT NOT NULL,
                    signal BIGINT NOT NULL,
                    snr DOUBLE PRECISION NOT NULL,
                    timestamp BIGINT NOT NULL,
                    is_valid BOOLEAN DEFAULT NULL,
                    tx_power BIGINT DEFAULT NULL,
                    processing_time DOUBLE PRECISION DEFAULT NULL,
                    block BIGINT NOT NULL
                )
                "#,
                    "CREATE INDEX IF NOT EXISTS idx_poc_receipts_from_id ON poc_receipts (from_id)",
                    "CREATE INDEX IF NOT EXISTS idx_poc_receipts_to_id ON poc_receipts (to_id)",
                    "CREATE INDEX IF NOT EXISTS idx_poc_receipts_block ON poc_receipts (block)",
                ],
            },
            Migration {
                version: 5,
                name: "create_follower_info_table",
                sql: vec![
                    r#"
                CREATE TABLE IF NOT EXISTS follower_info (
                    key TEXT PRIMARY KEY,
                    height BIGINT NOT NULL,
                    first_block BIGINT NOT NULL,
                    sync_height BIGINT NOT NULL,
                    inventory_height BIGINT NOT NULL DEFAULT 0,
                    updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
                )
                "#,
                ],
            },
        ]
    }
}
