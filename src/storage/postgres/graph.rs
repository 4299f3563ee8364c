use std::sync::Arc;

use async_trait::async_trait;
use tokio_postgres::Transaction;
use tracing::debug;
use tracing::error;
use tracing::info;

use crate::constants::FOLLOWER_INFO_KEY;
use crate::err_with_loc;
use crate::error::PostgresClientError;
use crate::error::Result;
use crate::model::BlockRecords;
use crate::model::FollowerInfo;
use crate::model::HotspotRecord;
use crate::storage::migration::Migrator;
use crate::storage::postgres::PostgresPool;
use crate::storage::postgres::PostgresStorage;
use crate::storage::GraphStore;

const INSERT_ACCOUNT: &str = "INSERT INTO accounts (key) VALUES ($1) ON CONFLICT (key) DO NOTHING";

const INSERT_BARE_HOTSPOT: &str = "INSERT INTO hotspots (key) VALUES ($1) ON CONFLICT (key) DO NOTHING";

const UPSERT_HOTSPOT: &str = "INSERT INTO hotspots (
        key, owner, location, lon, lat, name, mode, payer, first_block, last_block,
        nonce, elevation, gain, reward_scale, first_timestamp, location_hex,
        last_poc_challenge, last_poc_onion_key_hash, witnesses
    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
    ON CONFLICT (key) DO UPDATE SET
        owner = EXCLUDED.owner,
        location = EXCLUDED.location,
        lon = EXCLUDED.lon,
        lat = EXCLUDED.lat,
        name = EXCLUDED.name,
        mode = EXCLUDED.mode,
        payer = EXCLUDED.payer,
        first_block = EXCLUDED.first_block,
        last_block = EXCLUDED.last_block,
        nonce = EXCLUDED.nonce,
        elevation = EXCLUDED.elevation,
        gain = EXCLUDED.gain,
        reward_scale = EXCLUDED.reward_scale,
        first_timestamp = EXCLUDED.first_timestamp,
        location_hex = EXCLUDED.location_hex,
        last_poc_challenge = EXCLUDED.last_poc_challenge,
        last_poc_onion_key_hash = EXCLUDED.last_poc_onion_key_hash,
        witnesses = EXCLUDED.witnesses";

const INSERT_PAYMENT: &str = "INSERT INTO payments (key, from_id, to_id, hash, amount, block, timestamp)
    VALUES ($1, $2, $3, $4, $5, $6, $7)
    ON CONFLICT (key) DO NOTHING";

const INSERT_RECEIPT: &str = "INSERT INTO poc_receipts (
        key, from_id, to_id, hash, frequency, datarate, signal, snr, timestamp,
        is_valid, tx_power, processing_time, block
    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
    ON CONFLICT (key) DO NOTHING";

const UPSERT_FOLLOWER_INFO: &str = "INSERT INTO follower_info (
        key, height, first_block, sync_height, inventory_height, updated_at
    ) VALUES ($1, $2, $3, $4, $5, NOW())
    ON CONFLICT (key) DO UPDATE SET
        height = EXCLUDED.height,
        first_block = EXCLUDED.first_block,
        sync_height = EXCLUDED.sync_height,
        inventory_height = EXCLUDED.inventory_height,
        updated_at = EXCLUDED.updated_at";

/// Graph collections laid out as PostgreSQL tables, vertices keyed by
/// address and edges by content hash
#[derive(Debug, Clone)]
pub struct PostgresGraphStore {
    pub pool: Arc<PostgresPool>,
}

#[async_trait]
impl PostgresStorage for PostgresGraphStore {
    fn new(pool: Arc<PostgresPool>) -> Self { Self { pool } }

    async fn health_check(&self) -> Result<()> {
        let conn = self.pool.get().await.map_err(|e| {
            error!("failed_to_get_client_pool_connection: {}", e);
            err_with_loc!(PostgresClientError::PoolError(e))
        })?;

        conn.execute("SELECT 1", &[]).await.map_err(|e| {
            error!("failed_to_health_check: {}", e);
            err_with_loc!(PostgresClientError::QueryError(format!("failed_to_health_check: {}", e)))
        })?;
        Ok(())
    }

    async fn initialize(&self) -> Result<()> {
        self.health_check().await?;
        Migrator::new(self.pool.clone()).run_migrations().await
    }
}

fn bigint(
    value: u64,
    column: &str,
) -> Result<i64> {
    i64::try_from(value).map_err(|_| {
        error!("value_out_of_range::{}::{}", column, value);
        err_with_loc!(PostgresClientError::QueryError(format!("{} out of range: {}", column, value)))
    })
}

fn opt_bigint(
    value: Option<u64>,
    column: &str,
) -> Result<Option<i64>> {
    value.map(|v| bigint(v, column)).transpose()
}

fn unsigned(
    value: i64,
    column: &str,
) -> Result<u64> {
    u64::try_from(value).map_err(|_| {
        error!("negative_value::{}::{}", column, value);
        err_with_loc!(PostgresClientError::QueryError(format!("{} is negative: {}", column, value)))
    })
}

fn transaction_error(
    what: &str,
    e: tokio_postgres::Error,
) -> crate::Error {
    error!("failed_to_{}: {}", what, e);
    err_with_loc!(PostgresClientError::TransactionError(format!("failed_to_{}: {}", what, e)))
}

impl PostgresGraphStore {
    async fn upsert_hotspots(
        tx: &Transaction<'_>,
        hotspots: &[HotspotRecord],
    ) -> Result<()> {
        let statement = tx.prepare(UPSERT_HOTSPOT).await.map_err(|e| transaction_error("prepare_hotspot_upsert", e))?;

        for hotspot in hotspots {
            let lon = hotspot.location_geo.as_ref().map(|geo| geo.lon());
            let lat = hotspot.location_geo.as_ref().map(|geo| geo.lat());
            tx.execute(&statement, &[
                &hotspot.key,
                &hotspot.owner,
                &hotspot.location,
                &lon,
                &lat,
                &hotspot.name,
                &hotspot.mode,
                &hotspot.payer,
                &opt_bigint(hotspot.first_block, "first_block")?,
                &opt_bigint(hotspot.last_block, "last_block")?,
                &opt_bigint(hotspot.nonce, "nonce")?,
                &hotspot.elevation,
                &hotspot.gain,
                &hotspot.reward_scale,
                &hotspot.first_timestamp,
                &hotspot.location_hex,
                &opt_bigint(hotspot.last_poc_challenge, "last_poc_challenge")?,
                &hotspot.last_poc_onion_key_hash,
                &hotspot.witnesses,
            ])
            .await
            .map_err(|e| transaction_error("upsert_hotspot", e))?;
        }
        Ok(())
    }
}

#[async_trait]
impl GraphStore for PostgresGraphStore {
    async fn ensure_collections(&self) -> Result<()> { self.initialize().await }

    async fn load_follower_info(&self) -> Result<Option<FollowerInfo>> {
        let conn = self.pool.get().await.map_err(|e| {
            error!("failed_to_get_client_pool_connection: {}", e);
            err_with_loc!(PostgresClientError::PoolError(e))
        })?;

        let row = conn
            .query_opt(
                "SELECT height, first_block, sync_height, inventory_height FROM follower_info WHERE key = $1",
                &[&FOLLOWER_INFO_KEY],
            )
            .await
            .map_err(|e| {
                error!("failed_to_load_follower_info: {}", e);
                err_with_loc!(PostgresClientError::QueryError(format!("failed_to_load_follower_info: {}", e)))
            })?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(FollowerInfo {
            height: unsigned(row.get("height"), "height")?,
            first_block: unsigned(row.get("first_block"), "first_block")?,
            sync_height: unsigned(row.get("sync_height"), "sync_height")?,
            inventory_height: unsigned(row.get("inventory_height"), "inventory_height")?,
        }))
    }

    async fn save_follower_info(
        &self,
        info: &FollowerInfo,
    ) -> Result<()> {
        let conn = self.pool.get().await.map_err(|e| {
            error!("failed_to_get_client_pool_connection: {}", e);
            err_with_loc!(PostgresClientError::PoolError(e))
        })?;

        conn.execute(UPSERT_FOLLOWER_INFO, &[
            &FOLLOWER_INFO_KEY,
            &bigint(info.height, "height")?,
            &bigint(info.first_block, "first_block")?,
            &bigint(info.sync_height, "sync_height")?,
            &bigint(info.inventory_height, "inventory_height")?,
        ])
        .await
        .map_err(|e| {
            error!("failed_to_save_follower_info: {}", e);
            err_with_loc!(PostgresClientError::QueryError(format!("failed_to_save_follower_info: {}", e)))
        })?;
        Ok(())
    }

    async fn commit_block(
        &self,
        records: &BlockRecords,
    ) -> Result<()> {
        let mut conn = self.pool.get().await.map_err(|e| {
            error!("failed_to_get_client_pool_connection: {}", e);
            err_with_loc!(PostgresClientError::PoolError(e))
        })?;

        let tx = conn.transaction().await.map_err(|e| transaction_error("start_transaction", e))?;

        let insert_account = tx.prepare(INSERT_ACCOUNT).await.map_err(|e| transaction_error("prepare_account", e))?;
        for account in records.accounts() {
            tx.execute(&insert_account, &[&account.key])
                .await
                .map_err(|e| transaction_error("insert_account", e))?;
        }

        // Transaction-derived hotspots never touch an existing row
        let insert_hotspot =
            tx.prepare(INSERT_BARE_HOTSPOT).await.map_err(|e| transaction_error("prepare_hotspot", e))?;
        for hotspot in records.hotspots() {
            tx.execute(&insert_hotspot, &[&hotspot.key])
                .await
                .map_err(|e| transaction_error("insert_hotspot", e))?;
        }

        let insert_payment = tx.prepare(INSERT_PAYMENT).await.map_err(|e| transaction_error("prepare_payment", e))?;
        for payment in records.payments() {
            tx.execute(&insert_payment, &[
                &payment.key,
                &payment.from,
                &payment.to,
                &payment.hash,
                &bigint(payment.amount, "amount")?,
                &bigint(payment.block, "block")?,
                &payment.timestamp,
            ])
            .await
            .map_err(|e| transaction_error("insert_payment", e))?;
        }

        let insert_receipt = tx.prepare(INSERT_RECEIPT).await.map_err(|e| transaction_error("prepare_receipt", e))?;
        for receipt in records.receipts() {
            tx.execute(&insert_receipt, &[
                &receipt.key,
                &receipt.from,
                &receipt.to,
                &receipt.hash,
                &receipt.frequency,
                &receipt.datarate,
                &receipt.signal,
                &receipt.snr,
                &receipt.timestamp,
                &receipt.is_valid,
                &receipt.tx_power,
                &receipt.processing_time,
                &bigint(receipt.block, "block")?,
            ])
            .await
            .map_err(|e| transaction_error("insert_receipt", e))?;
        }

        tx.commit().await.map_err(|e| transaction_error("commit_transaction", e))?;

        debug!(
            "block_committed::{}::accounts::{}::hotspots::{}::payments::{}::receipts::{}",
            records.height,
            records.accounts().len(),
            records.hotspots().len(),
            records.payments().len(),
            records.receipts().len()
        );
        Ok(())
    }

    async fn replace_hotspots(
        &self,
        hotspots: &[HotspotRecord],
    ) -> Result<()> {
        let mut conn = self.pool.get().await.map_err(|e| {
            error!("failed_to_get_client_pool_connection: {}", e);
            err_with_loc!(PostgresClientError::PoolError(e))
        })?;

        let tx = conn.transaction().await.map_err(|e| transaction_error("start_transaction", e))?;
        Self::upsert_hotspots(&tx, hotspots).await?;
        tx.commit().await.map_err(|e| transaction_error("commit_transaction", e))?;

        info!("hotspots_replaced::{}", hotspots.len());
        Ok(())
    }
}
