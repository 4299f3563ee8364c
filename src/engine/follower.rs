use std::fmt;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use futures::stream;
use futures::StreamExt;
use futures::TryStreamExt;
use tokio_retry::strategy::FixedInterval;
use tokio_retry::RetryIf;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::config::FollowerConfig;
use crate::err_with_loc;
use crate::error::FollowerError;
use crate::error::NodeClientError;
use crate::error::Result;
use crate::inventory::InventorySource;
use crate::model::BlockRecords;
use crate::model::SyncState;
use crate::model::TransactionReference;
use crate::processor::normalize;
use crate::rpc::NodeClient;
use crate::storage::GraphStore;

const DISCOVERY_LOG_EVERY: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowerPhase {
    Initializing,
    Bootstrapping,
    Syncing,
    Idle,
    Stopped,
}

impl fmt::Display for FollowerPhase {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let name = match self {
            FollowerPhase::Initializing => "initializing",
            FollowerPhase::Bootstrapping => "bootstrapping",
            FollowerPhase::Syncing => "syncing",
            FollowerPhase::Idle => "idle",
            FollowerPhase::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Only errors where the node answered with something not usable yet are retried
fn is_retryable(error: &crate::Error) -> bool {
    error.downcast_ref::<NodeClientError>().is_some_and(NodeClientError::is_retryable)
}

/// Startup inventory load
#[derive(Clone)]
enum Bootstrap {
    Disabled,
    /// Use the periodic feed
    FromFeed,
    From(Arc<dyn InventorySource>),
}

/// Checkpointed block follower.
///
/// Processes one block at a time starting from the persisted `sync_height`,
/// commits the block's records and only then moves the checkpoint forward. A
/// block that keeps failing is retried as a whole and never skipped.
pub struct Follower {
    node: Arc<dyn NodeClient>,
    store: Arc<dyn GraphStore>,
    inventory_feed: Option<Arc<dyn InventorySource>>,
    bootstrap: Bootstrap,
    config: FollowerConfig,
    cancel: CancellationToken,
    phase: FollowerPhase,
    last_inventory_attempt: u64,
}

impl Follower {
    pub fn new(
        node: Arc<dyn NodeClient>,
        store: Arc<dyn GraphStore>,
        config: FollowerConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            node,
            store,
            inventory_feed: None,
            bootstrap: Bootstrap::Disabled,
            config,
            cancel,
            phase: FollowerPhase::Initializing,
            last_inventory_attempt: 0,
        }
    }

    /// Periodic inventory reconciliation while syncing
    pub fn with_inventory_feed(
        mut self,
        feed: Arc<dyn InventorySource>,
    ) -> Self {
        self.inventory_feed = Some(feed);
        self
    }

    /// Load an inventory once at startup. `None` falls back to the feed.
    pub fn with_bootstrap(
        mut self,
        source: Option<Arc<dyn InventorySource>>,
    ) -> Self {
        self.bootstrap = match source {
            Some(source) => Bootstrap::From(source),
            None => Bootstrap::FromFeed,
        };
        self
    }

    pub fn phase(&self) -> FollowerPhase { self.phase }

    fn set_phase(
        &mut self,
        phase: FollowerPhase,
    ) {
        if self.phase != phase {
            debug!("follower::phase::{}::{}", self.phase, phase);
            self.phase = phase;
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut state = self.initialize().await?;
        info!("follower::starting::block::{}::tip::{}", state.sync_height(), state.height());

        while self.step(&mut state).await? {}

        self.set_phase(FollowerPhase::Stopped);
        info!("follower::stopped::sync_height::{}", state.sync_height());
        Ok(())
    }

    /// Prepare the store, resume or discover the checkpoint and run the
    /// optional inventory bootstrap
    pub async fn initialize(&mut self) -> Result<SyncState> {
        self.set_phase(FollowerPhase::Initializing);
        self.store.ensure_collections().await?;

        let tip = self.node.height().await?;
        let (mut state, fresh) = match self.store.load_follower_info().await? {
            Some(info) => {
                let mut state = SyncState::resume(info);
                state.set_height(tip);
                info!("follower::resuming::first_block::{}::sync_height::{}", state.first_block(), state.sync_height());
                (state, false)
            },
            None => {
                let first_block = self.discover_first_block(tip).await?;
                (SyncState::start_at(first_block, tip), true)
            },
        };

        if !matches!(self.bootstrap, Bootstrap::Disabled) {
            self.bootstrap_inventory(&mut state, fresh).await?;
        }

        // Written after the bootstrap so a failed first run stays a first run
        self.store.save_follower_info(&state.info()).await?;
        Ok(state)
    }

    /// Walk back from the tip until a block is missing or the window runs out.
    /// The oldest reachable height becomes the first block.
    pub async fn discover_first_block(
        &self,
        tip: u64,
    ) -> Result<u64> {
        let floor = tip.saturating_sub(self.config.block_inventory_size);
        let mut height = self.config.discovery_start_height.unwrap_or(tip).min(tip);
        info!("follower::discovering_first_block::from::{}::floor::{}", height, floor);

        loop {
            if height < floor || height == 0 || self.node.get_block_at(height).await?.is_none() {
                let first_block = height + 1;
                info!("follower::first_block_found::{}", first_block);
                return Ok(first_block);
            }
            height -= 1;
            if height % DISCOVERY_LOG_EVERY == 0 {
                info!("follower::discovery_progress::{}::tip::{}", height, tip);
            }
        }
    }

    async fn bootstrap_inventory(
        &mut self,
        state: &mut SyncState,
        fresh: bool,
    ) -> Result<()> {
        self.set_phase(FollowerPhase::Bootstrapping);

        let source = match (self.bootstrap.clone(), self.inventory_feed.clone()) {
            (Bootstrap::From(source), _) | (Bootstrap::FromFeed, Some(source)) => source,
            _ => return Err(err_with_loc!(FollowerError::MissingInventorySource)),
        };

        info!("follower::bootstrapping_inventory::{}", source.describe());
        let applied = match source.fetch().await {
            Ok(snapshot) => {
                self.store.replace_hotspots(&snapshot.records).await?;
                state.record_inventory(snapshot.generation);
                info!("follower::inventory_bootstrapped::{}::generation::{}", snapshot.records.len(), snapshot.generation);
                Ok(())
            },
            Err(e) => Err(e),
        };

        match applied {
            Ok(()) => Ok(()),
            Err(e) if fresh => {
                error!("follower::inventory_bootstrap_failed::{}", e);
                Err(e)
            },
            Err(e) => {
                warn!("follower::inventory_bootstrap_skipped::{}", e);
                Ok(())
            },
        }
    }

    /// One loop iteration: either sync the block at `sync_height` or wait for
    /// the chain to move. `false` once cancelled.
    pub async fn step(
        &mut self,
        state: &mut SyncState,
    ) -> Result<bool> {
        if self.cancel.is_cancelled() {
            return Ok(false);
        }

        if state.is_caught_up() {
            state.set_height(self.node.height().await?);
            if state.is_caught_up() {
                self.set_phase(FollowerPhase::Idle);
                tokio::select! {
                    _ = tokio::time::sleep(self.config.idle_interval()) => {},
                    _ = self.cancel.cancelled() => return Ok(false),
                }
                return Ok(true);
            }
        }

        self.set_phase(FollowerPhase::Syncing);
        self.maybe_reconcile_inventory(state).await?;

        let height = state.sync_height();
        let started = Instant::now();
        let Some(records) = self.process_block_with_retry(height).await? else {
            return Ok(false);
        };

        self.store.commit_block(&records).await?;
        state.advance();
        self.store.save_follower_info(&state.info()).await?;

        info!(
            "follower::block_synced::{}::of::{}::records::{}::{}ms",
            height,
            state.height(),
            records.accounts().len() + records.hotspots().len() + records.payments().len() + records.receipts().len(),
            started.elapsed().as_millis()
        );
        Ok(true)
    }

    async fn maybe_reconcile_inventory(
        &mut self,
        state: &mut SyncState,
    ) -> Result<()> {
        let Some(feed) = self.inventory_feed.clone() else {
            return Ok(());
        };
        if state.blocks_since_inventory(self.last_inventory_attempt) <= self.config.inventory_refresh_blocks {
            return Ok(());
        }

        self.last_inventory_attempt = state.sync_height();
        match feed.fetch().await {
            Ok(snapshot) => {
                self.store.replace_hotspots(&snapshot.records).await?;
                state.record_inventory(snapshot.generation);
                self.store.save_follower_info(&state.info()).await?;
                info!("follower::inventory_reconciled::{}::generation::{}", snapshot.records.len(), snapshot.generation);
            },
            Err(e) => warn!("follower::inventory_reconcile_failed::keeping_previous::{}", e),
        }
        Ok(())
    }

    /// `None` when cancelled while waiting on the node
    async fn process_block_with_retry(
        &self,
        height: u64,
    ) -> Result<Option<BlockRecords>> {
        let max_attempts = self.config.max_block_attempts.max(1);
        let attempts = AtomicUsize::new(0);
        let strategy = FixedInterval::new(self.config.retry_backoff()).take(max_attempts - 1);

        let retry = RetryIf::start(
            strategy,
            || {
                attempts.fetch_add(1, Ordering::Relaxed);
                self.process_block(height)
            },
            |e: &crate::Error| {
                let retryable = is_retryable(e);
                if retryable {
                    warn!(
                        "follower::block_attempt_failed::{}::attempt::{}::{}",
                        height,
                        attempts.load(Ordering::Relaxed),
                        e
                    );
                }
                retryable
            },
        );

        tokio::select! {
            result = retry => match result {
                Ok(records) => Ok(Some(records)),
                Err(e) if is_retryable(&e) => {
                    let attempts = attempts.load(Ordering::Relaxed);
                    error!("follower::retries_exhausted::{}::{}::{}", height, attempts, e);
                    // The last node error stays in the chain as the cause
                    Err(e.context(FollowerError::RetriesExhausted { height, attempts }))
                },
                Err(e) => {
                    error!("follower::block_failed::{}::{}", height, e);
                    Err(e)
                },
            },
            _ = self.cancel.cancelled() => Ok(None),
        }
    }

    /// Fetch one block and every handled transaction in it, then normalize
    pub async fn process_block(
        &self,
        height: u64,
    ) -> Result<BlockRecords> {
        let block = self
            .node
            .get_block_at(height)
            .await?
            .ok_or_else(|| err_with_loc!(NodeClientError::BlockNotFound(height)))?;

        let (block_height, block_time) = (block.height, block.time);
        let handled: Vec<TransactionReference> =
            block.transactions.into_iter().filter(|reference| reference.kind().is_handled()).collect();

        let normalized: Vec<_> = stream::iter(handled)
            .map(|reference| {
                let node = self.node.clone();
                async move {
                    let transaction = node.get_transaction(&reference.hash, &reference.kind).await?;
                    normalize(&transaction, block_height, block_time)
                }
            })
            .buffered(self.config.transaction_workers.max(1))
            .try_collect()
            .await?;

        let mut records = BlockRecords::new(height);
        for batch in normalized {
            records.merge(batch);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use mockall::Sequence;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::error::InventoryError;
    use crate::inventory::InventorySnapshot;
    use crate::inventory::MockInventorySource;
    use crate::model::Block;
    use crate::model::FollowerInfo;
    use crate::model::HotspotRecord;
    use crate::model::Transaction;
    use crate::model::TransactionKind;
    use crate::model::TransactionReference;
    use crate::storage::InMemoryGraphStore;

    /// Chain of empty blocks plus a payment in every block
    struct StubNode {
        tip: u64,
        blocks: BTreeMap<u64, Block>,
        block_calls: Mutex<usize>,
    }

    impl StubNode {
        fn new(
            from: u64,
            tip: u64,
        ) -> Self {
            let blocks = (from..=tip)
                .map(|height| {
                    let block = Block {
                        height,
                        time: height as i64 * 60,
                        hash: format!("block-{height}"),
                        prev_hash: None,
                        transactions: vec![TransactionReference {
                            hash: format!("pay-{height}"),
                            kind: "payment_v1".to_string(),
                        }],
                    };
                    (height, block)
                })
                .collect();
            Self {
                tip,
                blocks,
                block_calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl NodeClient for StubNode {
        async fn height(&self) -> Result<u64> { Ok(self.tip) }

        async fn get_block(
            &self,
            height: Option<u64>,
            _hash: Option<&str>,
        ) -> Result<Option<Block>> {
            *self.block_calls.lock().unwrap() += 1;
            Ok(height.and_then(|h| self.blocks.get(&h).cloned()))
        }

        async fn get_transaction(
            &self,
            hash: &str,
            kind: &str,
        ) -> Result<Transaction> {
            let payload = json!({"hash": hash, "payer": "payer", "payee": format!("payee-{hash}"), "amount": 10});
            Ok(Transaction::decode(&TransactionKind::from(kind), payload)?)
        }
    }

    fn config() -> FollowerConfig {
        FollowerConfig {
            block_inventory_size: 50,
            idle_interval_ms: 1,
            retry_backoff_ms: 1,
            max_block_attempts: 3,
            inventory_refresh_blocks: 5,
            ..Default::default()
        }
    }

    fn snapshot(generation: u64) -> InventorySnapshot {
        InventorySnapshot {
            records: vec![HotspotRecord {
                owner: Some("X".to_string()),
                ..HotspotRecord::bare("hs1")
            }],
            generation,
        }
    }

    fn follower(
        node: Arc<StubNode>,
        store: Arc<InMemoryGraphStore>,
    ) -> Follower {
        Follower::new(node, store, config(), CancellationToken::new())
    }

    #[tokio::test]
    async fn fresh_start_discovers_and_persists_checkpoint() {
        let store = Arc::new(InMemoryGraphStore::new());
        let mut follower = follower(Arc::new(StubNode::new(101, 120)), store.clone());

        let state = follower.initialize().await.unwrap();

        assert_eq!(state.first_block(), 101);
        assert_eq!(state.sync_height(), 101);
        assert!(store.collections_ready().await);
        assert_eq!(store.follower_info().await.map(|info| info.first_block), Some(101));
    }

    #[tokio::test]
    async fn resume_skips_discovery() {
        let node = Arc::new(StubNode::new(1, 120));
        let store = Arc::new(InMemoryGraphStore::new());
        store
            .save_follower_info(&FollowerInfo {
                height: 110,
                first_block: 90,
                sync_height: 105,
                inventory_height: 0,
            })
            .await
            .unwrap();
        let mut follower = follower(node.clone(), store);

        let state = follower.initialize().await.unwrap();

        assert_eq!(state.sync_height(), 105);
        assert_eq!(state.height(), 120);
        assert_eq!(*node.block_calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn step_commits_then_advances() {
        let store = Arc::new(InMemoryGraphStore::new());
        let mut follower = follower(Arc::new(StubNode::new(101, 120)), store.clone());
        let mut state = follower.initialize().await.unwrap();

        assert!(follower.step(&mut state).await.unwrap());

        assert_eq!(state.sync_height(), 102);
        assert_eq!(follower.phase(), FollowerPhase::Syncing);
        assert_eq!(store.payment_count().await, 1);
        assert_eq!(store.follower_info().await.map(|info| info.sync_height), Some(102));
    }

    #[tokio::test]
    async fn caught_up_follower_idles_without_advancing() {
        let store = Arc::new(InMemoryGraphStore::new());
        let mut follower = follower(Arc::new(StubNode::new(101, 120)), store);
        let mut state = SyncState::start_at(120, 120);

        assert!(follower.step(&mut state).await.unwrap());

        assert_eq!(follower.phase(), FollowerPhase::Idle);
        assert_eq!(state.sync_height(), 120);
    }

    #[tokio::test]
    async fn cancelled_follower_stops_before_work() {
        let cancel = CancellationToken::new();
        let store = Arc::new(InMemoryGraphStore::new());
        let mut follower = Follower::new(Arc::new(StubNode::new(101, 120)), store.clone(), config(), cancel.clone());
        let mut state = follower.initialize().await.unwrap();
        cancel.cancel();

        assert!(!follower.step(&mut state).await.unwrap());
        assert_eq!(store.payment_count().await, 0);
    }

    #[tokio::test]
    async fn bootstrap_applies_snapshot_and_generation() {
        let mut source = MockInventorySource::new();
        source.expect_describe().return_const("local".to_string());
        source.expect_fetch().times(1).returning(|| Ok(snapshot(90)));

        let store = Arc::new(InMemoryGraphStore::new());
        let mut follower =
            follower(Arc::new(StubNode::new(101, 120)), store.clone()).with_bootstrap(Some(Arc::new(source)));

        let state = follower.initialize().await.unwrap();

        assert_eq!(state.inventory_height(), 90);
        assert_eq!(store.hotspot("hs1").await.and_then(|h| h.owner), Some("X".to_string()));
        assert_eq!(store.follower_info().await.map(|info| info.inventory_height), Some(90));
    }

    #[tokio::test]
    async fn bootstrap_failure_is_fatal_on_first_run_only() {
        let failing = || {
            let mut source = MockInventorySource::new();
            source.expect_describe().return_const("feed".to_string());
            source.expect_fetch().returning(|| {
                Err(err_with_loc!(InventoryError::Fetch {
                    url: "feed".to_string(),
                    reason: "503".to_string(),
                }))
            });
            Arc::new(source)
        };

        let store = Arc::new(InMemoryGraphStore::new());
        let mut first_run =
            follower(Arc::new(StubNode::new(101, 120)), store.clone()).with_bootstrap(Some(failing()));
        assert!(first_run.initialize().await.is_err());
        assert_eq!(store.follower_info().await, None);

        store
            .save_follower_info(&FollowerInfo {
                height: 120,
                first_block: 101,
                sync_height: 110,
                inventory_height: 0,
            })
            .await
            .unwrap();
        let mut restart = follower(Arc::new(StubNode::new(101, 120)), store.clone()).with_bootstrap(Some(failing()));
        let state = restart.initialize().await.unwrap();
        assert_eq!(state.sync_height(), 110);
    }

    #[tokio::test]
    async fn bootstrap_without_source_is_rejected() {
        let store = Arc::new(InMemoryGraphStore::new());
        let mut follower = follower(Arc::new(StubNode::new(101, 120)), store).with_bootstrap(None);

        let err = follower.initialize().await.unwrap_err();
        assert!(matches!(err.downcast_ref::<FollowerError>(), Some(FollowerError::MissingInventorySource)));
    }

    #[tokio::test]
    async fn failed_reconcile_is_not_retried_every_block() {
        let mut feed = MockInventorySource::new();
        feed.expect_describe().return_const("feed".to_string());
        feed.expect_fetch().times(1).returning(|| {
            Err(err_with_loc!(InventoryError::Parse {
                source_name: "feed".to_string(),
                reason: "truncated gzip".to_string(),
            }))
        });

        let store = Arc::new(InMemoryGraphStore::new());
        let mut follower = follower(Arc::new(StubNode::new(101, 120)), store.clone()).with_inventory_feed(Arc::new(feed));
        let mut state = follower.initialize().await.unwrap();

        // gap is large at start, one attempt, then quiet for the next 5 blocks
        for _ in 0..5 {
            assert!(follower.step(&mut state).await.unwrap());
        }
        assert_eq!(state.sync_height(), 106);
        assert_eq!(state.inventory_height(), 0);
        assert_eq!(store.payment_count().await, 5);
    }

    #[tokio::test]
    async fn reconcile_runs_again_once_gap_exceeds_refresh() {
        let mut feed = MockInventorySource::new();
        feed.expect_describe().return_const("feed".to_string());
        feed.expect_fetch().times(2).returning(|| Ok(snapshot(100)));

        let store = Arc::new(InMemoryGraphStore::new());
        let mut follower = follower(Arc::new(StubNode::new(101, 120)), store.clone()).with_inventory_feed(Arc::new(feed));
        let mut state = follower.initialize().await.unwrap();

        // 101 reconciles (gap 101), 107 is the first height more than 5 past 101
        for _ in 0..7 {
            assert!(follower.step(&mut state).await.unwrap());
        }
        assert_eq!(state.sync_height(), 108);
        assert_eq!(state.inventory_height(), 100);
    }

    #[tokio::test]
    async fn failed_reconcile_keeps_the_previous_inventory() {
        let mut seq = Sequence::new();
        let mut feed = MockInventorySource::new();
        feed.expect_describe().return_const("feed".to_string());
        feed.expect_fetch().times(1).in_sequence(&mut seq).returning(|| Ok(snapshot(100)));
        feed.expect_fetch().times(1).in_sequence(&mut seq).returning(|| {
            Err(err_with_loc!(InventoryError::Fetch {
                url: "feed".to_string(),
                reason: "connection reset".to_string(),
            }))
        });

        let store = Arc::new(InMemoryGraphStore::new());
        let mut follower = follower(Arc::new(StubNode::new(101, 120)), store.clone()).with_inventory_feed(Arc::new(feed));
        let mut state = follower.initialize().await.unwrap();

        // reconciles succeed at 101 and fail at 107
        for _ in 0..7 {
            assert!(follower.step(&mut state).await.unwrap());
        }

        assert_eq!(follower.last_inventory_attempt, 107);
        assert_eq!(state.inventory_height(), 100);
        assert_eq!(store.follower_info().await.map(|info| info.inventory_height), Some(100));
        assert_eq!(store.hotspot("hs1").await.and_then(|h| h.owner), Some("X".to_string()));
        assert_eq!(store.payment_count().await, 7);
    }

    #[test]
    fn run_future_can_be_spawned() {
        fn assert_send<T: Send>(_: T) {}
        let mut follower = follower(Arc::new(StubNode::new(101, 120)), Arc::new(InMemoryGraphStore::new()));
        assert_send(follower.run());
    }

    #[test]
    fn phase_names_are_snake_case() {
        assert_eq!(FollowerPhase::Bootstrapping.to_string(), "bootstrapping");
        assert_eq!(FollowerPhase::Idle.to_string(), "idle");
    }
}
