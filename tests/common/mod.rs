#![allow(dead_code)]

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;
use serde_json::Value;
use tabi::config::FollowerConfig;
use tabi::err_with_loc;
use tabi::error::NodeClientError;
use tabi::error::Result;
use tabi::model::Block;
use tabi::model::Transaction;
use tabi::model::TransactionKind;
use tabi::model::TransactionReference;
use tabi::rpc::NodeClient;

/// In-process chain for driving the follower without a node
#[derive(Default)]
pub struct FakeChain {
    tip: AtomicU64,
    blocks: Mutex<BTreeMap<u64, Block>>,
    transactions: Mutex<HashMap<String, Value>>,
    /// Transactions that report not-found this many more times
    hidden: Mutex<HashMap<String, usize>>,
    /// Heights answered with an upstream error
    broken: Mutex<HashMap<u64, i64>>,
    block_calls: Mutex<HashMap<u64, usize>>,
}

impl FakeChain {
    pub fn new(tip: u64) -> Self {
        let chain = Self::default();
        chain.tip.store(tip, Ordering::SeqCst);
        chain
    }

    /// Empty blocks for every height in `from..=to`
    pub fn with_empty_blocks(
        self,
        from: u64,
        to: u64,
    ) -> Self {
        for height in from..=to {
            self.put_block(height, vec![]);
        }
        self
    }

    pub fn set_tip(
        &self,
        tip: u64,
    ) {
        self.tip.store(tip, Ordering::SeqCst);
    }

    pub fn put_block(
        &self,
        height: u64,
        transactions: Vec<(&str, &str)>,
    ) {
        let block = Block {
            height,
            time: 1_600_000_000 + height as i64 * 60,
            hash: format!("block-{height}"),
            prev_hash: height.checked_sub(1).map(|h| format!("block-{h}")),
            transactions: transactions
                .into_iter()
                .map(|(hash, kind)| TransactionReference {
                    hash: hash.to_string(),
                    kind: kind.to_string(),
                })
                .collect(),
        };
        self.blocks.lock().unwrap().insert(height, block);
    }

    pub fn put_transaction(
        &self,
        hash: &str,
        payload: Value,
    ) {
        self.transactions.lock().unwrap().insert(hash.to_string(), payload);
    }

    /// Block at `height` holding one payment_v1
    pub fn put_payment_block(
        &self,
        height: u64,
        payer: &str,
        payee: &str,
        amount: u64,
    ) {
        let hash = format!("pay-{height}");
        self.put_transaction(&hash, payment_v1(&hash, payer, payee, amount));
        self.put_block(height, vec![(hash.as_str(), "payment_v1")]);
    }

    /// Block at `height` holding one poc receipt with the given witnesses
    pub fn put_poc_block(
        &self,
        height: u64,
        challengee: &str,
        witnesses: &[&str],
    ) {
        let hash = format!("poc-{height}");
        self.put_transaction(&hash, poc_receipts_v1(&hash, challengee, witnesses));
        self.put_block(height, vec![(hash.as_str(), "poc_receipts_v1")]);
    }

    pub fn hide_transaction(
        &self,
        hash: &str,
        times: usize,
    ) {
        self.hidden.lock().unwrap().insert(hash.to_string(), times);
    }

    pub fn break_block(
        &self,
        height: u64,
        code: i64,
    ) {
        self.broken.lock().unwrap().insert(height, code);
    }

    pub fn block_calls(
        &self,
        height: u64,
    ) -> usize {
        self.block_calls.lock().unwrap().get(&height).copied().unwrap_or(0)
    }
}

#[async_trait]
impl NodeClient for FakeChain {
    async fn height(&self) -> Result<u64> { Ok(self.tip.load(Ordering::SeqCst)) }

    async fn get_block(
        &self,
        height: Option<u64>,
        hash: Option<&str>,
    ) -> Result<Option<Block>> {
        let height = match (height, hash) {
            (Some(height), None) => height,
            _ => return Err(err_with_loc!(NodeClientError::InvalidArgument("height only".to_string()))),
        };
        *self.block_calls.lock().unwrap().entry(height).or_default() += 1;

        if let Some(code) = self.broken.lock().unwrap().get(&height) {
            return Err(err_with_loc!(NodeClientError::Upstream {
                method: "block_get".to_string(),
                code: *code,
                message: "boom".to_string(),
            }));
        }
        Ok(self.blocks.lock().unwrap().get(&height).cloned())
    }

    async fn get_transaction(
        &self,
        hash: &str,
        kind: &str,
    ) -> Result<Transaction> {
        let kind = TransactionKind::from(kind);
        if !kind.is_handled() {
            return Err(err_with_loc!(NodeClientError::UnknownTransactionKind(kind.to_string())));
        }

        {
            let mut hidden = self.hidden.lock().unwrap();
            if let Some(remaining) = hidden.get_mut(hash) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(err_with_loc!(NodeClientError::TransactionNotFound(hash.to_string())));
                }
            }
        }

        let payload = self
            .transactions
            .lock()
            .unwrap()
            .get(hash)
            .cloned()
            .ok_or_else(|| err_with_loc!(NodeClientError::TransactionNotFound(hash.to_string())))?;
        Ok(Transaction::decode(&kind, payload)?)
    }
}

pub fn payment_v1(
    hash: &str,
    payer: &str,
    payee: &str,
    amount: u64,
) -> Value {
    json!({
        "type": "payment_v1",
        "hash": hash,
        "payer": payer,
        "payee": payee,
        "amount": amount,
        "fee": 30000,
        "nonce": 1
    })
}

pub fn poc_receipts_v1(
    hash: &str,
    challengee: &str,
    witnesses: &[&str],
) -> Value {
    let witnesses: Vec<Value> = witnesses
        .iter()
        .enumerate()
        .map(|(i, gateway)| {
            json!({
                "gateway": gateway,
                "timestamp": 1_600_000_000_500_000_000i64 + i as i64 * 1_000_000,
                "signal": -100 - i as i64,
                "snr": 5.5,
                "frequency": 904.1,
                "datarate": "SF9BW125",
                "channel": 3,
                "is_valid": true,
                "packet_hash": "abc"
            })
        })
        .collect();

    json!({
        "type": "poc_receipts_v1",
        "hash": hash,
        "challenger": "challenger",
        "secret": "s",
        "onion_key_hash": "o",
        "request_block_hash": "r",
        "fee": 0,
        "path": [{
            "challengee": challengee,
            "receipt": {
                "gateway": challengee,
                "timestamp": 1_600_000_000_000_000_000i64,
                "signal": 0,
                "snr": 0.0,
                "frequency": 904.1,
                "channel": 3,
                "data": "",
                "origin": "p2p",
                "tx_power": 27
            },
            "witnesses": witnesses
        }]
    })
}

/// Fast timings so retries and idle waits do not slow the suite down
pub fn fast_config() -> FollowerConfig {
    FollowerConfig {
        block_inventory_size: 50,
        idle_interval_ms: 5,
        retry_backoff_ms: 1,
        max_block_attempts: 4,
        ..Default::default()
    }
}

pub fn shared(chain: FakeChain) -> Arc<FakeChain> { Arc::new(chain) }
