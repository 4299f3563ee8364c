use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use serde_json::Value;
use tracing::debug;
use tracing::error;

use crate::config::NodeConfig;
use crate::constants::RPC_METHOD_BLOCK_GET;
use crate::constants::RPC_METHOD_BLOCK_HEIGHT;
use crate::constants::RPC_METHOD_TRANSACTION_GET;
use crate::err_with_loc;
use crate::error::NodeClientError;
use crate::error::Result;
use crate::model::Block;
use crate::model::Transaction;
use crate::model::TransactionKind;
use crate::rpc::call::RpcRequest;
use crate::rpc::NodeClient;

/// JSON-RPC 2.0 client for the blockchain node
#[derive(Debug, Clone)]
pub struct JsonRpcNodeClient {
    address: String,
    http: reqwest::Client,
}

impl JsonRpcNodeClient {
    pub fn new(config: &NodeConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| {
                err_with_loc!(NodeClientError::Transport {
                    method: "client_init".to_string(),
                    message: e.to_string(),
                })
            })?;

        Ok(Self {
            address: config.address.clone(),
            http,
        })
    }

    pub fn address(&self) -> &str { &self.address }

    async fn call(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<Option<Value>> {
        let request = RpcRequest::new(method, params);
        debug!("rpc_call::{}::id::{}", method, request.id);
        request.send(&self.http, &self.address).await.map_err(|e| {
            error!("rpc_call_failed::{}::{}", method, e);
            err_with_loc!(e)
        })
    }
}

#[async_trait]
impl NodeClient for JsonRpcNodeClient {
    async fn height(&self) -> Result<u64> {
        let value = self
            .call(RPC_METHOD_BLOCK_HEIGHT, None)
            .await?
            .ok_or_else(|| {
                err_with_loc!(NodeClientError::Decode {
                    kind: RPC_METHOD_BLOCK_HEIGHT.to_string(),
                    reason: "empty result".to_string(),
                })
            })?;

        value.as_u64().ok_or_else(|| {
            err_with_loc!(NodeClientError::Decode {
                kind: RPC_METHOD_BLOCK_HEIGHT.to_string(),
                reason: format!("expected an unsigned integer, got {}", value),
            })
        })
    }

    async fn get_block(
        &self,
        height: Option<u64>,
        hash: Option<&str>,
    ) -> Result<Option<Block>> {
        let params = match (height, hash) {
            (Some(height), None) => json!({ "height": height }),
            (None, Some(hash)) => json!({ "hash": hash }),
            _ => {
                return Err(err_with_loc!(NodeClientError::InvalidArgument(
                    "block_get needs exactly one of height or hash".to_string()
                )));
            },
        };

        let Some(value) = self.call(RPC_METHOD_BLOCK_GET, Some(params)).await? else {
            return Ok(None);
        };

        let block = serde_json::from_value::<Block>(value).map_err(|e| {
            err_with_loc!(NodeClientError::Decode {
                kind: "block".to_string(),
                reason: e.to_string(),
            })
        })?;
        Ok(Some(block))
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

        let value = self
            .call(RPC_METHOD_TRANSACTION_GET, Some(json!({ "hash": hash })))
            .await?
            .ok_or_else(|| err_with_loc!(NodeClientError::TransactionNotFound(hash.to_string())))?;

        Transaction::decode(&kind, value).map_err(|e| {
            error!("transaction_decode_failed::{}::{}", hash, e);
            err_with_loc!(e)
        })
    }
}
