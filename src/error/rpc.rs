use thiserror::Error;

#[derive(Error, Debug)]
pub enum NodeClientError {
    #[error("[Node] Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("[Node] {method} failed with code {code}: {message}")]
    Upstream { method: String, code: i64, message: String },

    #[error("[Node] Transport error on {method}: {message}")]
    Transport { method: String, message: String },

    #[error("[Node] Failed to decode {kind}: {reason}")]
    Decode { kind: String, reason: String },

    #[error("[Node] Unknown transaction kind: {0}")]
    UnknownTransactionKind(String),

    #[error("[Node] Block {0} not found")]
    BlockNotFound(u64),

    #[error("[Node] Transaction {0} not found")]
    TransactionNotFound(String),
}

impl NodeClientError {
    /// Whether the node answered but the data is not usable yet.
    /// Transport and upstream failures are surfaced instead of retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            NodeClientError::Decode { .. }
                | NodeClientError::UnknownTransactionKind(_)
                | NodeClientError::BlockNotFound(_)
                | NodeClientError::TransactionNotFound(_)
        )
    }
}
