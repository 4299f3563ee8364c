use serde::Deserialize;
use serde::Serialize;

use super::transaction::TransactionKind;

/// Reference to a transaction as listed inside a block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReference {
    pub hash: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl TransactionReference {
    pub fn kind(&self) -> TransactionKind { TransactionKind::from(self.kind.as_str()) }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub height: u64,
    pub time: i64,
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub prev_hash: Option<String>,
    #[serde(default)]
    pub transactions: Vec<TransactionReference>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn decodes_node_block_payload() {
        let block: Block = serde_json::from_value(json!({
            "hash": "La6PuV80Ps9qTP0339Pwm64q3_deMTkv6JOo1251EJI",
            "height": 1_156_260,
            "prev_hash": "kFQPQ6-X8Ur4pWxgrf5lo2jdMvAsPT69EIYOfPImZZk",
            "time": 1_639_000_000,
            "transactions": [
                {"hash": "aaa", "type": "payment_v2"},
                {"hash": "bbb", "type": "add_gateway_v1"}
            ]
        }))
        .unwrap();

        assert_eq!(block.height, 1_156_260);
        assert_eq!(block.transactions.len(), 2);
        assert_eq!(block.transactions[0].kind(), TransactionKind::PaymentV2);
        assert_eq!(block.transactions[1].kind(), TransactionKind::Unhandled("add_gateway_v1".to_string()));
    }

    #[test]
    fn empty_block_has_no_transactions() {
        let block: Block = serde_json::from_value(json!({"height": 7, "time": 0})).unwrap();
        assert!(block.transactions.is_empty());
    }
}
