use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::NodeClientError;

/// Transaction kinds the follower knows how to turn into graph records.
/// Everything else is carried as `Unhandled` and skipped.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    PaymentV1,
    PaymentV2,
    PocReceiptsV1,
    PocReceiptsV2,
    Unhandled(String),
}

impl TransactionKind {
    pub fn as_str(&self) -> &str {
        match self {
            TransactionKind::PaymentV1 => "payment_v1",
            TransactionKind::PaymentV2 => "payment_v2",
            TransactionKind::PocReceiptsV1 => "poc_receipts_v1",
            TransactionKind::PocReceiptsV2 => "poc_receipts_v2",
            TransactionKind::Unhandled(kind) => kind,
        }
    }

    pub fn is_handled(&self) -> bool { !matches!(self, TransactionKind::Unhandled(_)) }
}

impl From<&str> for TransactionKind {
    fn from(kind: &str) -> Self {
        match kind {
            "payment_v1" => TransactionKind::PaymentV1,
            "payment_v2" => TransactionKind::PaymentV2,
            "poc_receipts_v1" => TransactionKind::PocReceiptsV1,
            "poc_receipts_v2" => TransactionKind::PocReceiptsV2,
            other => TransactionKind::Unhandled(other.to_string()),
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentV1 {
    pub hash: String,
    pub payer: String,
    pub payee: String,
    pub amount: u64,
    #[serde(default)]
    pub fee: Option<u64>,
    #[serde(default)]
    pub nonce: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub payee: String,
    pub amount: u64,
    #[serde(default)]
    pub memo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentV2 {
    pub hash: String,
    pub payer: String,
    pub payments: Vec<Payment>,
    #[serde(default)]
    pub fee: Option<u64>,
    #[serde(default)]
    pub nonce: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Witness {
    pub gateway: String,
    pub frequency: f64,
    pub datarate: String,
    pub signal: i64,
    pub snr: f64,
    /// Nanoseconds
    pub timestamp: i64,
    #[serde(default)]
    pub is_valid: Option<bool>,
    #[serde(default)]
    pub channel: Option<i64>,
    #[serde(default)]
    pub packet_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub gateway: String,
    /// Nanoseconds
    pub timestamp: i64,
    #[serde(default)]
    pub tx_power: Option<i64>,
    #[serde(default)]
    pub signal: Option<i64>,
    #[serde(default)]
    pub snr: Option<f64>,
    #[serde(default)]
    pub frequency: Option<f64>,
    #[serde(default)]
    pub datarate: Option<String>,
    #[serde(default)]
    pub channel: Option<i64>,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathElement {
    pub challengee: String,
    #[serde(default)]
    pub receipt: Option<Receipt>,
    pub witnesses: Vec<Witness>,
}

/// Shared body of `poc_receipts_v1` and `poc_receipts_v2`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PocReceipts {
    pub hash: String,
    pub challenger: String,
    pub path: Vec<PathElement>,
    #[serde(default)]
    pub fee: Option<u64>,
    #[serde(default)]
    pub onion_key_hash: Option<String>,
    #[serde(default)]
    pub request_block_hash: Option<String>,
    #[serde(default)]
    pub block_hash: Option<String>,
    #[serde(default)]
    pub secret: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Transaction {
    PaymentV1(PaymentV1),
    PaymentV2(PaymentV2),
    PocReceiptsV1(PocReceipts),
    PocReceiptsV2(PocReceipts),
}

impl Transaction {
    /// Decode a `transaction_get` result into the shape named by the block's reference.
    /// The payload is never used to guess its own kind.
    pub fn decode(
        kind: &TransactionKind,
        payload: Value,
    ) -> Result<Self, NodeClientError> {
        match kind {
            TransactionKind::PaymentV1 => decode_as(kind, payload).map(Transaction::PaymentV1),
            TransactionKind::PaymentV2 => decode_as(kind, payload).map(Transaction::PaymentV2),
            TransactionKind::PocReceiptsV1 => decode_as(kind, payload).map(Transaction::PocReceiptsV1),
            TransactionKind::PocReceiptsV2 => decode_as(kind, payload).map(Transaction::PocReceiptsV2),
            TransactionKind::Unhandled(other) => Err(NodeClientError::UnknownTransactionKind(other.clone())),
        }
    }

    pub fn hash(&self) -> &str {
        match self {
            Transaction::PaymentV1(txn) => &txn.hash,
            Transaction::PaymentV2(txn) => &txn.hash,
            Transaction::PocReceiptsV1(txn) | Transaction::PocReceiptsV2(txn) => &txn.hash,
        }
    }

    pub fn kind(&self) -> TransactionKind {
        match self {
            Transaction::PaymentV1(_) => TransactionKind::PaymentV1,
            Transaction::PaymentV2(_) => TransactionKind::PaymentV2,
            Transaction::PocReceiptsV1(_) => TransactionKind::PocReceiptsV1,
            Transaction::PocReceiptsV2(_) => TransactionKind::PocReceiptsV2,
        }
    }
}

fn decode_as<T: DeserializeOwned>(
    kind: &TransactionKind,
    payload: Value,
) -> Result<T, NodeClientError> {
    serde_json::from_value(payload).map_err(|e| NodeClientError::Decode {
        kind: kind.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[rstest]
    #[case("payment_v1", TransactionKind::PaymentV1)]
    #[case("payment_v2", TransactionKind::PaymentV2)]
    #[case("poc_receipts_v1", TransactionKind::PocReceiptsV1)]
    #[case("poc_receipts_v2", TransactionKind::PocReceiptsV2)]
    #[case("add_gateway_v1", TransactionKind::Unhandled("add_gateway_v1".to_string()))]
    fn kind_round_trips_through_wire_tag(
        #[case] tag: &str,
        #[case] kind: TransactionKind,
    ) {
        assert_eq!(TransactionKind::from(tag), kind);
        assert_eq!(kind.as_str(), tag);
    }

    #[test]
    fn decodes_payment_v2_into_named_variant() {
        let txn = Transaction::decode(
            &TransactionKind::PaymentV2,
            json!({
                "type": "payment_v2",
                "hash": "h1",
                "payer": "payer",
                "fee": 35000,
                "nonce": 3,
                "payments": [{"payee": "a", "amount": 10}, {"payee": "b", "amount": 20, "memo": "AAAAAAAAAAA="}]
            }),
        )
        .unwrap();

        let Transaction::PaymentV2(payment) = txn else {
            panic!("expected payment_v2");
        };
        assert_eq!(payment.payments.len(), 2);
        assert_eq!(payment.payments[1].memo.as_deref(), Some("AAAAAAAAAAA="));
    }

    #[test]
    fn missing_required_field_is_a_decode_error() {
        let err = Transaction::decode(&TransactionKind::PaymentV1, json!({"hash": "h", "payer": "p", "amount": 1}))
            .unwrap_err();
        match err {
            NodeClientError::Decode { kind, reason } => {
                assert_eq!(kind, "payment_v1");
                assert!(reason.contains("payee"), "{reason}");
            },
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn same_payload_decoded_under_wrong_kind_fails() {
        let payment = json!({"hash": "h", "payer": "p", "payee": "q", "amount": 1});
        assert!(Transaction::decode(&TransactionKind::PocReceiptsV1, payment).is_err());
    }

    #[test]
    fn unhandled_kind_is_rejected() {
        let err = Transaction::decode(&TransactionKind::from("rewards_v2"), json!({})).unwrap_err();
        assert!(matches!(err, NodeClientError::UnknownTransactionKind(kind) if kind == "rewards_v2"));
    }

    #[test]
    fn receipt_is_optional_on_path_elements() {
        let txn = Transaction::decode(
            &TransactionKind::PocReceiptsV1,
            json!({
                "hash": "poc",
                "challenger": "challenger",
                "path": [{
                    "challengee": "c",
                    "receipt": null,
                    "witnesses": [{
                        "gateway": "w", "frequency": 904.1, "datarate": "SF9BW125",
                        "signal": -110, "snr": -7.5, "timestamp": 1_000, "is_valid": true
                    }]
                }]
            }),
        )
        .unwrap();
        let Transaction::PocReceiptsV1(poc) = txn else {
            panic!("expected poc_receipts_v1");
        };
        assert!(poc.path[0].receipt.is_none());
        assert_eq!(poc.path[0].witnesses[0].is_valid, Some(true));
    }
}
