use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use sha2::Digest;
use sha2::Sha256;

use crate::constants::ACCOUNTS_COLLECTION;
use crate::constants::HOTSPOTS_COLLECTION;
use crate::err_with_loc;
use crate::error::Result;
use crate::utils::nanos_to_seconds;

/// Hex SHA-256 of the document's fields sorted by name, `_key` excluded.
/// Absent optional fields are skipped during serialization so they do not
/// take part in the key.
pub fn content_key<T: Serialize>(document: &T) -> Result<String> {
    let Value::Object(fields) = serde_json::to_value(document)? else {
        return Err(err_with_loc!("content_key::document_is_not_an_object"));
    };
    let canonical: BTreeMap<String, Value> = fields.into_iter().filter(|(name, _)| name != "_key").collect();
    let bytes = serde_json::to_vec(&canonical)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

pub fn vertex_id(
    collection: &str,
    key: &str,
) -> String {
    format!("{}/{}", collection, key)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    #[serde(rename = "_key")]
    pub key: String,
}

impl AccountRecord {
    pub fn new(address: impl Into<String>) -> Self { Self { key: address.into() } }
}

/// GeoJSON point, coordinates are `[lon, lat]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: [f64; 2],
}

impl GeoPoint {
    pub fn new(
        lon: f64,
        lat: f64,
    ) -> Self {
        Self {
            kind: "Point".to_string(),
            coordinates: [lon, lat],
        }
    }

    /// Stand-in for locations that do not decode
    pub fn origin() -> Self { Self::new(0.0, 0.0) }

    pub fn lon(&self) -> f64 { self.coordinates[0] }

    pub fn lat(&self) -> f64 { self.coordinates[1] }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HotspotRecord {
    #[serde(rename = "_key")]
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// H3 cell, hex encoded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_geo: Option<GeoPoint>,
    /// Parent H3 cell the inventory groups hotspots by
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_hex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_block: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_block: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevation: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gain: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward_scale: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_poc_challenge: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_poc_onion_key_hash: Option<String>,
    /// Witness list as exported by the feed, kept verbatim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub witnesses: Option<String>,
}

impl HotspotRecord {
    /// Key-only record for a hotspot seen in a transaction
    pub fn bare(address: impl Into<String>) -> Self {
        Self {
            key: address.into(),
            ..Default::default()
        }
    }

    pub fn is_bare(&self) -> bool { *self == Self::bare(self.key.clone()) }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentEdge {
    #[serde(rename = "_key")]
    pub key: String,
    #[serde(rename = "_from")]
    pub from: String,
    #[serde(rename = "_to")]
    pub to: String,
    pub hash: String,
    pub amount: u64,
    pub block: u64,
    pub timestamp: i64,
}

impl PaymentEdge {
    pub fn new(
        payer: &str,
        payee: &str,
        hash: &str,
        amount: u64,
        block: u64,
        timestamp: i64,
    ) -> Result<Self> {
        let mut edge = Self {
            key: String::new(),
            from: vertex_id(ACCOUNTS_COLLECTION, payer),
            to: vertex_id(ACCOUNTS_COLLECTION, payee),
            hash: hash.to_string(),
            amount,
            block,
            timestamp,
        };
        edge.key = content_key(&edge)?;
        Ok(edge)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptEdge {
    #[serde(rename = "_key")]
    pub key: String,
    #[serde(rename = "_from")]
    pub from: String,
    #[serde(rename = "_to")]
    pub to: String,
    pub hash: String,
    pub frequency: f64,
    pub datarate: String,
    pub signal: i64,
    pub snr: f64,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_valid: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_power: Option<i64>,
    /// Seconds between the challengee's receipt and this witness
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<f64>,
    pub block: u64,
}

/// Receipt fields a witness edge borrows from its path element
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReceiptContext {
    pub tx_power: Option<i64>,
    pub timestamp: i64,
}

impl ReceiptEdge {
    pub fn new(
        challengee: &str,
        witness: &crate::model::transaction::Witness,
        receipt: Option<ReceiptContext>,
        hash: &str,
        block: u64,
    ) -> Result<Self> {
        let mut edge = Self {
            key: String::new(),
            from: vertex_id(HOTSPOTS_COLLECTION, challengee),
            to: vertex_id(HOTSPOTS_COLLECTION, &witness.gateway),
            hash: hash.to_string(),
            frequency: witness.frequency,
            datarate: witness.datarate.clone(),
            signal: witness.signal,
            snr: witness.snr,
            timestamp: witness.timestamp,
            is_valid: witness.is_valid,
            tx_power: receipt.and_then(|r| r.tx_power),
            processing_time: receipt.map(|r| nanos_to_seconds(witness.timestamp - r.timestamp)),
            block,
        };
        edge.key = content_key(&edge)?;
        Ok(edge)
    }
}

/// Output of normalizing one transaction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedRecords {
    pub accounts: Vec<AccountRecord>,
    pub hotspots: Vec<HotspotRecord>,
    pub payments: Vec<PaymentEdge>,
    pub receipts: Vec<ReceiptEdge>,
}

impl NormalizedRecords {
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty() && self.hotspots.is_empty() && self.payments.is_empty() && self.receipts.is_empty()
    }
}

/// Everything one block contributes, deduplicated by key
#[derive(Debug, Clone, Default)]
pub struct BlockRecords {
    pub height: u64,
    accounts: BTreeMap<String, AccountRecord>,
    hotspots: BTreeMap<String, HotspotRecord>,
    payments: BTreeMap<String, PaymentEdge>,
    receipts: BTreeMap<String, ReceiptEdge>,
}

impl BlockRecords {
    pub fn new(height: u64) -> Self {
        Self {
            height,
            ..Default::default()
        }
    }

    pub fn merge(
        &mut self,
        records: NormalizedRecords,
    ) {
        for account in records.accounts {
            self.accounts.entry(account.key.clone()).or_insert(account);
        }
        for hotspot in records.hotspots {
            self.hotspots.entry(hotspot.key.clone()).or_insert(hotspot);
        }
        for payment in records.payments {
            self.payments.entry(payment.key.clone()).or_insert(payment);
        }
        for receipt in records.receipts {
            self.receipts.entry(receipt.key.clone()).or_insert(receipt);
        }
    }

    pub fn accounts(&self) -> impl ExactSizeIterator<Item = &AccountRecord> { self.accounts.values() }

    pub fn hotspots(&self) -> impl ExactSizeIterator<Item = &HotspotRecord> { self.hotspots.values() }

    pub fn payments(&self) -> impl ExactSizeIterator<Item = &PaymentEdge> { self.payments.values() }

    pub fn receipts(&self) -> impl ExactSizeIterator<Item = &ReceiptEdge> { self.receipts.values() }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty() && self.hotspots.is_empty() && self.payments.is_empty() && self.receipts.is_empty()
    }
}
