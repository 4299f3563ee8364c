use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;
use serde::Deserialize;
use tracing::debug;
use tracing::info;

use crate::err_with_loc;
use crate::error::InventoryError;
use crate::error::Result;
use crate::inventory::geo::geo_point;
use crate::inventory::InventorySnapshot;
use crate::model::HotspotRecord;
use crate::utils::parse_inventory_generation;
use crate::utils::path_file_name;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// One row of the gateway inventory CSV. Every column is optional here so a
/// bad row can be dropped instead of failing the whole snapshot. Only
/// address, owner, location, name and first_block are required, the other
/// columns are often blank for new or inactive hotspots.
#[derive(Debug, Default, Deserialize)]
struct InventoryRow {
    address: Option<String>,
    owner: Option<String>,
    location: Option<String>,
    name: Option<String>,
    first_block: Option<String>,
    last_block: Option<String>,
    mode: Option<String>,
    payer: Option<String>,
    nonce: Option<String>,
    elevation: Option<String>,
    gain: Option<String>,
    reward_scale: Option<String>,
    first_timestamp: Option<String>,
    location_hex: Option<String>,
    last_poc_challenge: Option<String>,
    last_poc_onion_key_hash: Option<String>,
    witnesses: Option<String>,
}

impl InventoryRow {
    fn into_record(self) -> Option<HotspotRecord> {
        let address = present(self.address)?;
        let owner = present(self.owner)?;
        let location = present(self.location)?;
        let name = present(self.name)?;
        let first_block = present(self.first_block).as_deref().and_then(parse_integer)?;

        Some(HotspotRecord {
            location_geo: Some(geo_point(&location)),
            key: address,
            owner: Some(owner),
            location: Some(location),
            name: Some(name),
            mode: present(self.mode),
            payer: present(self.payer),
            first_block: u64::try_from(first_block).ok(),
            last_block: present(self.last_block)
                .as_deref()
                .and_then(parse_integer)
                .and_then(|v| u64::try_from(v).ok()),
            nonce: present(self.nonce)
                .as_deref()
                .and_then(parse_integer)
                .and_then(|v| u64::try_from(v).ok()),
            elevation: present(self.elevation).as_deref().and_then(parse_integer),
            gain: present(self.gain).as_deref().and_then(parse_integer),
            reward_scale: present(self.reward_scale).and_then(|v| v.parse().ok()),
            first_timestamp: present(self.first_timestamp),
            location_hex: present(self.location_hex),
            last_poc_challenge: present(self.last_poc_challenge)
                .as_deref()
                .and_then(parse_integer)
                .and_then(|v| u64::try_from(v).ok()),
            last_poc_onion_key_hash: present(self.last_poc_onion_key_hash),
            witnesses: present(self.witnesses),
        })
    }
}

fn present(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

// Exports sometimes write integer columns as floats ("1180.0")
fn parse_integer(value: &str) -> Option<i64> {
    value.parse::<i64>().ok().or_else(|| {
        value
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && v.fract() == 0.0)
            .map(|v| v as i64)
    })
}

/// Parse a CSV snapshot, gunzipping first when the body carries the gzip magic.
/// Blocking, run it off the async runtime.
pub fn parse_snapshot(
    body: &[u8],
    source_name: &str,
) -> Result<Vec<HotspotRecord>> {
    let parse_error = |reason: String| {
        err_with_loc!(InventoryError::Parse {
            source_name: source_name.to_string(),
            reason,
        })
    };

    let reader: Box<dyn Read + '_> = if body.starts_with(&GZIP_MAGIC) {
        Box::new(GzDecoder::new(body))
    } else {
        Box::new(body)
    };

    let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = csv_reader.headers().map_err(|e| parse_error(e.to_string()))?.clone();
    if !headers.iter().any(|h| h == "address") {
        return Err(parse_error("no address column".to_string()));
    }

    let mut records = Vec::new();
    let mut dropped = 0usize;
    for row in csv_reader.deserialize::<InventoryRow>() {
        match row {
            Ok(row) => match row.into_record() {
                Some(record) => records.push(record),
                None => dropped += 1,
            },
            Err(e) if e.is_io_error() => return Err(parse_error(e.to_string())),
            Err(e) => {
                debug!("inventory_row_unreadable::{}::{}", source_name, e);
                dropped += 1;
            },
        }
    }

    if dropped > 0 {
        debug!("inventory_rows_dropped::{}::{}", source_name, dropped);
    }
    info!("inventory_parsed::{}::records::{}", source_name, records.len());
    Ok(records)
}

/// Load a snapshot from disk, either a JSON array of hotspot records or a
/// CSV (optionally gzipped) in the feed format
pub fn load_local_inventory(path: &Path) -> Result<InventorySnapshot> {
    let source_name = path.display().to_string();
    let body = std::fs::read(path).map_err(|e| {
        err_with_loc!(InventoryError::Fetch {
            url: source_name.clone(),
            reason: e.to_string(),
        })
    })?;

    let file_name = path_file_name(path).unwrap_or_default();
    let records = if file_name.ends_with(".json") {
        let mut records: Vec<HotspotRecord> = serde_json::from_slice(&body).map_err(|e| {
            err_with_loc!(InventoryError::Parse {
                source_name: source_name.clone(),
                reason: e.to_string(),
            })
        })?;
        records.retain(|record| !record.key.is_empty());
        for record in records.iter_mut() {
            if record.location_geo.is_none() {
                record.location_geo = record.location.as_deref().map(geo_point);
            }
        }
        records
    } else {
        parse_snapshot(&body, &source_name)?
    };

    Ok(InventorySnapshot {
        records,
        generation: parse_inventory_generation(file_name).unwrap_or(0),
    })
}
