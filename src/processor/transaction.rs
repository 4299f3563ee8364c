use std::collections::HashSet;

use crate::error::Result;
use crate::model::record::ReceiptContext;
use crate::model::transaction::PaymentV1;
use crate::model::transaction::PaymentV2;
use crate::model::transaction::PocReceipts;
use crate::model::AccountRecord;
use crate::model::HotspotRecord;
use crate::model::NormalizedRecords;
use crate::model::PaymentEdge;
use crate::model::ReceiptEdge;
use crate::model::Transaction;

/// Turn one decoded transaction into graph records.
///
/// Pure: the same transaction and block context always give the same records
/// and keys, which is what makes reprocessing a block harmless.
pub fn normalize(
    transaction: &Transaction,
    block_height: u64,
    block_time: i64,
) -> Result<NormalizedRecords> {
    match transaction {
        Transaction::PaymentV1(payment) => normalize_payment_v1(payment, block_height, block_time),
        Transaction::PaymentV2(payment) => normalize_payment_v2(payment, block_height, block_time),
        Transaction::PocReceiptsV1(poc) | Transaction::PocReceiptsV2(poc) => normalize_poc_receipts(poc, block_height),
    }
}

fn normalize_payment_v1(
    payment: &PaymentV1,
    block_height: u64,
    block_time: i64,
) -> Result<NormalizedRecords> {
    let edge = PaymentEdge::new(
        &payment.payer,
        &payment.payee,
        &payment.hash,
        payment.amount,
        block_height,
        block_time,
    )?;

    Ok(NormalizedRecords {
        accounts: distinct_accounts([payment.payer.as_str(), payment.payee.as_str()]),
        payments: vec![edge],
        ..Default::default()
    })
}

fn normalize_payment_v2(
    payment: &PaymentV2,
    block_height: u64,
    block_time: i64,
) -> Result<NormalizedRecords> {
    let payments = payment
        .payments
        .iter()
        .map(|sub| PaymentEdge::new(&payment.payer, &sub.payee, &payment.hash, sub.amount, block_height, block_time))
        .collect::<Result<Vec<_>>>()?;

    let participants = std::iter::once(payment.payer.as_str()).chain(payment.payments.iter().map(|sub| sub.payee.as_str()));

    Ok(NormalizedRecords {
        accounts: distinct_accounts(participants),
        payments,
        ..Default::default()
    })
}

// Only the first hop's witnesses are recorded
fn normalize_poc_receipts(
    poc: &PocReceipts,
    block_height: u64,
) -> Result<NormalizedRecords> {
    let Some(element) = poc.path.first() else {
        return Ok(NormalizedRecords::default());
    };

    let receipt = element.receipt.as_ref().map(|receipt| ReceiptContext {
        tx_power: receipt.tx_power,
        timestamp: receipt.timestamp,
    });

    let receipts = element
        .witnesses
        .iter()
        .map(|witness| ReceiptEdge::new(&element.challengee, witness, receipt, &poc.hash, block_height))
        .collect::<Result<Vec<_>>>()?;

    let participants =
        std::iter::once(element.challengee.as_str()).chain(element.witnesses.iter().map(|w| w.gateway.as_str()));
    let mut seen = HashSet::new();
    let hotspots = participants
        .filter(|address| seen.insert(*address))
        .map(HotspotRecord::bare)
        .collect();

    Ok(NormalizedRecords {
        hotspots,
        receipts,
        ..Default::default()
    })
}

fn distinct_accounts<'a>(addresses: impl IntoIterator<Item = &'a str>) -> Vec<AccountRecord> {
    let mut seen = HashSet::new();
    addresses
        .into_iter()
        .filter(|address| seen.insert(*address))
        .map(AccountRecord::new)
        .collect()
}
