//! Deposit Event Scanner: turn the deposit events of one height into pending records.

use crate::abi::{DepositEvent, MakeTxParam};
use crate::error::Result;
use crate::record::CrossTransfer;
use crate::relayer::RelayContext;

/// Per-height scan counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub enqueued: usize,
    /// Already relayed according to the hub's done record.
    pub already_done: usize,
    /// Logs the node returned for a block other than the scanned one.
    pub skipped: usize,
}

/// Scan deposit events at exactly `height`. A failed log query or store write fails the
/// whole height; re-scanning is safe since pending keys are content hashes.
pub async fn scan_height(ctx: &RelayContext, height: u64) -> Result<ScanReport> {
    let events = ctx.source.filter_deposit_events(height, height).await?;
    let mut report = ScanReport::default();
    for ev in events {
        if ev.block_number != height {
            tracing::warn!(
                height,
                block_number = ev.block_number,
                tx_hash = %hex::encode(ev.tx_hash),
                "log outside the scanned height, skipping"
            );
            report.skipped += 1;
            continue;
        }
        if is_done_on_hub(ctx, &ev).await {
            tracing::debug!(height, tx_hash = %hex::encode(ev.tx_hash), "already relayed, skipping");
            report.already_done += 1;
            continue;
        }
        // The hub routes by the payload's MakeTxParam; the record only carries the low bits.
        let to_chain = ev.to_chain_id as u32;
        if u64::from(to_chain) != ev.to_chain_id {
            tracing::warn!(
                height,
                tx_hash = %hex::encode(ev.tx_hash),
                to_chain_id = ev.to_chain_id,
                "destination chain id truncated to u32"
            );
        }
        let record = CrossTransfer {
            tx_index: ev.tx_index,
            tx_id: ev.tx_hash.to_vec(),
            value: ev.raw_payload,
            to_chain,
            height,
        };
        let key = ctx.store.enqueue_pending(&record.encode())?;
        tracing::info!(height, %key, tx_index = %record.tx_index, "deposit enqueued");
        report.enqueued += 1;
    }
    Ok(report)
}

/// Hub done-record lookup. Undecodable payloads and lookup errors count as not done;
/// the hub rejects a duplicate relay with an idempotent error anyway.
async fn is_done_on_hub(ctx: &RelayContext, ev: &DepositEvent) -> bool {
    let param = match MakeTxParam::decode(&ev.raw_payload) {
        Ok(param) => param,
        Err(e) => {
            tracing::warn!(reason = %e, tx_hash = %hex::encode(ev.tx_hash), "undecodable deposit payload");
            return false;
        }
    };
    match ctx
        .hub
        .query_done_record(ctx.config.side_chain_id, &param.cross_chain_id)
        .await
    {
        Ok(done) => done,
        Err(e) => {
            tracing::warn!(reason = %e, tx_hash = %hex::encode(ev.tx_hash), "done record query failed");
            false
        }
    }
}
