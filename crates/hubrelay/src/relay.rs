//! Proof Relay Worker: prove pending transfers against a final height and hand them
//! to the hub.

use crate::error::{RelayError, Result};
use crate::header_sync::build_bundle;
use crate::proof::{key_path, mapping_key, parse_text_proof, EthProof, ProofValue};
use crate::record::CrossTransfer;
use crate::relayer::RelayContext;

/// What happened to one pending record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// `reference <= height + lag`; left pending.
    NotProvable,
    /// Hub accepted the transfer under this tx hash.
    Submitted(String),
    /// Hub already processed the transfer.
    AlreadyDone,
}

/// Per-cycle counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayReport {
    pub submitted: usize,
    pub already_done: usize,
    pub not_provable: usize,
    pub failed: usize,
    pub quarantined: usize,
}

/// One pass over a snapshot of the pending collection. A single record's failure
/// never aborts the pass; only failing to list the collection does.
pub async fn relay_pending(ctx: &RelayContext) -> Result<RelayReport> {
    let reference = ctx.cursor.get();
    let pending = ctx.store.list_pending()?;
    let mut report = RelayReport::default();

    for (key, bytes) in pending {
        let record = match CrossTransfer::decode(&bytes) {
            Ok(record) => record,
            Err(e) => {
                tracing::error!(reason = %e, %key, "corrupt pending record, quarantining");
                match ctx.store.quarantine(&key, &bytes, &e.to_string()) {
                    Ok(()) => report.quarantined += 1,
                    Err(e) => {
                        tracing::error!(reason = %e, %key, "quarantine failed");
                        report.failed += 1;
                    }
                }
                continue;
            }
        };

        match relay_one(ctx, reference, &record).await {
            Ok(RelayOutcome::NotProvable) => report.not_provable += 1,
            Ok(RelayOutcome::Submitted(tx_hash)) => match ctx.store.promote(&key, &tx_hash, &bytes) {
                Ok(()) => {
                    tracing::info!(%key, %tx_hash, height = record.height, "transfer submitted");
                    report.submitted += 1;
                }
                Err(e) => {
                    tracing::error!(reason = %e, %key, %tx_hash, "persist awaiting entry failed");
                    report.failed += 1;
                }
            },
            Ok(RelayOutcome::AlreadyDone) => {
                tracing::info!(%key, tx_id = %record.tx_id_hex(), "transfer already done on hub");
                match ctx.store.remove_pending(&key) {
                    Ok(()) => report.already_done += 1,
                    Err(e) => {
                        tracing::error!(reason = %e, %key, "remove pending failed");
                        report.failed += 1;
                    }
                }
            }
            Err(e) => {
                tracing::warn!(reason = %e, %key, height = record.height, "relay failed, will retry");
                report.failed += 1;
            }
        }
    }
    Ok(report)
}

/// Prove and submit one record against `reference`, the tracker's processed height.
pub async fn relay_one(ctx: &RelayContext, reference: u64, record: &CrossTransfer) -> Result<RelayOutcome> {
    if !ctx.strategy.is_provable(record.height, reference) {
        tracing::trace!(height = record.height, reference, "not yet provable");
        return Ok(RelayOutcome::NotProvable);
    }
    let proof_height = ctx.strategy.proof_height(reference);
    let storage_key = mapping_key(&record.tx_index)?;

    let raw_proof = ctx
        .source
        .fetch_storage_proof(&ctx.eccd_address, &storage_key, proof_height)
        .await?;
    let proof = EthProof::from_slice(&raw_proof)?;
    let ops = parse_text_proof(proof.storage_proof_text()?)?;
    let payload = ProofValue {
        kp: key_path(&ops),
        value: record.value.clone(),
    }
    .encode()?;

    // The next header commits to the proof height's state root.
    let header_height = proof_height + 1;
    let bundle = build_bundle(ctx.source.as_ref(), header_height).await?.encode()?;
    let submit_height = u32::try_from(header_height)
        .map_err(|_| RelayError::Decode(format!("proof height {header_height} exceeds u32")))?;

    match ctx
        .hub
        .submit_inbound_transfer(
            ctx.config.side_chain_id,
            &payload,
            submit_height,
            &raw_proof,
            &bundle,
        )
        .await
    {
        Ok(tx_hash) => Ok(RelayOutcome::Submitted(tx_hash)),
        Err(e) if e.is_already_done() => Ok(RelayOutcome::AlreadyDone),
        Err(e) => Err(e),
    }
}
