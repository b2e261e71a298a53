//! Confirmation Checker: settle submitted transfers once the hub reports a terminal state.

use crate::error::Result;
use crate::hub::TxState;
use crate::relayer::RelayContext;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckReport {
    pub confirmed: usize,
    /// Failed on the hub and moved back to pending.
    pub requeued: usize,
    pub not_found: usize,
    /// Query or store errors; entry left as is.
    pub errors: usize,
}

/// One pass over the awaiting collection. Entries are only removed on a definitive hub
/// state; query errors leave them for the next pass.
pub async fn check_awaiting(ctx: &RelayContext) -> Result<CheckReport> {
    let awaiting = ctx.store.list_awaiting()?;
    let mut report = CheckReport::default();

    for (tx_hash, record) in awaiting {
        let state = match ctx.hub.get_transaction_state(&tx_hash).await {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(reason = %e, %tx_hash, "tx state query failed");
                report.errors += 1;
                continue;
            }
        };
        let settled = match state {
            TxState::NotFound => {
                report.not_found += 1;
                continue;
            }
            TxState::Success => ctx.store.remove_awaiting(&tx_hash).map(|()| {
                tracing::info!(%tx_hash, "transfer confirmed");
                report.confirmed += 1;
            }),
            TxState::Failed => ctx.store.demote(&tx_hash, &record).map(|key| {
                tracing::warn!(%tx_hash, %key, "transfer failed on hub, requeued");
                report.requeued += 1;
            }),
        };
        if let Err(e) = settled {
            tracing::error!(reason = %e, %tx_hash, "settle awaiting entry failed");
            report.errors += 1;
        }
    }
    Ok(report)
}
