//! Header Synchronizer: push a header bundle to the hub whenever the side chain's
//! validator set rotates.

use crate::error::{RelayError, Result};
use crate::header::HeaderBundle;
use crate::hub::HubChain;
use crate::relayer::RelayContext;
use crate::source::SourceChain;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// What header sync did for one height.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderSync {
    /// Validator set unchanged; nothing submitted.
    Unchanged,
    /// Bundle submitted and seen in a hub block.
    Submitted { tx_hash: String },
    /// Hub already holds a later header for this epoch.
    Superseded,
}

/// Header, commit, and validator set at `height`.
pub async fn build_bundle(source: &dyn SourceChain, height: u64) -> Result<HeaderBundle> {
    let signed = source.fetch_commit(height).await?;
    let validators = source.fetch_validators(height).await?;
    Ok(HeaderBundle::new(signed, validators))
}

pub async fn sync_header(ctx: &RelayContext, height: u64) -> Result<HeaderSync> {
    let signed = ctx.source.fetch_commit(height).await?;
    if !signed.header.validators_changed() {
        tracing::trace!(height, "validator set unchanged");
        return Ok(HeaderSync::Unchanged);
    }
    let validators = ctx.source.fetch_validators(height).await?;
    let bundle = HeaderBundle::new(signed, validators).encode()?;

    let tx_hash = match ctx
        .hub
        .submit_header_sync(ctx.config.side_chain_id, &bundle)
        .await
    {
        Ok(tx_hash) => tx_hash,
        Err(e) if e.is_header_superseded() => {
            tracing::debug!(height, "header already superseded on hub");
            return Ok(HeaderSync::Superseded);
        }
        Err(e) => return Err(e),
    };
    tracing::info!(height, %tx_hash, "header sync submitted");

    let timing = &ctx.config.timing;
    wait_hub_confirm(
        ctx.hub.as_ref(),
        &tx_hash,
        timing.confirm_poll_interval(),
        timing.confirm_timeout(),
    )
    .await?;
    tracing::info!(height, %tx_hash, "header sync confirmed");
    Ok(HeaderSync::Submitted { tx_hash })
}

/// Poll until the hub has `tx_hash` in a block, or fail with [RelayError::Timeout].
pub async fn wait_hub_confirm(
    hub: &dyn HubChain,
    tx_hash: &str,
    poll: Duration,
    timeout: Duration,
) -> Result<()> {
    let started = Instant::now();
    loop {
        match hub.get_transaction(tx_hash).await {
            Ok(true) => return Ok(()),
            Ok(false) => {}
            Err(e) => tracing::debug!(reason = %e, %tx_hash, "get transaction failed"),
        }
        let waited = started.elapsed();
        if waited >= timeout {
            return Err(RelayError::Timeout {
                tx_hash: tx_hash.to_string(),
                waited,
            });
        }
        sleep(poll.min(timeout - waited)).await;
    }
}
