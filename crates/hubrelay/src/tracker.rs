//! Chain Height Tracker: drive header sync and deposit scanning height by height,
//! never skipping a height that failed.

use crate::error::Result;
use crate::header_sync::sync_header;
use crate::relayer::RelayContext;
use crate::scanner::scan_height;

/// Outcome of one tracker cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerCycle {
    /// Tip is within the finality lag of the cursor.
    Idle,
    /// Cursor advanced to `to`. `stalled_at` is the height that failed, if any.
    Advanced { to: u64, stalled_at: Option<u64> },
    /// The first height of the range failed; cursor unchanged.
    Stalled { at: u64 },
}

/// Header sync then deposit scan for one height. Both must succeed.
pub async fn process_height(ctx: &RelayContext, height: u64) -> Result<()> {
    sync_header(ctx, height).await?;
    let report = scan_height(ctx, height).await?;
    tracing::debug!(height, enqueued = report.enqueued, already_done = report.already_done, "height processed");
    Ok(())
}

/// Process `cursor+1 ..= tip-lag` in order, stopping at the first failure, then persist
/// the cursor once.
pub async fn run_once(ctx: &RelayContext) -> Result<TrackerCycle> {
    let tip = ctx.source.tip_height().await?;
    let start = ctx.cursor.get();
    let range = ctx.strategy.safe_range(start, tip);
    if range.is_empty() {
        tracing::trace!(tip, cursor = start, "no safe height");
        return Ok(TrackerCycle::Idle);
    }

    let mut stalled_at = None;
    for height in range {
        match process_height(ctx, height).await {
            Ok(()) => {
                ctx.cursor.advance_to(height);
            }
            Err(e) => {
                tracing::warn!(reason = %e, height, "height failed, retrying next cycle");
                stalled_at = Some(height);
                break;
            }
        }
    }

    let to = ctx.cursor.get();
    if to == start {
        return Ok(TrackerCycle::Stalled {
            at: stalled_at.unwrap_or(start + 1),
        });
    }
    ctx.store.set_height(to)?;
    tracing::info!(from = start + 1, to, tip, "heights processed");
    Ok(TrackerCycle::Advanced { to, stalled_at })
}
