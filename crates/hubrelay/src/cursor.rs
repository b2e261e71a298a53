//! Processed-height cursor shared between loops, and the startup height policy.
//!
//! Written only by the tracker loop (release), read by the relay loop (acquire).

use crate::hub::HubChain;
use crate::store::RelayStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;

/// Highest height whose header sync and deposit scan both succeeded. Never decreases.
#[derive(Debug, Default)]
pub struct HeightCursor {
    height: AtomicU64,
}

impl HeightCursor {
    pub fn new(height: u64) -> Self {
        Self {
            height: AtomicU64::new(height),
        }
    }

    pub fn get(&self) -> u64 {
        self.height.load(Ordering::Acquire)
    }

    /// Move the cursor forward to `height`; lower values are ignored. Returns the new value.
    pub fn advance_to(&self, height: u64) -> u64 {
        self.height.fetch_max(height, Ordering::AcqRel).max(height)
    }
}

/// Height the tracker resumes from.
///
/// A non-zero `override_height` wins. Otherwise the greater of the persisted cursor and
/// the hub's last epoch-switch height for this side chain, so header sync never starts
/// in the middle of an epoch with a stale validator set. Hub errors are retried with
/// `backoff` until the query succeeds or `shutdown` fires (returns `None`).
pub async fn select_start_height(
    override_height: u64,
    store: &dyn RelayStore,
    hub: &dyn HubChain,
    side_chain_id: u64,
    backoff: Duration,
    shutdown: &mut watch::Receiver<bool>,
) -> Option<u64> {
    if override_height > 0 {
        tracing::info!(height = override_height, "start height overridden");
        return Some(override_height);
    }
    let persisted = loop {
        match store.height() {
            Ok(h) => break h,
            Err(e) => tracing::warn!(reason = %e, "read persisted height failed, retrying"),
        }
        if pause(backoff, shutdown).await {
            return None;
        }
    };
    let epoch = loop {
        match hub.query_epoch_switch_height(side_chain_id).await {
            Ok(h) => break h,
            Err(e) => tracing::warn!(reason = %e, side_chain_id, "query epoch switch height failed, retrying"),
        }
        if pause(backoff, shutdown).await {
            return None;
        }
    };
    let start = persisted.max(epoch);
    tracing::info!(persisted, epoch, start, "start height selected");
    Some(start)
}

/// Sleep for `d` unless shutdown is signalled first. Returns true on shutdown.
pub(crate) async fn pause(d: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    if *shutdown.borrow() {
        return true;
    }
    tokio::select! {
        _ = sleep(d) => false,
        res = shutdown.changed() => res.is_err() || *shutdown.borrow(),
    }
}
