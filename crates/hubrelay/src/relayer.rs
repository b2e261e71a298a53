//! Relayer: the shared [RelayContext] and the three loops built on it.
//!
//! The tracker loop (header sync + deposit scan), the relay loop, and the confirmation
//! loop run as independent tasks. They interact only through the store and the height
//! cursor, and stop between iterations when the shutdown signal fires.

use crate::checker::check_awaiting;
use crate::config::RelayConfig;
use crate::cursor::{pause, select_start_height, HeightCursor};
use crate::error::Result;
use crate::finality::{ConfirmationDepth, Strategy};
use crate::hub::HubChain;
use crate::relay::relay_pending;
use crate::source::SourceChain;
use crate::store::RelayStore;
use crate::tracker::{self, TrackerCycle};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Everything a loop needs. Cheap to share behind an [Arc].
pub struct RelayContext {
    pub config: RelayConfig,
    pub source: Arc<dyn SourceChain>,
    pub hub: Arc<dyn HubChain>,
    pub store: Arc<dyn RelayStore>,
    pub cursor: HeightCursor,
    pub strategy: Box<dyn Strategy>,
    /// Parsed `eccd_contract_address`.
    pub eccd_address: [u8; 20],
}

impl RelayContext {
    pub fn new(
        config: RelayConfig,
        source: Arc<dyn SourceChain>,
        hub: Arc<dyn HubChain>,
        store: Arc<dyn RelayStore>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            eccd_address: config.eccd_address()?,
            strategy: Box::new(ConfirmationDepth(config.finality_lag)),
            cursor: HeightCursor::default(),
            config,
            source,
            hub,
            store,
        })
    }

    /// Replace the eligibility strategy (default: [ConfirmationDepth] of `finality_lag`).
    pub fn with_strategy(mut self, s: impl Strategy + 'static) -> Self {
        self.strategy = Box::new(s);
        self
    }
}

/// Doubling retry delay with jitter, capped at `max`.
#[derive(Debug, Clone)]
pub(crate) struct Backoff {
    base: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub(crate) fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            current: base,
        }
    }

    pub(crate) fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = std::cmp::min(self.current * 2, self.max.max(self.base));
        let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..500));
        delay + jitter
    }

    pub(crate) fn reset(&mut self) {
        self.current = self.base;
    }
}

/// Owns the context and spawns the loops.
pub struct Relayer {
    ctx: Arc<RelayContext>,
}

/// Running loops. Dropping the handle does not stop them; call [RelayerHandle::shutdown].
pub struct RelayerHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl Relayer {
    pub fn new(ctx: RelayContext) -> Self {
        Self { ctx: Arc::new(ctx) }
    }

    pub fn context(&self) -> &Arc<RelayContext> {
        &self.ctx
    }

    /// Spawn the three loops on the current runtime.
    pub fn start(&self) -> RelayerHandle {
        let (shutdown, rx) = watch::channel(false);
        let tasks = vec![
            tokio::spawn(tracker_loop(Arc::clone(&self.ctx), rx.clone())),
            tokio::spawn(relay_loop(Arc::clone(&self.ctx), rx.clone())),
            tokio::spawn(checker_loop(Arc::clone(&self.ctx), rx)),
        ];
        tracing::info!(side_chain_id = self.ctx.config.side_chain_id, "relayer started");
        RelayerHandle { shutdown, tasks }
    }

    /// Run until Ctrl-C, then stop the loops and wait for them.
    pub async fn run_until_signal(&self) -> anyhow::Result<()> {
        let handle = self.start();
        tokio::signal::ctrl_c().await?;
        tracing::info!("interrupt received, stopping relayer");
        handle.shutdown().await;
        Ok(())
    }
}

impl RelayerHandle {
    /// Signal every loop to stop after its current iteration and wait for them.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::error!(reason = %e, "relayer task panicked");
            }
        }
    }
}

async fn tracker_loop(ctx: Arc<RelayContext>, mut shutdown: watch::Receiver<bool>) {
    let timing = &ctx.config.timing;
    let Some(start) = select_start_height(
        ctx.config.start_height,
        ctx.store.as_ref(),
        ctx.hub.as_ref(),
        ctx.config.side_chain_id,
        timing.retry_backoff(),
        &mut shutdown,
    )
    .await
    else {
        return;
    };
    ctx.cursor.advance_to(start);

    let mut backoff = Backoff::new(timing.retry_backoff(), timing.max_backoff());
    loop {
        let wait = match tracker::run_once(&ctx).await {
            Ok(TrackerCycle::Stalled { .. })
            | Ok(TrackerCycle::Advanced {
                stalled_at: Some(_),
                ..
            }) => backoff.next_delay(),
            Ok(_) => {
                backoff.reset();
                timing.poll_interval()
            }
            Err(e) => {
                tracing::warn!(reason = %e, cursor = ctx.cursor.get(), "tracker cycle failed");
                backoff.next_delay()
            }
        };
        if pause(wait, &mut shutdown).await {
            break;
        }
    }
    tracing::info!(cursor = ctx.cursor.get(), "tracker loop stopped");
}

async fn relay_loop(ctx: Arc<RelayContext>, mut shutdown: watch::Receiver<bool>) {
    let timing = &ctx.config.timing;
    let mut backoff = Backoff::new(timing.retry_backoff(), timing.max_backoff());
    loop {
        let wait = match relay_pending(&ctx).await {
            Ok(report) => {
                if report.submitted + report.already_done + report.failed + report.quarantined > 0 {
                    tracing::debug!(?report, "relay pass");
                }
                backoff.reset();
                timing.poll_interval()
            }
            Err(e) => {
                tracing::warn!(reason = %e, "list pending failed");
                backoff.next_delay()
            }
        };
        if pause(wait, &mut shutdown).await {
            break;
        }
    }
    tracing::info!("relay loop stopped");
}

async fn checker_loop(ctx: Arc<RelayContext>, mut shutdown: watch::Receiver<bool>) {
    let timing = &ctx.config.timing;
    let mut backoff = Backoff::new(timing.retry_backoff(), timing.max_backoff());
    loop {
        let wait = match check_awaiting(&ctx).await {
            Ok(report) => {
                if report.confirmed + report.requeued > 0 {
                    tracing::debug!(?report, "confirmation pass");
                }
                backoff.reset();
                timing.confirm_poll_interval()
            }
            Err(e) => {
                tracing::warn!(reason = %e, "list awaiting failed");
                backoff.next_delay()
            }
        };
        if pause(wait, &mut shutdown).await {
            break;
        }
    }
    tracing::info!("checker loop stopped");
}
