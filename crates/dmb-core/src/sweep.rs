//! Periodic sweep driver.
//!
//! Runs one pass at startup and then on a fixed cadence (default hourly).
//! A single-flight guard skips a tick while the previous pass is still
//! running, so overlapping sweeps cannot interleave on the same records.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{config::Config, lifecycle::Lifecycle, Result};

#[derive(Clone)]
pub struct Sweeper {
    inner: Arc<SweeperInner>,
}

struct SweeperInner {
    cfg: Arc<Config>,
    engine: Arc<Lifecycle>,
    in_flight: AtomicBool,
}

pub struct SweeperHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

impl Sweeper {
    pub fn new(cfg: Arc<Config>, engine: Arc<Lifecycle>) -> Self {
        Self {
            inner: Arc::new(SweeperInner {
                cfg,
                engine,
                in_flight: AtomicBool::new(false),
            }),
        }
    }

    /// One guarded pass. Returns `Ok(None)` when a previous pass is still
    /// running and this tick was skipped.
    pub async fn run_once(&self) -> Result<Option<crate::lifecycle::SweepReport>> {
        if self
            .inner
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!("sweep still running, skipping tick");
            return Ok(None);
        }

        let result = self.inner.engine.sweep_evaluate(Utc::now()).await;
        self.inner.in_flight.store(false, Ordering::SeqCst);

        let report = result?;
        tracing::info!(
            scanned = report.scanned,
            archived = report.archived,
            deleted = report.deleted,
            orphans = report.orphans_removed,
            "sweep pass complete"
        );
        Ok(Some(report))
    }

    /// Spawn the periodic loop: one pass immediately, then every
    /// `sweep_interval`. A failed pass is logged and retried next tick.
    pub fn start(&self) -> SweeperHandle {
        let cancel = CancellationToken::new();
        let sweeper = self.clone();
        let tok = cancel.clone();

        let task = tokio::spawn(async move {
            let mut tick = tokio::time::interval(sweeper.inner.cfg.sweep_interval);
            loop {
                tokio::select! {
                  _ = tok.cancelled() => break,
                  _ = tick.tick() => {
                    if let Err(e) = sweeper.run_once().await {
                      tracing::warn!("sweep cycle failed: {e}");
                    }
                  }
                }
            }
        });

        SweeperHandle { cancel, task }
    }
}
