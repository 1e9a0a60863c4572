//! SessionJanitor - background sweep for abandoned sessions.
//!
//! Runs `ExpireSessionsHandler` on a fixed interval until the shutdown
//! channel flips to `true`, then performs one final sweep and returns.
//!
//! | Setting | Default | Description |
//! |---------|---------|-------------|
//! | `interval` | 60s | Time between sweeps |

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;

use super::handlers::{ExpireSessionsHandler, ExpireSessionsResult, IntakeError};
use crate::domain::foundation::Timestamp;

pub struct SessionJanitor {
    expirer: Arc<ExpireSessionsHandler>,
    interval: Duration,
}

impl SessionJanitor {
    pub fn new(expirer: Arc<ExpireSessionsHandler>) -> Self {
        Self {
            expirer,
            interval: Duration::from_secs(60),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sweep until shutdown is signalled.
    ///
    /// A failed sweep is logged and retried on the next tick.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(self.interval);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        self.sweep_logged().await;
                        tracing::info!("Session janitor stopped");
                        return;
                    }
                }

                _ = interval.tick() => {
                    self.sweep_logged().await;
                }
            }
        }
    }

    /// Run exactly one sweep.
    pub async fn sweep_once(&self) -> Result<ExpireSessionsResult, IntakeError> {
        self.expirer.handle(Timestamp::now()).await
    }

    async fn sweep_logged(&self) {
        match self.sweep_once().await {
            Ok(result) if !result.expired.is_empty() => {
                tracing::info!(expired = result.expired.len(), skipped = result.skipped, "Janitor sweep");
            }
            Ok(_) => {}
            Err(e) => tracing::error!(error = %e, "Janitor sweep failed"),
        }
    }
}
