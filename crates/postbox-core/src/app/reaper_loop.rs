//! ReaperLoop - return stale `InFlight` rows to `Queued`.
//!
//! Off unless `reaper.visibility_timeout_secs` is set. Without it a row whose
//! send failed (or whose process died mid-send) stays `InFlight` forever.
//!
//! # Flow
//! 1. cutoff = now - visibility_timeout
//! 2. `MessageStore::requeue_stale(cutoff)` resets every `InFlight` row
//!    claimed before the cutoff
//! 3. the next poll cycle scans them again
//!
//! A requeued row may be sent twice if the first send actually went out.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::domain::MessageId;
use crate::ports::{Clock, MessageStore};

pub struct ReaperLoop {
    store: Arc<dyn MessageStore>,
    clock: Arc<dyn Clock>,
    visibility_timeout: chrono::Duration,
    interval: Duration,
}

impl ReaperLoop {
    pub fn new(
        store: Arc<dyn MessageStore>,
        clock: Arc<dyn Clock>,
        visibility_timeout: Duration,
        interval: Duration,
    ) -> Self {
        let visibility_timeout =
            chrono::Duration::from_std(visibility_timeout).unwrap_or(chrono::TimeDelta::MAX);
        Self {
            store,
            clock,
            visibility_timeout,
            interval,
        }
    }

    /// One requeue pass. Returns the ids put back in the queue.
    pub async fn sweep(&self) -> Vec<MessageId> {
        let Some(cutoff) = self
            .clock
            .now()
            .checked_sub_signed(self.visibility_timeout)
        else {
            return Vec::new();
        };

        match self.store.requeue_stale(cutoff).await {
            Ok(ids) => {
                if !ids.is_empty() {
                    tracing::warn!(
                        count = ids.len(),
                        ids = ?ids,
                        %cutoff,
                        "requeued stale in-flight messages"
                    );
                }
                ids
            }
            Err(err) => {
                tracing::warn!(error = %err, "requeue sweep failed");
                Vec::new()
            }
        }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            visibility_timeout_secs = self.visibility_timeout.num_seconds(),
            interval_secs = self.interval.as_secs(),
            "reaper started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            self.sweep().await;

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        tracing::info!("reaper stopped");
    }
}
