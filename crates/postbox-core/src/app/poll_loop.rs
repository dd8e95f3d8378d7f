//! PollDriver - the scan -> claim -> dispatch loop.
//!
//! # Flow (one cycle)
//! 1. `BatchScanner::scan()` reads up to `batch_limit` queued rows
//! 2. for each candidate, in scan order: take a worker permit, then
//!    `ClaimStep::claim()` (Queued -> InFlight)
//! 3. a claimed row is handed to a `DeliveryWorker` on the `JoinSet`
//! 4. after the batch is exhausted, wait `idle_delay` (cancellable)
//!
//! The driver never waits for deliveries to finish before moving on. The
//! semaphore is the only back-pressure: with every permit taken, claiming
//! stalls until a worker finishes. Under `run()` that stall also ends on
//! shutdown; rows not yet claimed stay `Queued`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, watch};
use tokio::task::{JoinError, JoinSet};
use tracing::Instrument;

use super::claim::{ClaimOutcome, ClaimStep};
use super::delivery::{DeliveryReport, DeliveryWorker};
use super::scanner::BatchScanner;
use crate::config::PollConfig;
use crate::domain::CycleId;
use crate::ports::IdGenerator;

/// Counters for one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle_id: CycleId,
    pub scanned: usize,
    pub claimed: usize,
    pub skipped: usize,
    pub failed_claims: usize,
}

impl CycleReport {
    fn new(cycle_id: CycleId, scanned: usize) -> Self {
        Self {
            cycle_id,
            scanned,
            claimed: 0,
            skipped: 0,
            failed_claims: 0,
        }
    }

    pub fn found_work(&self) -> bool {
        self.scanned > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSettings {
    pub idle_delay: Duration,
    pub max_concurrent_deliveries: usize,
    pub shutdown_grace: Duration,
}

impl From<&PollConfig> for PollSettings {
    fn from(config: &PollConfig) -> Self {
        Self {
            idle_delay: config.idle_delay(),
            max_concurrent_deliveries: config.max_concurrent_deliveries,
            shutdown_grace: config.shutdown_grace(),
        }
    }
}

pub struct PollDriver {
    scanner: BatchScanner,
    claim: ClaimStep,
    worker: DeliveryWorker,
    ids: Arc<dyn IdGenerator>,
    settings: PollSettings,
    permits: Arc<Semaphore>,
    workers: JoinSet<DeliveryReport>,
}

impl PollDriver {
    pub fn new(
        scanner: BatchScanner,
        claim: ClaimStep,
        worker: DeliveryWorker,
        ids: Arc<dyn IdGenerator>,
        settings: PollSettings,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(settings.max_concurrent_deliveries.max(1)));
        Self {
            scanner,
            claim,
            worker,
            ids,
            settings,
            permits,
            workers: JoinSet::new(),
        }
    }

    /// Delivery workers spawned and not yet joined.
    pub fn in_flight(&self) -> usize {
        self.workers.len()
    }

    /// Run exactly one scan/claim/dispatch pass.
    pub async fn run_cycle(&mut self) -> CycleReport {
        self.traced_cycle(None).await
    }

    async fn traced_cycle(&mut self, shutdown: Option<&mut watch::Receiver<bool>>) -> CycleReport {
        let cycle_id = self.ids.generate_cycle_id();
        let span = tracing::debug_span!("cycle", cycle_id = %cycle_id);
        self.cycle(cycle_id, shutdown).instrument(span).await
    }

    async fn cycle(
        &mut self,
        cycle_id: CycleId,
        mut shutdown: Option<&mut watch::Receiver<bool>>,
    ) -> CycleReport {
        self.reap_finished();

        let batch = self.scanner.scan().await;
        let mut report = CycleReport::new(cycle_id, batch.len());

        for (position, message) in batch.enumerate() {
            // Permit first: a row is never claimed without a free worker slot.
            let acquire = Arc::clone(&self.permits).acquire_owned();
            let permit = match shutdown.as_deref_mut() {
                Some(rx) => tokio::select! {
                    biased;
                    _ = stop_requested(rx) => {
                        tracing::info!(
                            left_queued = report.scanned - position,
                            "shutdown requested, leaving rest of batch queued"
                        );
                        break;
                    }
                    permit = acquire => permit,
                },
                None => acquire.await,
            };
            let Ok(permit) = permit else {
                break;
            };

            match self.claim.claim(message.id).await {
                ClaimOutcome::Claimed => {
                    report.claimed += 1;
                    let worker = self.worker.clone();
                    let span = tracing::info_span!("delivery", message_id = %message.id);
                    self.workers.spawn(
                        async move {
                            let _permit = permit;
                            worker.deliver(message).await
                        }
                        .instrument(span),
                    );
                }
                ClaimOutcome::AlreadyClaimed => report.skipped += 1,
                ClaimOutcome::Failed => report.failed_claims += 1,
            }
        }

        if report.found_work() {
            tracing::info!(
                scanned = report.scanned,
                claimed = report.claimed,
                skipped = report.skipped,
                failed_claims = report.failed_claims,
                in_flight = self.workers.len(),
                "cycle finished"
            );
        } else {
            tracing::debug!("no queued messages");
        }
        report
    }

    fn reap_finished(&mut self) {
        while let Some(joined) = self.workers.try_join_next() {
            if let Err(err) = joined {
                log_join_error(&err);
            }
        }
    }

    /// Wait for every spawned worker and collect their reports.
    pub async fn drain(&mut self) -> Vec<DeliveryReport> {
        let mut reports = Vec::with_capacity(self.workers.len());
        while let Some(joined) = self.workers.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(err) => log_join_error(&err),
            }
        }
        reports
    }

    /// Loop until `shutdown` flips to `true` (or its sender is dropped).
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            idle_delay_ms = self.settings.idle_delay.as_millis() as u64,
            batch_limit = self.scanner.batch_limit(),
            max_concurrent_deliveries = self.settings.max_concurrent_deliveries,
            "poll loop started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            self.traced_cycle(Some(&mut shutdown)).await;
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = tokio::time::sleep(self.settings.idle_delay) => {}
            }
        }

        self.shutdown().await;
    }

    /// Stop dispatching and drain workers for up to `shutdown_grace`.
    ///
    /// Workers still running after the grace period are aborted; their rows
    /// stay `InFlight`.
    pub async fn shutdown(mut self) {
        tracing::info!(pending = self.workers.len(), "poll loop stopping, draining workers");

        let grace = self.settings.shutdown_grace;
        if tokio::time::timeout(grace, self.drain()).await.is_err() {
            tracing::warn!(
                abandoned = self.workers.len(),
                "shutdown grace elapsed, aborting delivery workers"
            );
            self.workers.abort_all();
            while self.workers.join_next().await.is_some() {}
        }

        tracing::info!("poll loop stopped");
    }
}

/// Resolves once the flag is `true` or the sender is gone.
async fn stop_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

fn log_join_error(err: &JoinError) {
    if err.is_panic() {
        tracing::error!(error = %err, "delivery worker panicked");
    }
}
