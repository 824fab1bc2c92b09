//! Scheduler and singleton gate. `WorkerGate` is a single compare-and-set
//! flag guarding entry to the worker via an `AtomicBool` and a
//! `swap(true, Ordering::SeqCst)` single-flight check. The flag is released
//! on every exit path — including a panicking worker — via a `Drop`-based
//! RAII guard, since Rust has no `finally`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::fanout::NotificationFanout;
use crate::subscribers::WorkerStatus;
use crate::worker::{WorkerOrchestrator, WorkerRunSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Started,
    AlreadyRunning,
}

#[derive(Clone, Default)]
pub struct WorkerGate {
    running: Arc<AtomicBool>,
}

impl WorkerGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Compare-and-swap entry point. On success, spawns the worker run
    /// wrapped in a guard that flips the flag back and broadcasts
    /// `worker_status=completed` on every exit path.
    pub fn trigger(
        &self,
        worker: Arc<WorkerOrchestrator>,
        fanout: Arc<NotificationFanout>,
    ) -> TriggerOutcome {
        if self.running.swap(true, Ordering::SeqCst) {
            return TriggerOutcome::AlreadyRunning;
        }

        let flag = self.running.clone();
        tokio::spawn(async move {
            let _guard = RunningGuard { flag: &flag, fanout: &fanout };
            fanout.broadcast_worker_status(WorkerStatus::Started, None).await;

            let summary: WorkerRunSummary = worker.run().await;
            info!(
                matches_found = summary.matches_found,
                items_processed = summary.items_processed,
                sites_failed = summary.sites_failed,
                "worker run finished"
            );
        });

        TriggerOutcome::Started
    }
}

/// Flips the gate back to `false` and broadcasts `worker_status=completed`
/// in its `Drop` impl, so the flag is released and the event fires even if
/// `worker.run()` panics during the `await` above.
struct RunningGuard<'a> {
    flag: &'a AtomicBool,
    fanout: &'a Arc<NotificationFanout>,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
        let fanout = self.fanout.clone();
        tokio::spawn(async move {
            fanout
                .broadcast_worker_status(WorkerStatus::Completed, None)
                .await;
        });
    }
}

/// Owns the periodic tick loop plus the manual-trigger/startup-trigger
/// entry points, via `tokio::select!` against a shutdown channel.
pub struct Scheduler {
    gate: WorkerGate,
    shutdown_tx: tokio::sync::watch::Sender<bool>,
}

impl Scheduler {
    pub fn new(gate: WorkerGate) -> Self {
        let (shutdown_tx, _) = tokio::sync::watch::channel(false);
        Self { gate, shutdown_tx }
    }

    pub fn gate(&self) -> WorkerGate {
        self.gate.clone()
    }

    /// Spawns the tick loop. `run_on_start` fires one trigger immediately,
    /// matching `RUN_WORKER_ON_START=true`.
    pub fn start(
        &self,
        check_interval_hours: u64,
        run_on_start: bool,
        worker: Arc<WorkerOrchestrator>,
        fanout: Arc<NotificationFanout>,
    ) {
        if run_on_start {
            match self.gate.trigger(worker.clone(), fanout.clone()) {
                TriggerOutcome::Started => info!("worker run triggered at startup"),
                TriggerOutcome::AlreadyRunning => {
                    warn!("worker already running at startup trigger")
                }
            }
        }

        let gate = self.gate.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let period = Duration::from_secs(check_interval_hours.max(1) * 3600);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await; // first tick fires immediately; discard it

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        info!("scheduler tick loop received shutdown signal");
                        break;
                    }
                    _ = interval.tick() => {
                        match gate.trigger(worker.clone(), fanout.clone()) {
                            TriggerOutcome::Started => info!("worker run triggered on schedule"),
                            TriggerOutcome::AlreadyRunning => {
                                warn!("scheduled tick skipped: worker already running")
                            }
                        }
                    }
                }
            }
        });
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Manual trigger entry point for the API layer (`POST /api/trigger-worker`).
    pub fn trigger_now(
        &self,
        worker: Arc<WorkerOrchestrator>,
        fanout: Arc<NotificationFanout>,
    ) -> TriggerOutcome {
        self.gate.trigger(worker, fanout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_rejects_concurrent_trigger_before_first_completes() {
        let gate = WorkerGate::new();
        assert!(!gate.running.swap(true, Ordering::SeqCst));
        assert!(gate.is_running());
        // A second raw swap (simulating a concurrent trigger observing the
        // flag already set) returns true, i.e. "already running".
        assert!(gate.running.swap(true, Ordering::SeqCst));
    }

    #[test]
    fn fresh_gate_is_not_running() {
        let gate = WorkerGate::new();
        assert!(!gate.is_running());
    }
}
