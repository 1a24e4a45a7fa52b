//! Periodic scheduling of synchronization passes.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use mirrorsync_common::{Error, Result};

use crate::summary::PassSummary;

/// What the scheduler does when a pass fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// End the schedule and return the failure.
    #[default]
    Stop,
    /// Log the failure and wait for the next tick.
    Continue,
}

/// Scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Time between the starts of consecutive passes.
    pub interval: Duration,
    pub failure_policy: FailurePolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            failure_policy: FailurePolicy::Stop,
        }
    }
}

impl SchedulerConfig {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    /// Check that the configuration can drive a schedule.
    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(Error::InvalidInput(
                "Synchronization interval must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Runs a pass immediately, then once per interval, until shut down.
///
/// Passes never overlap. A tick that comes due while a pass is still running
/// starts the next pass as soon as it finishes, and later ticks are measured
/// from there.
pub struct SyncScheduler {
    config: SchedulerConfig,
    shutdown_rx: watch::Receiver<bool>,
    completed: Arc<AtomicUsize>,
    failed: Arc<AtomicUsize>,
}

/// Controls a running [`SyncScheduler`] from another task.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    shutdown_tx: Arc<watch::Sender<bool>>,
    completed: Arc<AtomicUsize>,
    failed: Arc<AtomicUsize>,
}

impl SyncScheduler {
    /// Create a scheduler and the handle used to stop it.
    pub fn new(config: SchedulerConfig) -> (Self, SchedulerHandle) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let completed = Arc::new(AtomicUsize::new(0));
        let failed = Arc::new(AtomicUsize::new(0));

        let scheduler = Self {
            config,
            shutdown_rx,
            completed: completed.clone(),
            failed: failed.clone(),
        };

        let handle = SchedulerHandle {
            shutdown_tx: Arc::new(shutdown_tx),
            completed,
            failed,
        };

        (scheduler, handle)
    }

    /// Get the configuration.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Drive `sync_fn` until shutdown is requested.
    ///
    /// Shutdown interrupts both the wait for the next tick and a pass in
    /// progress; an interrupted pass is dropped and not counted.
    ///
    /// # Errors
    /// - `InvalidInput` if the interval is zero
    /// - The failing pass's error under [`FailurePolicy::Stop`]
    pub async fn run<F, Fut>(mut self, sync_fn: F) -> Result<()>
    where
        F: Fn() -> Fut + Send,
        Fut: Future<Output = Result<PassSummary>> + Send,
    {
        self.config.validate()?;

        let period = self.config.interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Sync scheduler started (interval {:?})", period);

        loop {
            if *self.shutdown_rx.borrow() {
                break;
            }

            let outcome = tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut self.shutdown_rx) => {
                    info!("Shutdown requested during a pass");
                    break;
                }
                outcome = sync_fn() => outcome,
            };

            match outcome {
                Ok(summary) => {
                    let n = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
                    debug!("Pass {} completed: {}", n, summary);
                }
                Err(e) => {
                    self.failed.fetch_add(1, Ordering::SeqCst);
                    error!("Synchronization pass failed: {}", e);
                    if self.config.failure_policy == FailurePolicy::Stop {
                        return Err(e);
                    }
                }
            }

            tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut self.shutdown_rx) => break,
                _ = ticker.tick() => {}
            }
        }

        info!(
            "Sync scheduler stopped after {} passes",
            self.completed.load(Ordering::SeqCst)
        );
        Ok(())
    }
}

impl SchedulerHandle {
    /// Request shutdown. Idempotent.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Passes that finished successfully.
    pub fn passes_completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Passes that returned an error.
    pub fn passes_failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }
}

/// Resolves once shutdown is requested; never if every handle is gone.
async fn wait_for_shutdown(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|requested| *requested).await.is_err() {
        std::future::pending::<()>().await;
    }
}
