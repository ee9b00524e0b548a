//! Single-flight run scheduling.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info, warn};

use super::runner::PipelineRunner;
use super::types::{PipelineError, RunSummary};

/// Scheduler state exposed to the status API.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    /// Whether the interval loop is active.
    pub scheduled: bool,
    /// Whether a run is in flight right now.
    pub running: bool,
    pub interval_secs: Option<u64>,
    pub last_summary: Option<RunSummary>,
    pub last_error: Option<LastError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LastError {
    pub at: DateTime<Utc>,
    pub message: String,
}

/// Clears the in-flight flag when the run ends, however it ends.
struct RunGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Runs the pipeline on demand or on an interval, never two runs at once.
pub struct PipelineScheduler {
    runner: Arc<PipelineRunner>,
    interval: Option<Duration>,
    in_flight: Arc<AtomicBool>,
    scheduled: Arc<AtomicBool>,
    last_summary: Arc<RwLock<Option<RunSummary>>>,
    last_error: Arc<RwLock<Option<LastError>>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl PipelineScheduler {
    pub fn new(runner: Arc<PipelineRunner>) -> Self {
        let interval = runner
            .config()
            .runner
            .interval_secs
            .map(Duration::from_secs);
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            runner,
            interval,
            in_flight: Arc::new(AtomicBool::new(false)),
            scheduled: Arc::new(AtomicBool::new(false)),
            last_summary: Arc::new(RwLock::new(None)),
            last_error: Arc::new(RwLock::new(None)),
            shutdown_tx,
        }
    }

    /// Override the configured interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    fn try_begin(&self) -> Option<RunGuard> {
        self.in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| RunGuard {
                flag: Arc::clone(&self.in_flight),
            })
    }

    /// Run now and wait for the result.
    pub async fn run_now(&self) -> Result<RunSummary, PipelineError> {
        let guard = self.try_begin().ok_or(PipelineError::AlreadyRunning)?;
        let result = Self::execute(
            &self.runner,
            &self.last_summary,
            &self.last_error,
        )
        .await;
        drop(guard);
        result
    }

    /// Start a run in the background.
    ///
    /// Fails immediately with [`PipelineError::AlreadyRunning`] if a run is
    /// in flight.
    pub fn trigger(&self) -> Result<(), PipelineError> {
        let guard = self.try_begin().ok_or(PipelineError::AlreadyRunning)?;
        let runner = Arc::clone(&self.runner);
        let last_summary = Arc::clone(&self.last_summary);
        let last_error = Arc::clone(&self.last_error);
        tokio::spawn(async move {
            let _guard = guard;
            let _ = Self::execute(&runner, &last_summary, &last_error).await;
        });
        Ok(())
    }

    async fn execute(
        runner: &PipelineRunner,
        last_summary: &RwLock<Option<RunSummary>>,
        last_error: &RwLock<Option<LastError>>,
    ) -> Result<RunSummary, PipelineError> {
        let result = runner.run().await;
        match &result {
            Ok(summary) => {
                *last_summary.write().await = Some(summary.clone());
                *last_error.write().await = None;
            }
            Err(e) => {
                *last_error.write().await = Some(LastError {
                    at: Utc::now(),
                    message: e.to_string(),
                });
            }
        }
        result
    }

    /// Spawn the interval loop. The first run starts immediately.
    pub fn start(&self) {
        let Some(interval) = self.interval else {
            warn!("No interval configured, scheduler not started");
            return;
        };
        if self.scheduled.swap(true, Ordering::SeqCst) {
            warn!("Scheduler already running");
            return;
        }

        let runner = Arc::clone(&self.runner);
        let in_flight = Arc::clone(&self.in_flight);
        let scheduled = Arc::clone(&self.scheduled);
        let last_summary = Arc::clone(&self.last_summary);
        let last_error = Arc::clone(&self.last_error);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        info!(interval_secs = interval.as_secs(), "Starting pipeline scheduler");
        tokio::spawn(async move {
            let mut next = Duration::ZERO;
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Scheduler received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(next) => {
                        next = interval;
                        let guard = match in_flight.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst) {
                            Ok(_) => RunGuard { flag: Arc::clone(&in_flight) },
                            Err(_) => {
                                debug!("Run already in flight, skipping scheduled run");
                                continue;
                            }
                        };
                        if let Err(e) = Self::execute(&runner, &last_summary, &last_error).await {
                            error!(error = %e, "Scheduled run failed");
                        }
                        drop(guard);
                    }
                }
            }
            scheduled.store(false, Ordering::SeqCst);
            info!("Pipeline scheduler stopped");
        });
    }

    /// Stop the interval loop. A run in flight finishes on its own.
    pub async fn stop(&self) {
        if !self.scheduled.load(Ordering::SeqCst) {
            return;
        }
        info!("Stopping pipeline scheduler");
        let _ = self.shutdown_tx.send(());
    }

    pub async fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            scheduled: self.scheduled.load(Ordering::SeqCst),
            running: self.is_running(),
            interval_secs: self.interval.map(|d| d.as_secs()),
            last_summary: self.last_summary.read().await.clone(),
            last_error: self.last_error.read().await.clone(),
        }
    }

    pub async fn last_summary(&self) -> Option<RunSummary> {
        self.last_summary.read().await.clone()
    }
}
