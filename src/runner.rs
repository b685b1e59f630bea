//! One invocation of a monitor: submit, poll, decide, dispatch, advance

use crate::alerts::{Alert, AlertKind, Notifier};
use crate::error::{QueryError, RunError};
use crate::executor::{JobHandle, JobStatus, QueryExecutor};
use crate::monitor::QueryMonitor;
use crate::query::ResultSet;
use crate::store::StateStore;
use chrono::Utc;
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Default pause between status polls
pub const DEFAULT_PING_FREQUENCY: Duration = Duration::from_secs(20);
/// Default bound on status polls per run
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 90;

/// Result of a successful run
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub alert: Alert,
    /// Whether a notification actually reached the channel
    pub delivered: bool,
}

/// Drives a monitor through one execution against the query service
pub struct QueryRunner {
    executor: Arc<dyn QueryExecutor>,
    notifier: Arc<dyn Notifier>,
    channel: String,
    ping_frequency: Duration,
    max_poll_attempts: u32,
}

impl QueryRunner {
    pub fn new(
        executor: Arc<dyn QueryExecutor>,
        notifier: Arc<dyn Notifier>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            executor,
            notifier,
            channel: channel.into(),
            ping_frequency: DEFAULT_PING_FREQUENCY,
            max_poll_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
        }
    }

    pub fn with_ping_frequency(mut self, ping_frequency: Duration) -> Self {
        self.ping_frequency = ping_frequency;
        self
    }

    pub fn with_max_poll_attempts(mut self, max_poll_attempts: u32) -> Self {
        self.max_poll_attempts = max_poll_attempts.max(1);
        self
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Run `monitor` once
    ///
    /// The monitor's window only advances when every step up to dispatch has
    /// succeeded. A delivery failure is logged and reported through
    /// [`RunOutcome::delivered`]; it does not fail the run.
    ///
    /// # Errors
    ///
    /// `RunError::Query` for submit, job or polling failures,
    /// `RunError::Decision` for shape violations and state-store failures,
    /// `RunError::WindowOutOfRange` when the window cannot advance, checked
    /// before anything is submitted,
    /// `RunError::Cancelled` when `shutdown` flips to `true` between polls.
    pub async fn run_once(
        &self,
        monitor: &mut QueryMonitor,
        store: &StateStore,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<RunOutcome, RunError> {
        let query = monitor.query();
        info!(
            "Running {} monitor '{}' (query {})",
            monitor.kind(),
            monitor.name(),
            query.id
        );

        let next_window = monitor
            .window()
            .map(|w| {
                w.next()
                    .ok_or_else(|| RunError::WindowOutOfRange(monitor.name().to_string()))
            })
            .transpose()?;

        let handle = self.executor.submit(&query).await?;
        let rows = self.wait_for_results(&handle, shutdown).await?;
        debug!("Execution {} returned {} rows", handle, rows.len());

        let alert = monitor.decide(&rows, store).await?;
        let delivered = self.dispatch(&alert).await;

        if let Some(next) = next_window {
            debug!(
                "Advancing window of '{}' to {} - {}",
                monitor.name(),
                next.start(),
                next.end()
            );
            monitor.replace_window(next, Utc::now());
        }

        Ok(RunOutcome { alert, delivered })
    }

    async fn wait_for_results(
        &self,
        handle: &JobHandle,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<ResultSet, RunError> {
        let mut attempts = 0;
        loop {
            if *shutdown.borrow() {
                info!("Shutdown requested, abandoning execution {}", handle);
                return Err(RunError::Cancelled);
            }

            attempts += 1;
            match self.executor.poll(handle).await {
                Ok(JobStatus::Ready(rows)) => return Ok(rows),
                Ok(JobStatus::Pending) => {
                    debug!("Execution {} pending (attempt {})", handle, attempts)
                }
                Ok(JobStatus::Failed(reason)) => {
                    return Err(QueryError::JobFailed {
                        job_id: handle.job_id.clone(),
                        reason,
                    }
                    .into())
                }
                Err(e) => warn!(
                    "Polling execution {} failed (attempt {}): {}",
                    handle, attempts, e
                ),
            }

            if attempts >= self.max_poll_attempts {
                return Err(QueryError::PollExhausted {
                    job_id: handle.job_id.clone(),
                    attempts,
                }
                .into());
            }

            tokio::select! {
                _ = tokio::time::sleep(self.ping_frequency) => {}
                changed = shutdown.changed() => {
                    // A dropped sender can never request shutdown; finish the pause.
                    if changed.is_err() {
                        tokio::time::sleep(self.ping_frequency).await;
                    }
                }
            }
        }
    }

    async fn dispatch(&self, alert: &Alert) -> bool {
        match alert.kind {
            AlertKind::LogOnly => {
                info!("{}", alert.message);
                false
            }
            AlertKind::Notify => {
                match self.notifier.notify(&self.channel, &alert.message).await {
                    Ok(()) => {
                        info!(
                            "Alert sent via {} to {}",
                            self.notifier.name(),
                            self.channel
                        );
                        true
                    }
                    Err(e) => {
                        error!(
                            "Failed to deliver alert via {}: {} (message: {})",
                            self.notifier.name(),
                            e,
                            alert.message
                        );
                        false
                    }
                }
            }
        }
    }
}
