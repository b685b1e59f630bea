//! Fixed-cadence host for a set of monitors
//!
//! Every monitor sits behind its own async mutex. Ticks run on their own
//! tasks, so a slow monitor never delays the others; a tick that finds the
//! previous run of the same monitor still holding the lock is skipped.

use crate::error::RunError;
use crate::monitor::QueryMonitor;
use crate::runner::{QueryRunner, RunOutcome};
use crate::store::StateStore;
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;

/// Default time between runs of the same monitor
pub const DEFAULT_EVERY: Duration = Duration::from_secs(6 * 60 * 60);

/// A monitor together with the runner configured for it
pub struct MonitorJob {
    name: String,
    monitor: Mutex<QueryMonitor>,
    runner: QueryRunner,
}

impl MonitorJob {
    pub fn new(monitor: QueryMonitor, runner: QueryRunner) -> Self {
        Self {
            name: monitor.name().to_string(),
            monitor: Mutex::new(monitor),
            runner,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Copy of the monitor's current state
    pub async fn snapshot(&self) -> QueryMonitor {
        self.monitor.lock().await.clone()
    }
}

/// Outcome of one monitor run, labelled with the monitor's name
#[derive(Debug)]
pub struct RunReport {
    pub name: String,
    pub result: Result<RunOutcome, RunError>,
}

pub struct Scheduler {
    jobs: Vec<Arc<MonitorJob>>,
    store: Arc<StateStore>,
    every: Duration,
}

impl Scheduler {
    pub fn new(store: Arc<StateStore>, every: Duration) -> Self {
        Self {
            jobs: Vec::new(),
            store,
            every,
        }
    }

    pub fn add(&mut self, monitor: QueryMonitor, runner: QueryRunner) {
        self.jobs.push(Arc::new(MonitorJob::new(monitor, runner)));
    }

    pub fn jobs(&self) -> &[Arc<MonitorJob>] {
        &self.jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Run every monitor a single time, one after another
    pub async fn run_all_once(&self, shutdown: watch::Receiver<bool>) -> Vec<RunReport> {
        let mut reports = Vec::with_capacity(self.jobs.len());
        for job in &self.jobs {
            if let Some(report) =
                run_job(Arc::clone(job), Arc::clone(&self.store), shutdown.clone()).await
            {
                reports.push(report);
            }
        }
        reports
    }

    /// Drive every monitor on the configured cadence until `shutdown` is set
    ///
    /// The first run of each monitor starts immediately.
    pub async fn run(&self, shutdown: watch::Receiver<bool>) {
        info!(
            "Scheduling {} monitor(s) every {} minute(s)",
            self.jobs.len(),
            self.every.as_secs() / 60
        );

        let mut loops = JoinSet::new();
        for job in &self.jobs {
            loops.spawn(schedule_job(
                Arc::clone(job),
                Arc::clone(&self.store),
                self.every,
                shutdown.clone(),
            ));
        }

        while let Some(joined) = loops.join_next().await {
            if let Err(e) = joined {
                error!("Scheduler task failed: {}", e);
            }
        }
        info!("Scheduler stopped");
    }
}

async fn schedule_job(
    job: Arc<MonitorJob>,
    store: Arc<StateStore>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                in_flight.spawn(run_job(Arc::clone(&job), Arc::clone(&store), shutdown.clone()));
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            Some(joined) = in_flight.join_next() => {
                if let Err(e) = joined {
                    error!("Run of '{}' panicked: {}", job.name(), e);
                }
            }
        }
    }

    // Runs in progress notice the shutdown between polls.
    while in_flight.join_next().await.is_some() {}
}

/// Run `job` once unless its previous run is still in progress
async fn run_job(
    job: Arc<MonitorJob>,
    store: Arc<StateStore>,
    mut shutdown: watch::Receiver<bool>,
) -> Option<RunReport> {
    let Ok(mut monitor) = job.monitor.try_lock() else {
        warn!(
            "Previous run of '{}' still in progress, skipping this tick",
            job.name()
        );
        return None;
    };

    let result = job.runner.run_once(&mut monitor, &store, &mut shutdown).await;
    match &result {
        Ok(outcome) => info!(
            "Run of '{}' finished ({:?}, delivered: {})",
            job.name(),
            outcome.alert.kind,
            outcome.delivered
        ),
        Err(RunError::Cancelled) => warn!("Run of '{}' cancelled", job.name()),
        Err(e) => error!("Run of '{}' failed: {}", job.name(), e),
    }

    Some(RunReport {
        name: job.name().to_string(),
        result,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::RecordingNotifier;
    use crate::executor::{JobStatus, ScriptStep, ScriptedExecutor};
    use crate::monitor::{QueryBase, ResultThresholdQuery, WindowedQueryMonitor};
    use crate::query::{Query, ResultRow};
    use crate::store::MemoryStateBackend;
    use crate::window::TimeWindow;
    use chrono::{TimeZone, Utc};

    async fn store() -> Arc<StateStore> {
        Arc::new(
            StateStore::open(Arc::new(MemoryStateBackend::new()))
                .await
                .unwrap(),
        )
    }

    fn runner(executor: &ScriptedExecutor, notifier: &RecordingNotifier) -> QueryRunner {
        QueryRunner::new(Arc::new(executor.clone()), Arc::new(notifier.clone()), "#alerts")
            .with_ping_frequency(Duration::from_millis(1))
            .with_max_poll_attempts(3)
    }

    fn threshold(name: &str) -> QueryMonitor {
        QueryMonitor::ResultThreshold(ResultThresholdQuery::new(QueryBase::new(
            Query::new(1, name, vec![]),
            0,
        )))
    }

    fn windowed() -> QueryMonitor {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        QueryMonitor::Windowed(WindowedQueryMonitor::new(
            QueryBase::new(Query::new(2, "Windowed", vec![]), 1),
            TimeWindow::from_start(start, chrono::Duration::hours(6)).unwrap(),
            start,
        ))
    }

    fn ready_steps(n: usize) -> Vec<ScriptStep> {
        (0..n)
            .map(|_| ScriptStep::Status(JobStatus::Ready(vec![ResultRow::new()])))
            .collect()
    }

    #[tokio::test]
    async fn test_run_all_once_reports_each_monitor() {
        let good = ScriptedExecutor::ready(vec![ResultRow::new()]);
        let bad = ScriptedExecutor::new([ScriptStep::Status(JobStatus::Failed("boom".into()))]);
        let notifier = RecordingNotifier::new();

        let mut scheduler = Scheduler::new(store().await, DEFAULT_EVERY);
        scheduler.add(threshold("good"), runner(&good, &notifier));
        scheduler.add(threshold("bad"), runner(&bad, &notifier));
        assert_eq!(scheduler.len(), 2);

        let (_tx, rx) = watch::channel(false);
        let reports = scheduler.run_all_once(rx).await;

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].name, "good");
        assert!(reports[0].result.is_ok());
        assert_eq!(reports[1].name, "bad");
        assert!(reports[1].result.is_err());
        assert_eq!(notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_busy_monitor_is_skipped() {
        let executor = ScriptedExecutor::ready(vec![]);
        let notifier = RecordingNotifier::new();
        let store = store().await;

        let mut scheduler = Scheduler::new(Arc::clone(&store), DEFAULT_EVERY);
        scheduler.add(threshold("busy"), runner(&executor, &notifier));
        let job = Arc::clone(&scheduler.jobs()[0]);

        let (_tx, rx) = watch::channel(false);
        let held = job.monitor.lock().await;
        assert!(run_job(Arc::clone(&job), Arc::clone(&store), rx.clone())
            .await
            .is_none());
        drop(held);

        assert!(run_job(job, store, rx).await.is_some());
        assert_eq!(executor.submitted().len(), 1);
    }

    #[tokio::test]
    async fn test_run_repeats_until_shutdown() {
        let executor = ScriptedExecutor::new(ready_steps(50));
        let notifier = RecordingNotifier::new();

        let mut scheduler = Scheduler::new(store().await, Duration::from_millis(20));
        scheduler.add(windowed(), runner(&executor, &notifier));
        let job = Arc::clone(&scheduler.jobs()[0]);
        let initial = job.snapshot().await.window().unwrap();

        let (tx, rx) = watch::channel(false);
        let stop = async {
            tokio::time::sleep(Duration::from_millis(110)).await;
            tx.send(true).unwrap();
        };
        tokio::join!(scheduler.run(rx), stop);

        let runs = notifier.sent().len();
        assert!(runs >= 2, "expected repeated runs, got {}", runs);

        // Each completed run advanced the window by one length.
        let mut expected = initial;
        for _ in 0..runs {
            expected = expected.next().unwrap();
        }
        assert_eq!(job.snapshot().await.window(), Some(expected));
    }
}
