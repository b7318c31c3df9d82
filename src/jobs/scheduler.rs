use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::time::{interval, timeout_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    config::SchedulerConfig,
    database::models::job,
    job_store::{JobStore, StoreError},
    work_queue::{QueueError, WorkQueue},
};

#[derive(Debug, Error)]
enum DispatchError {
    #[error("failed to enqueue: {0}")]
    Enqueue(#[from] QueueError),
    #[error("enqueued but failed to mark as queued: {0}")]
    Persist(#[from] StoreError),
}

/// Counters for a single scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub found: usize,
    pub enqueued: usize,
    pub failed: usize,
    pub deadline_exceeded: bool,
}

/// Periodically moves due jobs from the store onto the work queue.
///
/// Exactly one scheduler is expected to run system-wide. Jobs are pushed
/// before they are marked `Queued`, so a crash between the two steps can
/// dispatch the same job twice.
pub struct Scheduler {
    store: JobStore,
    queue: WorkQueue,
    config: SchedulerConfig,
}

impl Scheduler {
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(store: JobStore, queue: WorkQueue, config: SchedulerConfig) -> Self {
        Self {
            store,
            queue,
            config,
        }
    }

    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            "📅 Scheduler started, scanning every {}s",
            self.config.tick_interval_seconds
        );

        let mut ticker = interval(self.config.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    info!("📅 Scheduler stopping");
                    return;
                }
                _ = ticker.tick() => {}
            }

            let report = self.tick().await;
            if report.found > 0 {
                info!(
                    "📅 Scheduled {} of {} due job(s) ({} failed)",
                    report.enqueued, report.found, report.failed
                );
            }
        }
    }

    /// Runs one scan, bounded by the tick deadline.
    ///
    /// The deadline is checked between jobs, so a job whose dispatch has
    /// started always gets both its enqueue and its `Queued` mark. Jobs left
    /// over keep matching the due filter and are picked up by the next tick.
    pub async fn tick(&self) -> TickReport {
        let now = Utc::now();
        let deadline = Instant::now() + self.config.tick_deadline();
        let report = self.schedule_due_jobs(now, deadline).await;

        if report.deadline_exceeded {
            warn!(
                "⏱️ Scheduler tick exceeded {}s deadline after {} of {} job(s); the rest wait for the next tick",
                self.config.tick_deadline_seconds, report.enqueued, report.found
            );
        }

        report
    }

    async fn schedule_due_jobs(&self, now: DateTime<Utc>, deadline: Instant) -> TickReport {
        let mut report = TickReport::default();

        let jobs = match timeout_at(deadline, self.store.due_jobs(now.naive_utc())).await {
            Ok(Ok(jobs)) => jobs,
            Ok(Err(e)) => {
                error!("❌ Failed to fetch due jobs: {}", e);
                return report;
            }
            Err(_) => {
                report.deadline_exceeded = true;
                return report;
            }
        };

        debug!("📅 Found {} due job(s)", jobs.len());
        report.found = jobs.len();

        for job in &jobs {
            if Instant::now() >= deadline {
                report.deadline_exceeded = true;
                break;
            }

            match self.dispatch(job).await {
                Ok(()) => {
                    debug!("📤 Enqueued job {}({})", job.name, job.id);
                    report.enqueued += 1;
                }
                Err(e) => {
                    error!("❌ Failed to schedule job {}({}): {}", job.name, job.id, e);
                    report.failed += 1;
                }
            }
        }

        report
    }

    async fn dispatch(&self, job: &job::Model) -> Result<(), DispatchError> {
        self.queue.enqueue(job.id).await?;
        self.store.mark_queued(job.id).await?;
        Ok(())
    }
}
