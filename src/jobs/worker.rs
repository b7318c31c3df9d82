use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    config::WorkerConfig,
    database::models::job,
    job_store::{JobStore, NewExecutionLog},
    jobs::{executor_registry::ExecutorRegistry, job_result::JobResult, retry::RetryPolicy},
    work_queue::WorkQueue,
};

/// Pulls job ids off the work queue and runs each one in its own task.
///
/// There is no cap on concurrent executions per worker. Each execution is
/// bounded by the job timeout; the task that ran it is the only one that
/// writes its outcome.
#[derive(Clone)]
pub struct Worker {
    name: String,
    store: JobStore,
    queue: WorkQueue,
    executors: ExecutorRegistry,
    config: WorkerConfig,
    retry_policy: RetryPolicy,
}

impl Worker {
    pub fn new(
        name: impl Into<String>,
        store: JobStore,
        queue: WorkQueue,
        executors: ExecutorRegistry,
        config: WorkerConfig,
    ) -> Self {
        Self {
            name: name.into(),
            store,
            queue,
            executors,
            retry_policy: RetryPolicy::new(config.max_retries),
            config,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dequeues until `shutdown` is cancelled, then waits for in-flight
    /// executions to finish.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!("🔧 Worker '{}' started", self.name);
        let in_flight = TaskTracker::new();

        loop {
            let popped = tokio::select! {
                () = shutdown.cancelled() => break,
                popped = self.queue.dequeue() => popped,
            };

            match popped {
                Ok(raw_id) => match Uuid::parse_str(&raw_id) {
                    Ok(job_id) => {
                        debug!("🔧 Worker '{}' received job {}", self.name, job_id);
                        let worker = self.clone();
                        in_flight.spawn(async move { worker.process(job_id).await });
                    }
                    Err(e) => {
                        warn!(
                            "⚠️ Worker '{}' dropped malformed job id {:?}: {}",
                            self.name, raw_id, e
                        );
                    }
                },
                Err(e) => {
                    error!("❌ Worker '{}' failed to dequeue: {}", self.name, e);
                    let jitter = Duration::from_millis(fastrand::u64(0..250));
                    tokio::select! {
                        () = shutdown.cancelled() => break,
                        () = sleep(self.config.dequeue_error_backoff() + jitter) => {}
                    }
                }
            }
        }

        in_flight.close();
        if !in_flight.is_empty() {
            info!(
                "🔧 Worker '{}' waiting for {} running job(s)",
                self.name,
                in_flight.len()
            );
        }
        in_flight.wait().await;
        info!("🔧 Worker '{}' stopped", self.name);
    }

    /// Runs a single job end to end: re-read, abort guard, execution under
    /// the deadline, execution log and status transition.
    pub async fn process(&self, job_id: Uuid) {
        let job = match self.store.find_job(job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                warn!("⚠️ Worker '{}' got unknown job {}", self.name, job_id);
                return;
            }
            Err(e) => {
                error!("❌ Worker '{}' failed to load job {}: {}", self.name, job_id, e);
                return;
            }
        };

        let started_at = Utc::now();
        let start = Instant::now();

        if self.retry_policy.is_exhausted(&job) {
            warn!(
                "🛑 Worker '{}' aborting job {}({}) without running it: {} failures already recorded",
                self.name, job.name, job.id, job.retry
            );
            let result = JobResult::Aborted { retry: job.retry };
            self.finish(&job, result, started_at, start.elapsed()).await;
            return;
        }

        let Some(executor) = self.executors.get(job.r#type) else {
            warn!(
                "⚠️ Worker '{}' skipped job {}({}): unsupported type '{}'",
                self.name, job.name, job.id, job.r#type
            );
            return;
        };

        let deadline = self.config.job_timeout();
        let result = match timeout(deadline, executor.execute(&job)).await {
            Ok(Ok(report)) => JobResult::Completed(report),
            Ok(Err(e)) => JobResult::Failed(e),
            Err(_) => JobResult::TimedOut(deadline),
        };

        self.finish(&job, result, started_at, start.elapsed()).await;
    }

    /// Persists the outcome: the status transition first, guarded on the job
    /// still being `Queued`, then its execution log entry. A lost transition
    /// writes no log.
    async fn finish(
        &self,
        job: &job::Model,
        result: JobResult,
        started_at: DateTime<Utc>,
        duration: Duration,
    ) {
        let transition = self.retry_policy.transition_for(job, &result, Utc::now());

        match self.store.apply_transition(job.id, &transition).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(
                    "⚠️ Worker '{}' discarded outcome of job {}: it is no longer queued",
                    self.name, job.id
                );
                return;
            }
            Err(e) => error!(
                "❌ Worker '{}' failed to update job {} to {}: {}",
                self.name, job.id, transition.status, e
            ),
        }

        let entry = NewExecutionLog {
            job_id: job.id,
            status: result.log_status(),
            status_code: result.log_status_code(),
            response: result.log_response(),
            run_at: started_at.naive_utc(),
            duration_ms: i64::try_from(duration.as_millis()).unwrap_or(i64::MAX),
        };
        if let Err(e) = self.store.insert_execution_log(entry).await {
            error!(
                "❌ Worker '{}' failed to record execution of job {}: {}",
                self.name, job.id, e
            );
        }

        match &result {
            JobResult::Completed(report) => info!(
                "✅ Worker '{}' completed job {}({}) in {:?}: {}",
                self.name, job.name, job.id, duration, report.status
            ),
            JobResult::Aborted { .. } => {}
            failure if transition.status.is_terminal() => error!(
                "🛑 Worker '{}' job {}({}) {} after {:?}, giving up after {} failures",
                self.name, job.name, job.id, failure, duration, transition.retry
            ),
            failure => warn!(
                "⚠️ Worker '{}' job {}({}) {} after {:?}, now {} (retry {})",
                self.name,
                job.name,
                job.id,
                failure,
                duration,
                transition.status,
                transition.retry
            ),
        }
    }
}
