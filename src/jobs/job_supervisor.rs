use std::{future::Future, sync::Arc, time::Duration};

use tokio::{signal, spawn, time::sleep};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, error, info, warn};

use crate::jobs::{scheduler::Scheduler, worker::Worker};

const RESTART_DELAY: Duration = Duration::from_secs(10);

/// Owns the long-running scheduler and worker loops of a process.
///
/// Every loop is restarted after a crash and stopped through a shared
/// cancellation token.
pub struct JobSupervisor {
    shutdown: CancellationToken,
    tasks: TaskTracker,
}

impl JobSupervisor {
    pub fn new() -> Self {
        Self {
            shutdown: CancellationToken::new(),
            tasks: TaskTracker::new(),
        }
    }

    pub fn spawn_scheduler(&self, scheduler: Scheduler) {
        info!("📅 Starting job scheduler");
        let scheduler = Arc::new(scheduler);
        self.spawn_with_restart("scheduler".to_string(), move |shutdown| {
            let scheduler = Arc::clone(&scheduler);
            async move { scheduler.run(shutdown).await }
        });
    }

    pub fn spawn_worker(&self, worker: Worker) {
        info!("⚡ Starting worker '{}'", worker.name());
        let name = worker.name().to_string();
        self.spawn_with_restart(name, move |shutdown| {
            let worker = worker.clone();
            async move { worker.run(shutdown).await }
        });
    }

    fn spawn_with_restart<F, Fut>(&self, name: String, start: F)
    where
        F: Fn(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let shutdown = self.shutdown.clone();
        self.tasks.spawn(async move {
            run_with_restart(&name, shutdown, RESTART_DELAY, start).await;
        });
    }

    /// Blocks until Ctrl-C or until the shutdown token is cancelled, then
    /// stops every loop and waits for in-flight executions.
    pub async fn wait_for_shutdown(self) {
        tokio::select! {
            result = signal::ctrl_c() => match result {
                Ok(()) => info!("🛑 Received Ctrl-C, shutting down"),
                Err(e) => error!("❌ Failed to listen for Ctrl-C: {}", e),
            },
            () = self.shutdown.cancelled() => {}
        }
        self.shutdown().await;
    }

    pub async fn shutdown(self) {
        self.shutdown.cancel();
        self.tasks.close();
        self.tasks.wait().await;
        info!("👋 All job loops stopped");
    }
}

impl Default for JobSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs `start` until shutdown, starting it again after `restart_delay` when
/// it panics.
async fn run_with_restart<F, Fut>(
    name: &str,
    shutdown: CancellationToken,
    restart_delay: Duration,
    start: F,
) where
    F: Fn(CancellationToken) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let mut restart_count = 0;
    loop {
        debug!("Starting '{}' (restart #{})", name, restart_count);

        match spawn(start(shutdown.clone())).await {
            Ok(()) if shutdown.is_cancelled() => return,
            Ok(()) => warn!("⚠️ '{}' stopped unexpectedly (restart #{})", name, restart_count),
            Err(e) => error!(
                "💥 '{}' crashed (restart #{}) - error: {}",
                name, restart_count, e
            ),
        }

        restart_count += 1;

        tokio::select! {
            () = shutdown.cancelled() => return,
            () = sleep(restart_delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{SchedulerConfig, WorkerConfig},
        database::models::job_status::JobStatus,
        job_store::JobStore,
        jobs::executor_registry::ExecutorRegistry,
        tests::fixtures::JobFixture,
        work_queue::WorkQueue,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::timeout;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_crashed_loop_is_restarted() {
        let starts = Arc::new(AtomicUsize::new(0));
        let shutdown = CancellationToken::new();

        let counter = Arc::clone(&starts);
        let token = shutdown.clone();
        let handle = spawn(async move {
            run_with_restart("flaky", token, Duration::from_millis(5), move |shutdown| {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        panic!("first start crashes");
                    }
                    shutdown.cancelled().await;
                }
            })
            .await;
        });

        for _ in 0..100 {
            if starts.load(Ordering::SeqCst) >= 2 {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(starts.load(Ordering::SeqCst), 2);

        shutdown.cancel();
        timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_supervised_pipeline_runs_due_job_and_stops() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let store = JobStore::memory();
        let queue = WorkQueue::memory();
        let job = JobFixture::http(&server.uri()).due().build();
        store.insert_job(job.clone()).await.unwrap();

        let worker_config = WorkerConfig::default();
        let supervisor = JobSupervisor::new();
        supervisor.spawn_scheduler(Scheduler::new(
            store.clone(),
            queue.clone(),
            SchedulerConfig::default(),
        ));
        supervisor.spawn_worker(Worker::new(
            "worker-0",
            store.clone(),
            queue.clone(),
            ExecutorRegistry::with_defaults(&worker_config),
            worker_config,
        ));

        let memory = store.as_memory().unwrap();
        for _ in 0..200 {
            if !memory.execution_logs(Some(job.id)).is_empty() {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }

        timeout(Duration::from_secs(2), supervisor.shutdown())
            .await
            .unwrap();

        assert_eq!(memory.execution_logs(Some(job.id)).len(), 1);
        let stored = store.find_job(job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Pending);
    }
}
