use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::{
    config::{SchedulerConfig, WorkerConfig},
    database::models::{execution_log, job},
    job_store::JobStore,
    jobs::{
        executor_registry::ExecutorRegistry,
        scheduler::{Scheduler, TickReport},
        worker::Worker,
    },
    work_queue::WorkQueue,
};

/// Scheduler and worker wired to an in-memory store and queue.
///
/// Drives the pipeline one step at a time instead of running the loops.
pub struct TestHarness {
    pub store: JobStore,
    pub queue: WorkQueue,
    pub scheduler: Scheduler,
    pub worker: Worker,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_executors(ExecutorRegistry::with_defaults(&WorkerConfig::default()))
    }

    pub fn with_executors(executors: ExecutorRegistry) -> Self {
        super::init_tracing();

        let store = JobStore::memory();
        let queue = WorkQueue::memory();
        let scheduler = Scheduler::new(store.clone(), queue.clone(), SchedulerConfig::default());
        let worker = Worker::new(
            "test-worker",
            store.clone(),
            queue.clone(),
            executors,
            WorkerConfig::default(),
        );

        Self {
            store,
            queue,
            scheduler,
            worker,
        }
    }

    pub async fn insert(&self, job: job::Model) -> job::Model {
        self.store
            .insert_job(job)
            .await
            .expect("Failed to insert job fixture")
    }

    pub async fn job(&self, id: Uuid) -> job::Model {
        self.store
            .find_job(id)
            .await
            .expect("Failed to load job")
            .expect("Job does not exist")
    }

    pub fn logs(&self, job_id: Uuid) -> Vec<execution_log::Model> {
        self.memory_store().execution_logs(Some(job_id))
    }

    pub fn logs_total(&self) -> usize {
        self.memory_store().execution_logs(None).len()
    }

    /// Moves `next_run` into the past, skipping any backoff.
    pub fn make_due(&self, id: Uuid) {
        let due = Utc::now().naive_utc() - Duration::seconds(1);
        self.memory_store()
            .update(id, |job| job.next_run = Some(due));
    }

    /// Runs one scheduler tick, then processes everything it enqueued.
    pub async fn tick_and_drain(&self) -> TickReport {
        let report = self.scheduler.tick().await;

        let queue = self.queue.as_memory().expect("Harness uses a memory queue");
        while let Some(raw_id) = queue.try_pop() {
            let id = Uuid::parse_str(&raw_id).expect("Queued id is not a uuid");
            self.worker.process(id).await;
        }

        report
    }

    fn memory_store(&self) -> &crate::job_store::MemoryJobStore {
        self.store.as_memory().expect("Harness uses a memory store")
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
