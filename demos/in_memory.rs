//! Runs the scheduler and one worker against the in-memory store and queue.
//!
//! A local mock endpoint stands in for the outside world. Three jobs are due
//! right away: one that succeeds, one whose host refuses connections and one
//! without a URL.
//!
//! ```sh
//! cargo run --example in_memory
//! ```

use std::time::Duration;

use chrono::Utc;
use crony::{
    config::{SchedulerConfig, WorkerConfig},
    database::models::{job, job_status::JobStatus, job_type::JobType},
    job_store::JobStore,
    jobs::{executor_registry::ExecutorRegistry, schedule, scheduler::Scheduler, worker::Worker},
    work_queue::WorkQueue,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use wiremock::{matchers::method, Mock, MockServer, ResponseTemplate};

fn http_job(name: &str, payload: serde_json::Value) -> job::Model {
    let now = Utc::now().naive_utc();
    job::Model {
        id: Uuid::new_v4(),
        user_id: Uuid::nil(),
        name: name.to_string(),
        schedule: "*/5 * * * *".to_string(),
        timezone: "Europe/Warsaw".to_string(),
        r#type: JobType::Http,
        payload,
        status: JobStatus::Pending,
        next_run: Some(now),
        last_run: None,
        retry: 0,
        enabled: true,
        recurring: true,
        created_at: now,
        updated_at: now,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_target(false)
        .compact()
        .init();

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("pong"))
        .mount(&server)
        .await;

    let store = JobStore::memory();
    let queue = WorkQueue::memory();

    for job in [
        http_job("ping", json!({ "url": format!("{}/ping", server.uri()) })),
        http_job("refused", json!({ "url": "http://127.0.0.1:1/" })),
        http_job("no url", json!({ "url": "" })),
    ] {
        schedule::validate(&job.schedule, &job.timezone)?;
        store.insert_job(job).await?;
    }

    let worker_config = WorkerConfig::default();
    let scheduler = Scheduler::new(store.clone(), queue.clone(), SchedulerConfig::default());
    let worker = Worker::new(
        "demo-worker",
        store.clone(),
        queue.clone(),
        ExecutorRegistry::with_defaults(&worker_config),
        worker_config,
    );

    let shutdown = CancellationToken::new();
    let scheduler_task = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { scheduler.run(shutdown).await }
    });
    let worker_task = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { worker.run(shutdown).await }
    });

    tokio::time::sleep(Duration::from_secs(2)).await;
    shutdown.cancel();
    scheduler_task.await?;
    worker_task.await?;

    let Some(memory) = store.as_memory() else {
        return Ok(());
    };

    println!();
    for job in memory.jobs() {
        println!(
            "📋 {:<8} status={:<8} retry={} next_run={:?}",
            job.name, job.status, job.retry, job.next_run
        );
        for entry in memory.execution_logs(Some(job.id)) {
            let marker = if entry.received_response() { "✅" } else { "❌" };
            println!(
                "   {} {} ({}) in {}ms: {}",
                marker, entry.status, entry.status_code, entry.duration_ms, entry.response
            );
        }
    }

    Ok(())
}
