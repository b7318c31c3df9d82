use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub tracing: TracingConfig,
    pub database: DatabaseConfig,
    pub queue: QueueConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TracingConfig {
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
    /// Apply pending migrations before the scheduler or workers start (default: true)
    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Redis connection URL, e.g. `redis://localhost:6379`
    pub url: String,
    /// Name of the list used as the work queue (default: "jobs")
    #[serde(default = "default_queue_name")]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Interval between due-job scans in seconds (default: 60)
    #[serde(default = "default_tick_interval")]
    pub tick_interval_seconds: u64,
    /// Upper bound for a single scan in seconds (default: 30)
    #[serde(default = "default_tick_deadline")]
    pub tick_deadline_seconds: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_seconds: default_tick_interval(),
            tick_deadline_seconds: default_tick_deadline(),
        }
    }
}

impl SchedulerConfig {
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_seconds)
    }

    pub const fn tick_deadline(&self) -> Duration {
        Duration::from_secs(self.tick_deadline_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Number of dequeue loops started by this process (default: 1)
    #[serde(default = "default_worker_count")]
    pub count: u32,
    /// Hard deadline for a single execution in seconds (default: 300)
    #[serde(default = "default_job_timeout")]
    pub job_timeout_seconds: u64,
    /// Consecutive failures after which a job is aborted (default: 3)
    #[serde(default = "default_max_retries")]
    pub max_retries: i32,
    /// Bytes of response body kept in the execution log (default: 10240)
    #[serde(default = "default_response_body_limit")]
    pub response_body_limit: usize,
    /// Pause after a failed dequeue in milliseconds (default: 1000)
    #[serde(default = "default_dequeue_error_backoff")]
    pub dequeue_error_backoff_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count: default_worker_count(),
            job_timeout_seconds: default_job_timeout(),
            max_retries: default_max_retries(),
            response_body_limit: default_response_body_limit(),
            dequeue_error_backoff_ms: default_dequeue_error_backoff(),
        }
    }
}

impl WorkerConfig {
    pub const fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_seconds)
    }

    pub const fn dequeue_error_backoff(&self) -> Duration {
        Duration::from_millis(self.dequeue_error_backoff_ms)
    }
}

const fn default_run_migrations() -> bool {
    true
}

fn default_queue_name() -> String {
    "jobs".to_string()
}

const fn default_tick_interval() -> u64 {
    60 // 1 minute
}

const fn default_tick_deadline() -> u64 {
    30
}

const fn default_worker_count() -> u32 {
    1
}

const fn default_job_timeout() -> u64 {
    300 // 5 minutes
}

const fn default_max_retries() -> i32 {
    3
}

const fn default_response_body_limit() -> usize {
    10 * 1024
}

const fn default_dequeue_error_backoff() -> u64 {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;
    use config_rs::{Config as ConfigRs, File, FileFormat};

    fn parse(toml: &str) -> Config {
        ConfigRs::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_minimal_config_uses_reference_defaults() {
        let config = parse(
            r#"
            [tracing]
            log_level = "info"

            [database]
            url = "postgres://localhost/crony"
            pool_size = 5

            [queue]
            url = "redis://localhost:6379"
            "#,
        );

        assert_eq!(config.queue.name, "jobs");
        assert!(config.database.run_migrations);
        assert_eq!(config.scheduler.tick_interval(), Duration::from_secs(60));
        assert_eq!(config.scheduler.tick_deadline(), Duration::from_secs(30));
        assert_eq!(config.worker.count, 1);
        assert_eq!(config.worker.job_timeout(), Duration::from_secs(300));
        assert_eq!(config.worker.max_retries, 3);
        assert_eq!(config.worker.response_body_limit, 10240);
    }

    #[test]
    fn test_overrides_are_respected() {
        let config = parse(
            r#"
            [tracing]
            log_level = "debug"

            [database]
            url = "postgres://localhost/crony"
            pool_size = 5
            run_migrations = false

            [queue]
            url = "redis://localhost:6379"
            name = "cron-jobs"

            [scheduler]
            tick_interval_seconds = 10

            [worker]
            count = 4
            max_retries = 5
            "#,
        );

        assert!(!config.database.run_migrations);
        assert_eq!(config.queue.name, "cron-jobs");
        assert_eq!(config.scheduler.tick_interval_seconds, 10);
        assert_eq!(config.scheduler.tick_deadline_seconds, 30);
        assert_eq!(config.worker.count, 4);
        assert_eq!(config.worker.max_retries, 5);
        assert_eq!(config.worker.job_timeout_seconds, 300);
    }
}
