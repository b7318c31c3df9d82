pub mod executor_registry;
pub mod http_executor;
pub mod job_result;
pub mod job_supervisor;
pub mod retry;
pub mod schedule;
pub mod scheduler;
pub mod worker;

use async_trait::async_trait;
use thiserror::Error;

use crate::database::models::{job, job_type::JobType};

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    #[error("url is required")]
    MissingUrl,
    #[error("invalid method '{0}'")]
    InvalidMethod(String),
    #[error("{0}")]
    Transport(String),
}

/// What an executor reports back after the action went through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    pub status: String,
    pub status_code: i32,
    pub response: String,
}

/// Runs the action behind one `JobType`.
///
/// Returning `Err` consumes one retry. Executors must be cancel-safe: the
/// worker drops the future when the execution deadline passes.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    fn job_type(&self) -> JobType;

    async fn execute(&self, job: &job::Model) -> Result<ExecutionReport, ExecutionError>;
}
