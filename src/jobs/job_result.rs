use std::fmt::{Display, Formatter, Result};
use std::time::Duration;

use crate::jobs::{ExecutionError, ExecutionReport};

/// Outcome of one attempt at running a job, as seen by the worker.
#[derive(Debug)]
pub enum JobResult {
    Completed(ExecutionReport),
    Failed(ExecutionError),
    TimedOut(Duration),
    /// Retry budget was already exhausted when the worker picked the job up;
    /// nothing was executed.
    Aborted { retry: i32 },
}

impl JobResult {
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// Status column of the execution log entry.
    pub fn log_status(&self) -> String {
        match self {
            Self::Completed(report) => report.status.clone(),
            Self::Failed(_) => "failed".to_string(),
            Self::TimedOut(_) => "timed_out".to_string(),
            Self::Aborted { .. } => "aborted".to_string(),
        }
    }

    /// Numeric status code of the execution log entry; 0 without a response.
    pub const fn log_status_code(&self) -> i32 {
        match self {
            Self::Completed(report) => report.status_code,
            Self::Failed(_) | Self::TimedOut(_) | Self::Aborted { .. } => 0,
        }
    }

    /// Response column of the execution log entry.
    pub fn log_response(&self) -> String {
        match self {
            Self::Completed(report) => report.response.clone(),
            other => other.to_string(),
        }
    }
}

impl Display for JobResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Self::Completed(report) => write!(f, "completed: {}", report.status),
            Self::Failed(e) => write!(f, "error: {e}"),
            Self::TimedOut(deadline) => {
                write!(f, "timed out after {}s", deadline.as_secs_f64())
            }
            Self::Aborted { retry } => {
                write!(f, "aborted: retry budget exhausted after {retry} failures")
            }
        }
    }
}
