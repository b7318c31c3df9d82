//! Status transitions applied after an execution attempt.
//!
//! Success puts the job back to `Pending` with a fresh `next_run`; failures
//! and timeouts consume one retry and back off exponentially until the retry
//! ceiling turns the job `Aborted`.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use tracing::error;

use crate::{
    database::models::{job, job_status::JobStatus},
    jobs::{job_result::JobResult, schedule},
};

/// Field values written to a job when it leaves `Queued`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub status: JobStatus,
    pub retry: i32,
    pub next_run: Option<NaiveDateTime>,
    pub last_run: Option<NaiveDateTime>,
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: i32,
}

impl RetryPolicy {
    pub const fn new(max_retries: i32) -> Self {
        Self { max_retries }
    }

    /// True when a job was queued although its retry count is already past
    /// the ceiling, e.g. because it was enqueued before an abort landed.
    pub const fn is_exhausted(&self, job: &job::Model) -> bool {
        job.retry > self.max_retries
    }

    pub fn transition_for(
        &self,
        job: &job::Model,
        result: &JobResult,
        now: DateTime<Utc>,
    ) -> Transition {
        match result {
            JobResult::Completed(_) => self.on_success(job, now),
            JobResult::Failed(_) | JobResult::TimedOut(_) => self.on_failure(job, now),
            JobResult::Aborted { .. } => self.on_abort(job),
        }
    }

    /// Resets the retry counter and schedules the next regular run.
    ///
    /// One-shot jobs are disabled instead of being rescheduled.
    pub fn on_success(&self, job: &job::Model, now: DateTime<Utc>) -> Transition {
        let next_run = match schedule::next_run(&job.schedule, &job.timezone, now) {
            Ok(next_run) => Some(next_run.naive_utc()),
            Err(e) => {
                error!(
                    "❌ Could not compute next run for job {}: {}. Job will not be scheduled again",
                    job.id, e
                );
                None
            }
        };

        Transition {
            status: JobStatus::Pending,
            retry: 0,
            next_run,
            last_run: Some(now.naive_utc()),
            enabled: job.enabled && job.recurring,
        }
    }

    pub fn on_failure(&self, job: &job::Model, now: DateTime<Utc>) -> Transition {
        let retry = job.retry.saturating_add(1);

        let (status, next_run) = if retry < self.max_retries {
            (
                JobStatus::Failed,
                Some((now + backoff_delay(retry)).naive_utc()),
            )
        } else {
            (JobStatus::Aborted, None)
        };

        Transition {
            status,
            retry,
            next_run,
            last_run: Some(now.naive_utc()),
            enabled: job.enabled,
        }
    }

    pub const fn on_abort(&self, job: &job::Model) -> Transition {
        Transition {
            status: JobStatus::Aborted,
            retry: job.retry,
            next_run: None,
            last_run: job.last_run,
            enabled: job.enabled,
        }
    }
}

/// Delay before the next attempt after `retry` consecutive failures:
/// 1 minute for the first failure, 2^retry minutes afterwards.
pub fn backoff_delay(retry: i32) -> Duration {
    if retry <= 1 {
        return Duration::minutes(1);
    }
    let exponent = u32::try_from(retry).unwrap_or(u32::MAX).min(32);
    Duration::minutes(2_i64.saturating_pow(exponent))
}
