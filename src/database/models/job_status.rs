use sea_orm::DeriveActiveEnum;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Lifecycle state of a scheduled job.
///
/// # State Transitions
///
/// - `Pending` / `Failed` → `Queued` when the scheduler finds the job due
/// - `Queued` → `Pending` after a successful execution
/// - `Queued` → `Failed` after a failed or timed out execution with retries left
/// - `Queued` → `Aborted` once the retry ceiling is reached
///
/// `Aborted` is terminal.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    EnumIter,
    EnumString,
    Display,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "job_status")]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum JobStatus {
    /// Waiting for its `next_run`. Initial state and the state a job returns
    /// to after every successful execution.
    #[sea_orm(string_value = "pending")]
    #[default]
    Pending,

    /// Pushed onto the work queue; a worker owns the outcome.
    #[sea_orm(string_value = "queued")]
    Queued,

    /// The last execution failed and a retry is scheduled with backoff.
    #[sea_orm(string_value = "failed")]
    Failed,

    /// Retry budget exhausted. Never rescheduled.
    #[sea_orm(string_value = "aborted")]
    Aborted,
}

impl JobStatus {
    /// Statuses the scheduler is allowed to pick up.
    pub const SCHEDULABLE: [Self; 2] = [Self::Pending, Self::Failed];

    pub const fn is_schedulable(&self) -> bool {
        matches!(self, Self::Pending | Self::Failed)
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}
