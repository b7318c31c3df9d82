//! `SeaORM` Entity for scheduled jobs

use crate::database::models::{job_status::JobStatus, job_type::JobType};
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "job")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    /// Five-field cron expression evaluated in `timezone`.
    pub schedule: String,
    /// IANA timezone name, e.g. `Europe/Warsaw`.
    pub timezone: String,
    pub r#type: JobType,
    #[sea_orm(column_type = "JsonBinary")]
    pub payload: Json,
    pub status: JobStatus,
    /// Next due instant, stored as naive UTC.
    pub next_run: Option<DateTime>,
    pub last_run: Option<DateTime>,
    /// Consecutive failures since the last success.
    pub retry: i32,
    pub enabled: bool,
    pub recurring: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::execution_log::Entity")]
    ExecutionLog,
}

impl Related<super::execution_log::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ExecutionLog.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Whether the scheduler should pick this job up at `now`.
    #[must_use]
    pub fn is_due(&self, now: DateTime) -> bool {
        self.enabled
            && self.status.is_schedulable()
            && self.next_run.is_some_and(|next_run| next_run <= now)
    }
}
