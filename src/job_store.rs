use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use chrono::NaiveDateTime;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder as _, Set,
};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    database::models::{
        execution_log,
        job::{self, Entity as JobEntity},
        job_status::JobStatus,
    },
    jobs::retry::Transition,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

/// Fields of an execution log entry about to be written.
#[derive(Debug, Clone)]
pub struct NewExecutionLog {
    pub job_id: Uuid,
    pub status: String,
    pub status_code: i32,
    pub response: String,
    pub run_at: NaiveDateTime,
    pub duration_ms: i64,
}

/// Durable record of jobs and their execution logs.
///
/// Either backed by the database (production) or kept in memory (tests and
/// single-process demos).
#[derive(Clone, Debug)]
pub enum JobStore {
    Database(DatabaseConnection),
    Memory(MemoryJobStore),
}

impl JobStore {
    pub const fn database(db: DatabaseConnection) -> Self {
        Self::Database(db)
    }

    pub fn memory() -> Self {
        Self::Memory(MemoryJobStore::default())
    }

    /// Enabled jobs in a schedulable status whose `next_run` has passed,
    /// oldest due first.
    pub async fn due_jobs(&self, now: NaiveDateTime) -> Result<Vec<job::Model>, StoreError> {
        match self {
            Self::Database(db) => Ok(JobEntity::find()
                .filter(job::Column::Enabled.eq(true))
                .filter(job::Column::Status.is_in(JobStatus::SCHEDULABLE))
                .filter(job::Column::NextRun.lte(now))
                .order_by_asc(job::Column::NextRun)
                .all(db)
                .await?),
            Self::Memory(store) => Ok(store.due_jobs(now)),
        }
    }

    pub async fn find_job(&self, id: Uuid) -> Result<Option<job::Model>, StoreError> {
        match self {
            Self::Database(db) => Ok(JobEntity::find_by_id(id).one(db).await?),
            Self::Memory(store) => Ok(store.job(id)),
        }
    }

    pub async fn insert_job(&self, job: job::Model) -> Result<job::Model, StoreError> {
        match self {
            Self::Database(db) => {
                let active_model: job::ActiveModel = job.into();
                Ok(active_model.insert(db).await?)
            }
            Self::Memory(store) => {
                store.state().jobs.insert(job.id, job.clone());
                Ok(job)
            }
        }
    }

    /// Hands the job over to the workers.
    pub async fn mark_queued(&self, id: Uuid) -> Result<(), StoreError> {
        match self {
            Self::Database(db) => {
                JobEntity::update_many()
                    .set(job::ActiveModel {
                        status: Set(JobStatus::Queued),
                        ..Default::default()
                    })
                    .filter(job::Column::Id.eq(id))
                    .exec(db)
                    .await?;
                Ok(())
            }
            Self::Memory(store) => {
                store.update(id, |job| job.status = JobStatus::Queued);
                Ok(())
            }
        }
    }

    /// Writes the outcome of an execution, but only while the job is still
    /// `Queued`. Returns `false` when another writer already moved it on.
    pub async fn apply_transition(
        &self,
        id: Uuid,
        transition: &Transition,
    ) -> Result<bool, StoreError> {
        match self {
            Self::Database(db) => {
                let result = JobEntity::update_many()
                    .set(job::ActiveModel {
                        status: Set(transition.status),
                        retry: Set(transition.retry),
                        next_run: Set(transition.next_run),
                        last_run: Set(transition.last_run),
                        enabled: Set(transition.enabled),
                        ..Default::default()
                    })
                    .filter(job::Column::Id.eq(id))
                    .filter(job::Column::Status.eq(JobStatus::Queued))
                    .exec(db)
                    .await?;
                Ok(result.rows_affected > 0)
            }
            Self::Memory(store) => Ok(store.apply_transition(id, transition)),
        }
    }

    pub async fn insert_execution_log(
        &self,
        entry: NewExecutionLog,
    ) -> Result<execution_log::Model, StoreError> {
        let model = execution_log::Model {
            id: Uuid::new_v4(),
            job_id: entry.job_id,
            status: entry.status,
            status_code: entry.status_code,
            response: entry.response,
            run_at: entry.run_at,
            duration_ms: entry.duration_ms,
        };

        match self {
            Self::Database(db) => {
                let active_model: execution_log::ActiveModel = model.into();
                Ok(active_model.insert(db).await?)
            }
            Self::Memory(store) => {
                store.state().execution_logs.push(model.clone());
                Ok(model)
            }
        }
    }

    /// The in-memory backend, if this store uses one.
    pub const fn as_memory(&self) -> Option<&MemoryJobStore> {
        match self {
            Self::Memory(store) => Some(store),
            Self::Database(_) => None,
        }
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    jobs: HashMap<Uuid, job::Model>,
    execution_logs: Vec<execution_log::Model>,
}

/// In-memory job store sharing its state between clones.
#[derive(Clone, Debug, Default)]
pub struct MemoryJobStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryJobStore {
    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn due_jobs(&self, now: NaiveDateTime) -> Vec<job::Model> {
        let mut due: Vec<job::Model> = self
            .state()
            .jobs
            .values()
            .filter(|job| job.is_due(now))
            .cloned()
            .collect();
        due.sort_by_key(|job| job.next_run);
        due
    }

    fn apply_transition(&self, id: Uuid, transition: &Transition) -> bool {
        let mut state = self.state();
        let Some(job) = state.jobs.get_mut(&id) else {
            return false;
        };
        if job.status != JobStatus::Queued {
            return false;
        }
        job.status = transition.status;
        job.retry = transition.retry;
        job.next_run = transition.next_run;
        job.last_run = transition.last_run;
        job.enabled = transition.enabled;
        job.updated_at = chrono::Utc::now().naive_utc();
        true
    }

    pub fn job(&self, id: Uuid) -> Option<job::Model> {
        self.state().jobs.get(&id).cloned()
    }

    pub fn jobs(&self) -> Vec<job::Model> {
        self.state().jobs.values().cloned().collect()
    }

    /// Execution logs in insertion order, optionally for a single job.
    pub fn execution_logs(&self, job_id: Option<Uuid>) -> Vec<execution_log::Model> {
        self.state()
            .execution_logs
            .iter()
            .filter(|entry| job_id.is_none_or(|id| entry.job_id == id))
            .cloned()
            .collect()
    }

    /// Edits a job in place; returns `false` if it does not exist.
    pub fn update(&self, id: Uuid, edit: impl FnOnce(&mut job::Model)) -> bool {
        let mut state = self.state();
        let Some(job) = state.jobs.get_mut(&id) else {
            return false;
        };
        edit(job);
        job.updated_at = chrono::Utc::now().naive_utc();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fixtures::JobFixture;
    use chrono::{Duration, Utc};

    fn transition(status: JobStatus) -> Transition {
        Transition {
            status,
            retry: 0,
            next_run: None,
            last_run: Some(Utc::now().naive_utc()),
            enabled: true,
        }
    }

    #[tokio::test]
    async fn test_due_jobs_filters_and_orders() {
        let store = JobStore::memory();
        let now = Utc::now().naive_utc();

        let older = JobFixture::http("http://a.test")
            .next_run(now - Duration::minutes(5))
            .build();
        let newer = JobFixture::http("http://b.test")
            .next_run(now - Duration::minutes(1))
            .status(JobStatus::Failed)
            .build();
        let future = JobFixture::http("http://c.test")
            .next_run(now + Duration::minutes(1))
            .build();
        let disabled = JobFixture::http("http://d.test")
            .next_run(now - Duration::minutes(1))
            .enabled(false)
            .build();
        let aborted = JobFixture::http("http://e.test")
            .next_run(now - Duration::minutes(1))
            .status(JobStatus::Aborted)
            .build();

        for job in [&newer, &future, &disabled, &older, &aborted] {
            store.insert_job(job.clone()).await.unwrap();
        }

        let due: Vec<Uuid> = store
            .due_jobs(now)
            .await
            .unwrap()
            .into_iter()
            .map(|job| job.id)
            .collect();

        assert_eq!(due, vec![older.id, newer.id]);
    }

    #[tokio::test]
    async fn test_mark_queued_removes_job_from_due_set() {
        let store = JobStore::memory();
        let job = JobFixture::http("http://a.test").due().build();
        store.insert_job(job.clone()).await.unwrap();

        store.mark_queued(job.id).await.unwrap();

        let stored = store.find_job(job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Queued);
        assert!(store
            .due_jobs(Utc::now().naive_utc())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_apply_transition_only_wins_from_queued() {
        let store = JobStore::memory();
        let job = JobFixture::http("http://a.test").queued().build();
        store.insert_job(job.clone()).await.unwrap();

        let first = store
            .apply_transition(job.id, &transition(JobStatus::Pending))
            .await
            .unwrap();
        let second = store
            .apply_transition(job.id, &transition(JobStatus::Failed))
            .await
            .unwrap();

        assert!(first);
        assert!(!second);
        let stored = store.find_job(job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn test_apply_transition_on_missing_job() {
        let store = JobStore::memory();
        let applied = store
            .apply_transition(Uuid::new_v4(), &transition(JobStatus::Pending))
            .await
            .unwrap();

        assert!(!applied);
    }

    #[tokio::test]
    async fn test_execution_logs_are_kept_per_job() {
        let store = JobStore::memory();
        let job_id = Uuid::new_v4();
        let other_id = Uuid::new_v4();

        for id in [job_id, other_id, job_id] {
            store
                .insert_execution_log(NewExecutionLog {
                    job_id: id,
                    status: "200 OK".to_string(),
                    status_code: 200,
                    response: String::new(),
                    run_at: Utc::now().naive_utc(),
                    duration_ms: 3,
                })
                .await
                .unwrap();
        }

        let memory = store.as_memory().unwrap();
        assert_eq!(memory.execution_logs(Some(job_id)).len(), 2);
        assert_eq!(memory.execution_logs(None).len(), 3);
    }
}
