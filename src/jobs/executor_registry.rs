use std::{collections::HashMap, sync::Arc};

use crate::{config::WorkerConfig, database::models::job_type::JobType};

use super::{http_executor::HttpExecutor, JobExecutor};

/// Maps each job type to the executor that runs it.
///
/// Adding a job type means registering an executor; the worker never
/// switches on the type itself.
#[derive(Clone)]
pub struct ExecutorRegistry {
    executors: HashMap<JobType, Arc<dyn JobExecutor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self {
            executors: HashMap::new(),
        }
    }

    /// Registry with every executor that ships with the crate.
    pub fn with_defaults(worker_config: &WorkerConfig) -> Self {
        let mut registry = Self::new();
        registry.register(HttpExecutor::new(worker_config.response_body_limit));
        registry
    }

    /// Registers `executor` for its job type, replacing any previous one.
    pub fn register<E: JobExecutor + 'static>(&mut self, executor: E) {
        self.executors.insert(executor.job_type(), Arc::new(executor));
    }

    pub fn get(&self, job_type: JobType) -> Option<Arc<dyn JobExecutor>> {
        self.executors.get(&job_type).cloned()
    }

    pub fn supports(&self, job_type: JobType) -> bool {
        self.executors.contains_key(&job_type)
    }

    pub fn job_types(&self) -> impl Iterator<Item = &JobType> {
        self.executors.keys()
    }
}

impl Default for ExecutorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        database::models::job,
        jobs::{ExecutionError, ExecutionReport},
    };
    use async_trait::async_trait;

    struct NoopSql;

    #[async_trait]
    impl JobExecutor for NoopSql {
        fn job_type(&self) -> JobType {
            JobType::Sql
        }

        async fn execute(&self, _job: &job::Model) -> Result<ExecutionReport, ExecutionError> {
            Ok(ExecutionReport {
                status: "ok".to_string(),
                status_code: 0,
                response: String::new(),
            })
        }
    }

    #[test]
    fn test_defaults_cover_http_only() {
        let registry = ExecutorRegistry::with_defaults(&WorkerConfig::default());

        assert!(registry.supports(JobType::Http));
        assert!(!registry.supports(JobType::Sql));
        assert!(!registry.supports(JobType::Queue));
        assert_eq!(registry.job_types().count(), 1);
    }

    #[test]
    fn test_registering_adds_a_job_type() {
        let mut registry = ExecutorRegistry::with_defaults(&WorkerConfig::default());
        registry.register(NoopSql);

        assert!(registry.supports(JobType::Sql));
        assert_eq!(registry.get(JobType::Sql).unwrap().job_type(), JobType::Sql);
    }
}
