use tracing::info;

use crate::{
    boot::BootError,
    config::Config,
    database::setup_database,
    job_store::JobStore,
    jobs::{
        executor_registry::ExecutorRegistry, job_supervisor::JobSupervisor, scheduler::Scheduler,
        worker::Worker,
    },
    work_queue::WorkQueue,
};

/// Which loops this process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    All { count: u32 },
    Scheduler,
    Workers { count: u32 },
}

impl Role {
    const fn runs_scheduler(self) -> bool {
        matches!(self, Self::All { .. } | Self::Scheduler)
    }

    const fn worker_count(self) -> u32 {
        match self {
            Self::All { count } | Self::Workers { count } => count,
            Self::Scheduler => 0,
        }
    }
}

pub async fn handle_serve_command(config: Config, role: Role) -> Result<(), BootError> {
    let db = setup_database(&config.database).await?;
    let store = JobStore::database(db);
    let supervisor = JobSupervisor::new();

    if role.runs_scheduler() {
        let queue = WorkQueue::connect(&config.queue).await?;
        supervisor.spawn_scheduler(Scheduler::new(
            store.clone(),
            queue,
            config.scheduler.clone(),
        ));
    }

    let worker_count = role.worker_count();
    if worker_count > 0 {
        let executors = ExecutorRegistry::with_defaults(&config.worker);
        info!(
            "🚀 Starting {} worker(s) for job types {:?}",
            worker_count,
            executors.job_types().collect::<Vec<_>>()
        );

        for worker_id in 0..worker_count {
            // BRPOP holds its connection, so each worker gets its own
            let queue = WorkQueue::connect(&config.queue).await?;
            supervisor.spawn_worker(Worker::new(
                format!("worker-{worker_id}"),
                store.clone(),
                queue,
                executors.clone(),
                config.worker.clone(),
            ));
        }
    }

    supervisor.wait_for_shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles() {
        assert!(Role::All { count: 2 }.runs_scheduler());
        assert_eq!(Role::All { count: 2 }.worker_count(), 2);
        assert!(Role::Scheduler.runs_scheduler());
        assert_eq!(Role::Scheduler.worker_count(), 0);
        assert!(!Role::Workers { count: 3 }.runs_scheduler());
        assert_eq!(Role::Workers { count: 3 }.worker_count(), 3);
    }
}
