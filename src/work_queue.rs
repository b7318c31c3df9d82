use std::{
    collections::{HashSet, VecDeque},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use redis::aio::MultiplexedConnection;
use thiserror::Error;
use tokio::sync::Notify;
use tracing::debug;
use uuid::Uuid;

use crate::config::QueueConfig;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("job id cannot be empty")]
    EmptyJobId,
    #[error("queue rejected job {0}")]
    Rejected(String),
}

/// FIFO hand-off of due job ids from the scheduler to the workers.
///
/// Items are bare job id strings; there is no envelope, priority or
/// redelivery. An id popped by a worker that dies before finishing is gone.
#[derive(Clone, Debug)]
pub enum WorkQueue {
    /// Redis list: LPUSH on enqueue, BRPOP on dequeue
    Redis(RedisQueue),
    /// In-process queue shared between clones
    Memory(MemoryQueue),
}

impl WorkQueue {
    /// Opens a dedicated Redis connection for this handle.
    ///
    /// Blocking pops hold the connection, so every worker should own one.
    pub async fn connect(config: &QueueConfig) -> Result<Self, QueueError> {
        Ok(Self::Redis(RedisQueue::connect(&config.url, &config.name).await?))
    }

    pub fn memory() -> Self {
        Self::Memory(MemoryQueue::default())
    }

    pub async fn enqueue(&self, job_id: Uuid) -> Result<(), QueueError> {
        self.enqueue_raw(&job_id.to_string()).await
    }

    /// Pushes an arbitrary id string onto the tail of the queue.
    pub async fn enqueue_raw(&self, job_id: &str) -> Result<(), QueueError> {
        if job_id.is_empty() {
            return Err(QueueError::EmptyJobId);
        }
        match self {
            Self::Redis(queue) => queue.push(job_id).await,
            Self::Memory(queue) => queue.push(job_id).await,
        }
    }

    /// Waits until an id is available and removes it from the head.
    pub async fn dequeue(&self) -> Result<String, QueueError> {
        match self {
            Self::Redis(queue) => queue.pop().await,
            Self::Memory(queue) => Ok(queue.pop().await),
        }
    }

    /// The in-memory backend, if this queue uses one.
    pub const fn as_memory(&self) -> Option<&MemoryQueue> {
        match self {
            Self::Memory(queue) => Some(queue),
            Self::Redis(_) => None,
        }
    }
}

#[derive(Clone)]
pub struct RedisQueue {
    connection: MultiplexedConnection,
    name: String,
}

impl std::fmt::Debug for RedisQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisQueue")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl RedisQueue {
    pub async fn connect(url: &str, name: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(url)?;
        let mut connection = client.get_multiplexed_async_connection().await?;

        let pong: String = redis::cmd("PING").query_async(&mut connection).await?;
        debug!("Connected to redis queue '{}': {}", name, pong);

        Ok(Self {
            connection,
            name: name.to_string(),
        })
    }

    async fn push(&self, job_id: &str) -> Result<(), QueueError> {
        let mut connection = self.connection.clone();
        let _length: i64 = redis::cmd("LPUSH")
            .arg(&self.name)
            .arg(job_id)
            .query_async(&mut connection)
            .await?;
        Ok(())
    }

    async fn pop(&self) -> Result<String, QueueError> {
        let mut connection = self.connection.clone();
        loop {
            // A zero timeout blocks until an item arrives
            let popped: Option<(String, String)> = redis::cmd("BRPOP")
                .arg(&self.name)
                .arg(0)
                .query_async(&mut connection)
                .await?;
            if let Some((_list, job_id)) = popped {
                return Ok(job_id);
            }
        }
    }
}

#[derive(Debug, Default)]
struct MemoryQueueInner {
    items: Mutex<VecDeque<String>>,
    available: Notify,
    faults: Mutex<Faults>,
}

/// Broker misbehaviour injected by tests.
#[derive(Debug, Default)]
struct Faults {
    push_delay: Duration,
    rejected: HashSet<String>,
}

#[derive(Clone, Debug, Default)]
pub struct MemoryQueue {
    inner: Arc<MemoryQueueInner>,
}

impl MemoryQueue {
    fn items(&self) -> MutexGuard<'_, VecDeque<String>> {
        self.inner.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn faults(&self) -> MutexGuard<'_, Faults> {
        self.inner.faults.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn push(&self, job_id: &str) -> Result<(), QueueError> {
        let (delay, rejected) = {
            let faults = self.faults();
            (faults.push_delay, faults.rejected.contains(job_id))
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if rejected {
            return Err(QueueError::Rejected(job_id.to_string()));
        }

        self.items().push_back(job_id.to_string());
        self.inner.available.notify_one();
        Ok(())
    }

    /// Makes every push take `delay` before it lands, like a slow broker.
    pub fn set_push_delay(&self, delay: Duration) {
        self.faults().push_delay = delay;
    }

    /// Makes pushes of `job_id` fail.
    pub fn reject(&self, job_id: Uuid) {
        self.faults().rejected.insert(job_id.to_string());
    }

    async fn pop(&self) -> String {
        loop {
            let notified = self.inner.available.notified();
            if let Some(job_id) = self.try_pop() {
                return job_id;
            }
            notified.await;
        }
    }

    /// Removes the head without waiting.
    pub fn try_pop(&self) -> Option<String> {
        self.items().pop_front()
    }

    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    /// Queued ids from head to tail.
    pub fn snapshot(&self) -> Vec<String> {
        self.items().iter().cloned().collect()
    }
}
