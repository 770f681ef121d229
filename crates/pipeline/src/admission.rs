//! Admission control in front of the engine.
//!
//! Engine runs are expensive and contend for the same GPU and model cache,
//! so at most `capacity` run at once. Extra requests wait for a slot, or,
//! with a wait timeout configured, fail with [`JobError::Busy`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::JobError;

/// Bounded pool of engine slots.
#[derive(Debug, Clone)]
pub struct Admission {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    wait_timeout: Option<Duration>,
}

impl Admission {
    /// A pool of `max_concurrent` slots (at least one).
    pub fn new(max_concurrent: usize, wait_timeout: Option<Duration>) -> Self {
        let capacity = max_concurrent.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            wait_timeout,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots free right now.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Wait for a slot. The slot is released when the permit drops.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, JobError> {
        let start = Instant::now();
        let acquire = Arc::clone(&self.semaphore).acquire_owned();

        let permit = match self.wait_timeout {
            None => acquire.await.ok(),
            Some(limit) => tokio::time::timeout(limit, acquire).await.ok().and_then(Result::ok),
        };

        let waited_ms = start.elapsed().as_millis() as u64;
        match permit {
            Some(permit) => {
                if waited_ms > 0 {
                    tracing::debug!(waited_ms, "Engine slot acquired");
                }
                Ok(permit)
            }
            None => {
                tracing::warn!(waited_ms, capacity = self.capacity, "No engine slot available");
                Err(JobError::Busy { waited_ms })
            }
        }
    }
}
