//! Admission control for concurrent queries
//!
//! At most `max_concurrent` queries run at once and at most `max_queued` more
//! wait for a slot. A request arriving when both are full, or waiting longer
//! than the queue timeout, is rejected as busy.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::AdmissionConfig;
use crate::error::{Error, Result};

/// Bounded concurrency with a bounded wait queue
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    /// Running plus waiting requests
    capacity: Arc<Semaphore>,
    /// Running requests
    workers: Arc<Semaphore>,
    queue_timeout: Duration,
    max_concurrent: usize,
}

/// Held for the duration of an admitted request
#[derive(Debug)]
pub struct AdmissionPermit {
    _worker: OwnedSemaphorePermit,
    _slot: OwnedSemaphorePermit,
}

impl AdmissionGate {
    pub fn new(config: &AdmissionConfig) -> Self {
        let max_concurrent = config.max_concurrent.max(1);
        Self {
            capacity: Arc::new(Semaphore::new(max_concurrent + config.max_queued)),
            workers: Arc::new(Semaphore::new(max_concurrent)),
            queue_timeout: Duration::from_millis(config.queue_timeout_ms),
            max_concurrent,
        }
    }

    /// Wait for a slot, or fail fast when the queue is full
    pub async fn admit(&self) -> Result<AdmissionPermit> {
        let slot = Arc::clone(&self.capacity)
            .try_acquire_owned()
            .map_err(|_| {
                tracing::warn!("Rejecting query: admission queue is full");
                Error::Busy("too many queries in flight".to_string())
            })?;

        let worker = tokio::time::timeout(
            self.queue_timeout,
            Arc::clone(&self.workers).acquire_owned(),
        )
        .await
        .map_err(|_| {
            tracing::warn!("Rejecting query: waited {:?} for a slot", self.queue_timeout);
            Error::Busy(format!(
                "no query slot became free within {}ms",
                self.queue_timeout.as_millis()
            ))
        })?
        .map_err(|_| Error::internal("admission gate closed"))?;

        Ok(AdmissionPermit {
            _worker: worker,
            _slot: slot,
        })
    }

    /// Queries currently running
    pub fn in_flight(&self) -> usize {
        self.max_concurrent - self.workers.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate(max_concurrent: usize, max_queued: usize, queue_timeout_ms: u64) -> AdmissionGate {
        AdmissionGate::new(&AdmissionConfig {
            max_concurrent,
            max_queued,
            queue_timeout_ms,
        })
    }

    #[tokio::test]
    async fn test_rejects_beyond_capacity() {
        let gate = gate(1, 1, 5_000);
        let running = gate.admit().await.unwrap();
        assert_eq!(gate.in_flight(), 1);

        let queued = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.admit().await })
        };
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(matches!(gate.admit().await, Err(Error::Busy(_))));

        drop(running);
        assert!(queued.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_queue_timeout() {
        let gate = gate(1, 4, 20);
        let _running = gate.admit().await.unwrap();

        let err = gate.admit().await.unwrap_err();
        assert!(matches!(err, Error::Busy(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_permit_release_frees_slot() {
        let gate = gate(2, 0, 10);
        let a = gate.admit().await.unwrap();
        let _b = gate.admit().await.unwrap();
        assert!(gate.admit().await.is_err());

        drop(a);
        assert!(gate.admit().await.is_ok());
    }
}
