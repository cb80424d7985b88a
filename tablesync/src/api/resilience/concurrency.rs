//! Concurrency limiter implementation
//!
//! Provides a semaphore-based limiter for bounding concurrent batch requests
//! issued by one sync run against the store.

use super::config::ConcurrencyConfig;
use log::debug;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

/// Semaphore-based concurrency limiter for store requests
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    config: ConcurrencyConfig,
}

impl ConcurrencyLimiter {
    /// Create a new concurrency limiter with the given configuration
    pub fn new(config: ConcurrencyConfig) -> Self {
        let permits = if config.enabled {
            config.max_concurrent_requests.max(1)
        } else {
            // Use a large but valid number when disabled (Tokio Semaphore max is 2^61-1)
            1_000_000
        };

        Self {
            semaphore: Arc::new(Semaphore::new(permits)),
            config,
        }
    }

    /// Acquire a permit for making a request. Waits if at capacity.
    /// Returns an owned permit that releases automatically when dropped.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, AcquireError> {
        if !self.config.enabled {
            return self.semaphore.clone().acquire_owned().await;
        }

        if self.semaphore.available_permits() == 0 {
            debug!(
                "Concurrency limiter: waiting for permit ({} in use)",
                self.config.max_concurrent_requests
            );
        }

        let permit = self.semaphore.clone().acquire_owned().await?;

        debug!(
            "Concurrency limiter: acquired permit ({}/{} in use)",
            self.in_use(),
            self.config.max_concurrent_requests
        );

        Ok(permit)
    }

    /// Run a future while holding a permit
    pub async fn run<F, T>(&self, fut: F) -> Result<T, AcquireError>
    where
        F: Future<Output = T>,
    {
        let _permit = self.acquire().await?;
        Ok(fut.await)
    }

    fn in_use(&self) -> usize {
        self.config
            .max_concurrent_requests
            .saturating_sub(self.semaphore.available_permits())
    }
}

impl Default for ConcurrencyLimiter {
    fn default() -> Self {
        Self::new(ConcurrencyConfig::default())
    }
}
