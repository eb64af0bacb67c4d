//! Global limits on synthesis calls.
//!
//! One throttle is shared by every subject of a run so that the summarization
//! service sees at most `max_parallel` calls in flight, spaced at least
//! `cooldown` apart.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use tokio::sync::{Semaphore, SemaphorePermit};

use crate::error::{WorkerError, WorkerResult};

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

pub struct SynthesisThrottle {
    permits: Semaphore,
    max_parallel: usize,
    limiter: Option<DirectLimiter>,
}

impl std::fmt::Debug for SynthesisThrottle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthesisThrottle")
            .field("max_parallel", &self.max_parallel)
            .field("cooldown", &self.limiter.is_some())
            .finish()
    }
}

impl SynthesisThrottle {
    /// `max_parallel` is clamped to at least one. A zero cooldown disables spacing.
    pub fn new(max_parallel: usize, cooldown: Duration) -> Self {
        let max_parallel = max_parallel.max(1);
        let limiter = Quota::with_period(cooldown)
            .map(|quota| RateLimiter::direct(quota.allow_burst(NonZeroU32::MIN)));

        Self {
            permits: Semaphore::new(max_parallel),
            max_parallel,
            limiter,
        }
    }

    /// No spacing, one call at a time.
    pub fn sequential() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn max_parallel(&self) -> usize {
        self.max_parallel
    }

    /// Wait for a slot. The call may be issued while the permit is held.
    pub async fn acquire(&self) -> WorkerResult<SemaphorePermit<'_>> {
        let permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| WorkerError::ThrottleClosed(e.to_string()))?;

        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }

        Ok(permit)
    }
}
