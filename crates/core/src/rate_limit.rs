//! Outbound rate limiter for calls to the text-generation service.
//!
//! Two limits apply together: at most `max_concurrency` calls in flight,
//! and at most `requests_per_minute` calls started in any trailing
//! 60-second window. The limiter is an owned value; share it with `Arc`.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::{sleep_until, Instant};

const WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug)]
pub struct RateLimiter {
    semaphore: Arc<Semaphore>,
    started: Mutex<VecDeque<Instant>>,
    requests_per_minute: usize,
}

/// Held for the duration of one call. Dropping it frees the concurrency slot.
#[derive(Debug)]
pub struct RateLimitPermit {
    _permit: OwnedSemaphorePermit,
}

impl RateLimiter {
    /// Both limits are raised to at least 1.
    pub fn new(requests_per_minute: usize, max_concurrency: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrency.max(1))),
            started: Mutex::new(VecDeque::new()),
            requests_per_minute: requests_per_minute.max(1),
        }
    }

    /// Wait until both limits allow another call.
    pub async fn acquire(&self) -> RateLimitPermit {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .expect("rate limiter semaphore is owned by the limiter and never closed");

        loop {
            let wait_until = {
                let mut started = self.started.lock().await;
                let now = Instant::now();
                while started.front().is_some_and(|t| now.duration_since(*t) >= WINDOW) {
                    started.pop_front();
                }
                if started.len() < self.requests_per_minute {
                    started.push_back(now);
                    None
                } else {
                    started.front().map(|oldest| *oldest + WINDOW)
                }
            };

            match wait_until {
                None => break,
                Some(deadline) => {
                    tracing::debug!(
                        wait_ms = deadline.saturating_duration_since(Instant::now()).as_millis() as u64,
                        "Generation rate limit reached, waiting",
                    );
                    sleep_until(deadline).await;
                }
            }
        }

        RateLimitPermit { _permit: permit }
    }

    /// Return a permit early. Equivalent to dropping it.
    pub fn release(&self, permit: RateLimitPermit) {
        drop(permit);
    }

    /// Concurrency slots currently free.
    pub fn available_slots(&self) -> usize {
        self.semaphore.available_permits()
    }
}
