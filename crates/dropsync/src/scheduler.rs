//! Rate-limited request scheduler shared by all shops.
//!
//! The remote service enforces one rate ceiling per API credential, so a
//! single scheduler instance is shared process-wide: every outbound call
//! from every shop's sync run goes through [`RequestScheduler::submit`].
//! Admission control releases operations no faster than the configured
//! rate with a bounded number in flight; transient failures are retried
//! with backoff inside the scheduler so callers only ever see success,
//! a permanent failure, or an exhausted retry budget.

use std::future::Future;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use tokio::sync::Semaphore;

use crate::remote::RemoteError;

/// Type alias for the governor rate limiter.
type GovernorRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Default request rate ceiling (requests per second). The remote API
/// allows 2/s per credential; we stay just under it.
pub const DEFAULT_REQUESTS_PER_SECOND: f64 = 1.8;

/// Default bound on concurrently executing operations.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 2;

/// Maximum retries beyond the first attempt for one operation.
pub const MAX_FETCH_RETRIES: u32 = 5;

/// Initial backoff delay in milliseconds.
pub const INITIAL_BACKOFF_MS: u64 = 1_000;

/// Maximum backoff delay in milliseconds.
pub const MAX_BACKOFF_MS: u64 = 60_000;

/// Upper bound on random jitter, as a fraction of the computed delay.
pub const MAX_JITTER_FRACTION: f64 = 0.3;

/// Configuration for the request scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Maximum sustained request rate.
    pub requests_per_second: f64,
    /// Maximum operations executing simultaneously.
    pub max_in_flight: usize,
    /// Maximum retries beyond the first attempt.
    pub max_retries: u32,
    /// First backoff delay; doubles per attempt.
    pub initial_backoff: Duration,
    /// Backoff ceiling.
    pub max_backoff: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            requests_per_second: DEFAULT_REQUESTS_PER_SECOND,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            max_retries: MAX_FETCH_RETRIES,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
            max_backoff: Duration::from_millis(MAX_BACKOFF_MS),
        }
    }
}

/// Process-wide admission control and retry wrapper for remote calls.
///
/// Cloning is cheap and shares the underlying limiter and slots, so one
/// instance can be handed to every component that talks to the remote API.
///
/// # Example
///
/// ```ignore
/// use dropsync::scheduler::{RequestScheduler, SchedulerConfig};
///
/// let scheduler = RequestScheduler::new(SchedulerConfig::default());
/// let page = scheduler.submit(|| client.fetch_page(request.clone())).await?;
/// ```
#[derive(Clone)]
pub struct RequestScheduler {
    limiter: Arc<GovernorRateLimiter>,
    slots: Arc<Semaphore>,
    config: Arc<SchedulerConfig>,
}

impl RequestScheduler {
    /// Create a scheduler enforcing the given ceilings.
    ///
    /// A non-positive or non-finite rate falls back to 1 request/second;
    /// a zero in-flight bound falls back to 1. Bursts are disabled so the
    /// ceiling holds over any window, not just on average.
    pub fn new(config: SchedulerConfig) -> Self {
        let rps = if config.requests_per_second.is_finite() && config.requests_per_second > 0.0 {
            config.requests_per_second
        } else {
            1.0
        };
        let quota = Quota::with_period(Duration::from_secs_f64(1.0 / rps))
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
            .allow_burst(NonZeroU32::MIN);

        let slots = config.max_in_flight.max(1);

        Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
            slots: Arc::new(Semaphore::new(slots)),
            config: Arc::new(config),
        }
    }

    /// Create a scheduler with the default configuration.
    pub fn with_defaults() -> Self {
        Self::new(SchedulerConfig::default())
    }

    /// Run one remote operation under admission control.
    ///
    /// The operation waits for an execution slot (FIFO) and for the rate
    /// gate before every attempt - a retry is still an outbound call.
    /// Retryable failures back off and retry up to the configured budget:
    /// a rate-limit rejection carrying a server-suggested wait honors that
    /// wait exactly, everything else uses exponential backoff with jitter.
    /// Non-retryable failures and exhausted budgets surface the last
    /// observed error.
    pub async fn submit<T, F, Fut>(&self, mut operation: F) -> Result<T, RemoteError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let _permit = match self.slots.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                return Err(RemoteError::permanent("request scheduler is shut down"));
            }
        };

        let mut attempt = 0u32;
        let mut next_backoff = self.config.initial_backoff;

        loop {
            self.limiter.until_ready().await;

            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;

                    let wait = match &err {
                        RemoteError::RateLimited {
                            retry_after: Some(wait),
                        } => *wait,
                        _ => {
                            let base = next_backoff.min(self.config.max_backoff);
                            next_backoff = (base * 2).min(self.config.max_backoff);
                            jittered(base)
                        }
                    };

                    tracing::debug!(
                        attempt,
                        max_retries = self.config.max_retries,
                        wait_ms = wait.as_millis() as u64,
                        error = %err,
                        "remote call failed transiently, backing off"
                    );

                    tokio::time::sleep(wait).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Add up to [`MAX_JITTER_FRACTION`] of random jitter to a delay.
fn jittered(delay: Duration) -> Duration {
    delay + delay.mul_f64(rand::random::<f64>() * MAX_JITTER_FRACTION)
}
