//! Retry wrapper for remote calls.
//!
//! Every remote operation goes through [`RetryingClient::invoke`], which
//! classifies failures (see [`EnrichmentError::class`]) and decides whether to
//! wait and try again or give up:
//!
//! | class        | action                              |
//! |--------------|-------------------------------------|
//! | RateLimited  | sleep `interval`, retry             |
//! | TransientIo  | sleep `interval`, retry             |
//! | NotFound     | stop, [`RetryOutcome::NotFound`]    |
//! | Fatal        | stop, [`RetryOutcome::Fatal`]       |
//!
//! When the attempt budget runs out the outcome is
//! [`RetryOutcome::ExhaustedRetries`], which [`RetryOutcome::into_result`]
//! turns into an error so callers can't mistake it for "no match".

use std::future::Future;
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::enrichment::domain::{EnrichmentError, ErrorClass};

/// Attempts per remote operation.
pub const RETRIES: u32 = 10;

/// Wait between attempts after a rate limit or I/O failure.
pub const RETRY_INTERVAL: Duration = Duration::from_secs(10);

/// How many times to try and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub interval: Duration,
}

impl RetryPolicy {
    /// Policy with the given budget. At least one attempt is always made.
    pub fn new(retries: u32, interval: Duration) -> Self {
        Self {
            retries: retries.max(1),
            interval,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RETRIES, RETRY_INTERVAL)
    }
}

/// Final result of a retried operation.
#[derive(Debug)]
pub enum RetryOutcome<T> {
    Success(T),
    NotFound,
    Fatal(EnrichmentError),
    ExhaustedRetries { attempts: u32 },
}

impl<T> RetryOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Collapse into a `Result`: not-found becomes `Ok(None)`, exhaustion and
    /// fatal failures become errors.
    pub fn into_result(self, operation: &str) -> Result<Option<T>, EnrichmentError> {
        match self {
            Self::Success(value) => Ok(Some(value)),
            Self::NotFound => Ok(None),
            Self::Fatal(e) => Err(e),
            Self::ExhaustedRetries { attempts } => Err(EnrichmentError::ExhaustedRetries {
                operation: operation.to_string(),
                attempts,
            }),
        }
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Retry,
    Stop(ErrorClass),
    GiveUp,
}

fn next_step(class: ErrorClass, attempt: u32, retries: u32) -> Step {
    match class {
        ErrorClass::NotFound | ErrorClass::Fatal => Step::Stop(class),
        ErrorClass::RateLimited | ErrorClass::TransientIo if attempt >= retries => Step::GiveUp,
        ErrorClass::RateLimited | ErrorClass::TransientIo => Step::Retry,
    }
}

/// Runs remote operations under a [`RetryPolicy`].
#[derive(Debug, Clone, Default)]
pub struct RetryingClient {
    policy: RetryPolicy,
}

impl RetryingClient {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Call `op` until it succeeds, hits a terminal error, or the budget is
    /// spent. `operation` names the call in log lines.
    pub async fn invoke<T, F, Fut>(&self, operation: &str, mut op: F) -> RetryOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, EnrichmentError>>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;

            let err = match op().await {
                Ok(value) => return RetryOutcome::Success(value),
                Err(e) => e,
            };

            let class = err.class();
            match next_step(class, attempt, self.policy.retries) {
                Step::Stop(ErrorClass::NotFound) => {
                    debug!("echonest: {}: {}", operation, err);
                    return RetryOutcome::NotFound;
                }
                Step::Stop(_) => {
                    error!("echonest: {}: {}", operation, err);
                    return RetryOutcome::Fatal(err);
                }
                Step::GiveUp => {
                    warn!(
                        "echonest: {}: giving up after {} attempts: {}",
                        operation, attempt, err
                    );
                    return RetryOutcome::ExhaustedRetries { attempts: attempt };
                }
                Step::Retry => {
                    if class == ErrorClass::RateLimited {
                        warn!(
                            "echonest: {}: rate limited, retrying in {:?} ({}/{})",
                            operation, self.policy.interval, attempt, self.policy.retries
                        );
                    } else {
                        warn!(
                            "echonest: {}: IO error: {}, retrying in {:?} ({}/{})",
                            operation, err, self.policy.interval, attempt, self.policy.retries
                        );
                    }
                    tokio::time::sleep(self.policy.interval).await;
                }
            }
        }
    }
}
