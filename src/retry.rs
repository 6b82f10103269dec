//! Retry utilities with exponential backoff and jitter.
//!
//! Two flavours share one backoff schedule:
//!
//! - [`retry_with_backoff`] retries any failure, for startup calls such as
//!   CRD installation.
//! - [`retry_on_conflict`] retries only optimistic concurrency conflicts and
//!   turns an exhausted budget into [`Error::ConflictRetriesExhausted`]. It is
//!   the wrapper around every create-or-update of cluster resources.
//!
//! # Example
//!
//! ```ignore
//! use etcd_operator::retry::{retry_on_conflict, RetryConfig};
//!
//! let result = retry_on_conflict(&RetryConfig::conflict(), "StatefulSet", "demo", || async {
//!     create_or_update(&api, skeleton.clone(), |sts| mutate_statefulset(&cluster, sts)).await
//! })
//! .await?;
//! ```

use std::time::Duration;

use rand::Rng;
use tracing::{error, warn};

use crate::Error;

/// Configuration for operations that may fail transiently.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Maximum number of attempts (0 = infinite)
    pub max_attempts: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 0, // infinite
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Create a config with a maximum number of attempts
    pub fn with_max_attempts(attempts: u32) -> Self {
        Self {
            max_attempts: attempts,
            ..Default::default()
        }
    }

    /// Budget for re-fetch-and-retry on version conflicts.
    ///
    /// Conflicts clear as soon as the competing write lands, so the delays
    /// are short and the budget is small.
    pub fn conflict() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
        }
    }

    /// Whether `attempt` (1-based) used up the budget
    fn exhausted(&self, attempt: u32) -> bool {
        self.max_attempts > 0 && attempt >= self.max_attempts
    }
}

/// Exponential delay schedule with 0.5x-1.5x jitter, capped at `max_delay`
struct Backoff<'a> {
    config: &'a RetryConfig,
    delay: Duration,
}

impl<'a> Backoff<'a> {
    fn new(config: &'a RetryConfig) -> Self {
        Self {
            config,
            delay: config.initial_delay,
        }
    }

    /// Jittered delay for the current step; advances the schedule
    fn next_delay(&mut self) -> Duration {
        let jitter = rand::thread_rng().gen_range(0.5..1.5);
        let jittered = Duration::from_secs_f64(self.delay.as_secs_f64() * jitter);

        self.delay = Duration::from_secs_f64(
            (self.delay.as_secs_f64() * self.config.backoff_multiplier)
                .min(self.config.max_delay.as_secs_f64()),
        );

        jittered
    }
}

/// Execute an async operation with exponential backoff and jitter.
///
/// Retries indefinitely (or up to max_attempts if set) until success.
///
/// # Arguments
/// * `config` - Retry configuration
/// * `operation_name` - Name for logging purposes
/// * `operation` - The async operation to retry
///
/// # Returns
/// The result of the operation, or the last error if max_attempts is exhausted.
pub async fn retry_with_backoff<F, Fut, T, E>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0u32;
    let mut backoff = Backoff::new(config);

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if config.exhausted(attempt) {
                    error!(
                        operation = %operation_name,
                        attempt = attempt,
                        error = %e,
                        "Operation failed after max retries"
                    );
                    return Err(e);
                }

                let delay = backoff.next_delay();
                warn!(
                    operation = %operation_name,
                    attempt = attempt,
                    error = %e,
                    delay_ms = delay.as_millis(),
                    "Operation failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Re-run a read-mutate-write cycle while it loses optimistic concurrency races.
///
/// Each attempt must fetch the object afresh, so the closure is invoked anew
/// rather than replaying a stale write. Errors other than a version conflict
/// are returned immediately. When every attempt conflicts, the result is
/// [`Error::ConflictRetriesExhausted`] naming `kind`/`name`.
///
/// A `max_attempts` of 0 is treated as a single attempt: conflict retries are
/// always bounded.
pub async fn retry_on_conflict<F, Fut, T>(
    config: &RetryConfig,
    kind: &str,
    name: &str,
    mut operation: F,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, Error>>,
{
    let budget = config.max_attempts.max(1);
    let mut backoff = Backoff::new(config);

    for attempt in 1..=budget {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_conflict() => {
                if attempt == budget {
                    break;
                }
                let delay = backoff.next_delay();
                warn!(
                    kind = %kind,
                    name = %name,
                    attempt = attempt,
                    delay_ms = delay.as_millis(),
                    "Version conflict, re-fetching and retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }

    error!(kind = %kind, name = %name, attempts = budget, "Conflict retry budget exhausted");
    Err(Error::ConflictRetriesExhausted {
        kind: kind.to_string(),
        name: name.to_string(),
        attempts: budget,
    })
}
