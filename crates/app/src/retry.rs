//! Bounded polling with backoff.
//!
//! Used wherever a spawned process must appear in the naming service: the
//! wait is bounded and ends with [`TimeoutError`].

use std::time::Duration;

use ossie_domain::error::{OssieError, TimeoutError};
use tokio::time::Instant;

/// Budget of a polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub timeout: Duration,
    pub initial_interval: Duration,
    pub max_interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            initial_interval: Duration::from_millis(10),
            max_interval: Duration::from_millis(500),
        }
    }
}

/// Call `probe` until it yields a value, sleeping between attempts with a
/// doubling interval capped at `max_interval`.
///
/// # Errors
///
/// Returns [`OssieError::Timeout`] once `policy.timeout` has elapsed, or the
/// first error returned by `probe`.
pub async fn poll_until<T, F>(policy: &PollPolicy, what: &str, mut probe: F) -> Result<T, OssieError>
where
    F: FnMut() -> Result<Option<T>, OssieError>,
{
    let started = Instant::now();
    let mut interval = policy.initial_interval;
    loop {
        if let Some(value) = probe()? {
            return Ok(value);
        }
        let elapsed = started.elapsed();
        if elapsed >= policy.timeout {
            return Err(TimeoutError {
                what: what.to_string(),
                waited: elapsed,
            }
            .into());
        }
        let remaining = policy.timeout.saturating_sub(elapsed);
        tokio::time::sleep(interval.min(remaining)).await;
        interval = (interval * 2).min(policy.max_interval);
    }
}
