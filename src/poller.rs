//! Consistency poller
//!
//! Repeats a read until the value extracted from its result equals what the
//! caller expects. Between attempts it sleeps a fixed interval; by default
//! it never gives up.

use std::fmt::Debug;
use std::time::Duration;

use serde::Serialize;

use crate::error::{BenchError, BenchResult};
use crate::executor::Executor;
use crate::result::OperationResult;
use crate::timer::as_secs;

/// How often to poll and when to stop trying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Option<Duration>,
    pub max_attempts: Option<u32>,
}

impl PollPolicy {
    /// Poll every `interval`, forever.
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            timeout: None,
            max_attempts: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn is_bounded(&self) -> bool {
        self.timeout.is_some() || self.max_attempts.is_some()
    }

    fn exhausted(&self, attempts: u32, waited: Duration) -> bool {
        if let Some(max) = self.max_attempts {
            if attempts >= max {
                return true;
            }
        }
        match self.timeout {
            // Would the next sleep carry us past the deadline?
            Some(timeout) => waited + self.interval > timeout,
            None => false,
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::every(Duration::from_secs(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PollOutcome {
    #[serde(serialize_with = "as_secs")]
    pub duration: Duration,
    pub attempts: u32,
}

impl PollOutcome {
    /// Attempts beyond the first one.
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

/// Issue `query` until `extract(result) == Some(expected)`.
///
/// A `None` from `extract`, for example because the read failed while the
/// table is not visible yet, counts as a mismatch. Fatal executor errors end
/// the loop immediately.
pub async fn poll_until<T, F>(
    executor: &Executor,
    query: &str,
    extract: F,
    expected: T,
    policy: PollPolicy,
) -> BenchResult<PollOutcome>
where
    T: PartialEq + Debug,
    F: Fn(&OperationResult) -> Option<T>,
{
    let started = tokio::time::Instant::now();
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;
        let result = executor.execute(query, Vec::new()).await?;
        let observed = extract(&result);

        if observed.as_ref() == Some(&expected) {
            let outcome = PollOutcome {
                duration: started.elapsed(),
                attempts,
            };
            tracing::debug!(
                "'{}' converged to {:?} after {} attempt(s)",
                query,
                expected,
                attempts
            );
            return Ok(outcome);
        }

        let waited = started.elapsed();
        if policy.exhausted(attempts, waited) {
            return Err(BenchError::ConvergenceTimeout {
                query: query.to_string(),
                expected: format!("{:?}", expected),
                last_observed: describe(&result, observed.as_ref()),
                attempts,
                waited,
            });
        }

        tracing::debug!(
            "'{}' returned {}, expected {:?}; retrying in {:?}",
            query,
            describe(&result, observed.as_ref()),
            expected,
            policy.interval
        );
        tokio::time::sleep(policy.interval).await;
    }
}

fn describe<T: Debug>(result: &OperationResult, observed: Option<&T>) -> String {
    match (observed, result.error()) {
        (Some(value), _) => format!("{:?}", value),
        (None, Some(err)) => format!("error '{}'", err.message),
        (None, None) => "no value".to_string(),
    }
}
