//! Concurrent load generator
//!
//! Launches every insert at once on a `JoinSet` and waits for all of them.
//! Individual backend refusals are counted rather than ignored, since a
//! partially failed batch never converges to the expected row count.

use std::sync::Arc;
use std::time::Duration;

use lagbench_client::Value;
use serde::Serialize;
use tokio::task::JoinSet;

use crate::error::{BenchError, BenchResult};
use crate::executor::Executor;
use crate::result::{ErrorDescriptor, OperationResult};
use crate::timer::{as_secs, PhaseTimer};

/// What a finished batch looked like.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadOutcome {
    #[serde(serialize_with = "as_secs")]
    pub duration: Duration,
    pub succeeded: usize,
    pub failed: usize,
    pub first_error: Option<ErrorDescriptor>,
}

impl LoadOutcome {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn ops_per_sec(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.total() as f64 / secs
        } else {
            0.0
        }
    }
}

/// Execute `statement` `record_count` times concurrently, with the
/// parameters for invocation `i` produced by `value_fn(i)`.
///
/// A fatal executor error or a panicked task fails the whole batch; the
/// tasks still in flight are aborted when the set is dropped.
pub async fn run_load<F>(
    executor: &Executor,
    statement: &str,
    record_count: usize,
    value_fn: F,
) -> BenchResult<LoadOutcome>
where
    F: Fn(usize) -> Vec<Value>,
{
    let statement: Arc<str> = Arc::from(statement);
    let timer = PhaseTimer::start(format!("Executing {} tasks in parallel", record_count));

    let mut set = JoinSet::new();
    for i in 0..record_count {
        let executor = executor.clone();
        let statement = Arc::clone(&statement);
        let params = value_fn(i);
        set.spawn(async move { executor.execute(&statement, params).await });
    }

    let mut succeeded = 0;
    let mut failed = 0;
    let mut first_error = None;

    while let Some(joined) = set.join_next().await {
        let result = joined.map_err(|e| BenchError::Task(e.to_string()))??;
        match result {
            OperationResult::Success(_) => succeeded += 1,
            OperationResult::Failure(err) => {
                failed += 1;
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }
    }

    let outcome = LoadOutcome {
        duration: timer.duration(),
        succeeded,
        failed,
        first_error,
    };

    if outcome.failed > 0 {
        tracing::warn!(
            "{} of {} operations were refused by the backend (first: {})",
            outcome.failed,
            record_count,
            outcome
                .first_error
                .as_ref()
                .map(|e| e.message.as_str())
                .unwrap_or("unknown")
        );
    }

    Ok(outcome)
}
