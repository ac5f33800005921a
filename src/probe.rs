//! Read-after-write probe
//!
//! Inserts a single row and reads it straight back. A local file always
//! shows the row; a replicated server often does not yet.

use lagbench_client::Value;
use serde::Serialize;

use crate::config::BenchConfig;
use crate::error::{BenchError, BenchResult};
use crate::executor::Executor;
use crate::timer::PhaseTimer;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeReport {
    pub target: String,
    pub iterations: usize,
    /// Checks where the row was readable immediately.
    pub visible: usize,
    pub results: Vec<bool>,
}

impl ProbeReport {
    pub fn always_visible(&self) -> bool {
        self.visible == self.iterations
    }
}

/// Create `table`, insert one row, check a full read returns exactly that
/// row, then drop the table again. A table left behind by an interrupted
/// earlier check is dropped first.
pub async fn read_after_write(executor: &Executor, table: &str) -> BenchResult<bool> {
    let leftover = executor
        .execute(&format!("DROP TABLE {}", table), Vec::new())
        .await?;
    if leftover.is_success() {
        tracing::warn!("Dropped leftover table {} before checking", table);
    }

    let created = executor
        .execute(
            &format!(
                "CREATE TABLE {} (id INTEGER PRIMARY KEY AUTOINCREMENT, description)",
                table
            ),
            Vec::new(),
        )
        .await?;
    if let Some(err) = created.error() {
        return Err(BenchError::Assertion(format!(
            "creating table {} failed: {}",
            table, err.message
        )));
    }

    let inserted = executor
        .execute(
            &format!("INSERT INTO {}(description) VALUES (?)", table),
            vec![Value::from("test")],
        )
        .await?;
    if let Some(err) = inserted.error() {
        return Err(BenchError::Assertion(format!(
            "inserting into {} failed: {}",
            table, err.message
        )));
    }

    let read = executor
        .execute(&format!("SELECT * FROM {}", table), Vec::new())
        .await?;
    let visible = read.count() == Some(1);

    let dropped = executor
        .execute(&format!("DROP TABLE {}", table), Vec::new())
        .await?;
    if let Some(err) = dropped.error() {
        return Err(BenchError::Assertion(format!(
            "dropping table {} failed: {}",
            table, err.message
        )));
    }

    Ok(visible)
}

/// Repeat [`read_after_write`] `iterations` times, each on a fresh
/// connection to `target`.
pub async fn run_probe(target: &str, iterations: usize, config: &BenchConfig) -> BenchResult<ProbeReport> {
    let _timer = PhaseTimer::start(format!("checks synchronization speed {}", target));
    let table = &config.probe.table;
    let mut results = Vec::with_capacity(iterations);

    for check in 1..=iterations {
        let client = config.client_builder(target).build().await?;
        let executor = Executor::from_client(client);
        let visible = read_after_write(&executor, table).await?;
        tracing::info!(
            "Check {} if inserted record to {} is directly available: {}",
            check,
            target,
            visible
        );
        results.push(visible);
    }

    Ok(ProbeReport {
        target: target.to_string(),
        iterations,
        visible: results.iter().filter(|v| **v).count(),
        results,
    })
}

/// Result of checking one configured target.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VisibilityOutcome {
    Checked(ProbeReport),
    Failed { target: String, error: BenchError },
}

impl VisibilityOutcome {
    pub fn target(&self) -> &str {
        match self {
            VisibilityOutcome::Checked(report) => &report.target,
            VisibilityOutcome::Failed { target, .. } => target,
        }
    }

    pub fn is_checked(&self) -> bool {
        matches!(self, VisibilityOutcome::Checked(_))
    }
}

/// Check every configured target in order. A target that cannot be checked
/// is recorded as failed and the rest still run.
pub async fn check_all(config: &BenchConfig) -> Vec<VisibilityOutcome> {
    let mut outcomes = Vec::with_capacity(config.targets.len());
    for target in &config.targets {
        match run_probe(target, config.probe.iterations, config).await {
            Ok(report) => outcomes.push(VisibilityOutcome::Checked(report)),
            Err(error) => {
                tracing::error!("Checking {} failed: {}", target, error);
                outcomes.push(VisibilityOutcome::Failed {
                    target: target.clone(),
                    error,
                });
            }
        }
    }
    outcomes
}
