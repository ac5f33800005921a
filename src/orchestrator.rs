//! Benchmark orchestrator
//!
//! Drives one target through the benchmark phases:
//!
//! ```text
//! Idle -> DroppingPriorTable -> Creating -> VerifyingRejectedRecreate
//!      -> WaitingSchemaSync -> LoadingRecords -> WaitingReadConvergence
//!      -> Teardown -> Done
//! ```
//!
//! Any fatal error moves the run to `Failed` and is returned wrapped in
//! [`BenchError::Phase`]. A failed run produces no report.

use std::fmt;
use std::time::Instant;

use chrono::Utc;
use lagbench_client::Value;
use serde::Serialize;

use crate::config::BenchConfig;
use crate::error::{BenchError, BenchResult, InPhase};
use crate::executor::Executor;
use crate::load::run_load;
use crate::poller::{poll_until, PollPolicy};
use crate::report::{BenchmarkReport, BenchmarkRun, TargetOutcome};
use crate::timer::{PhaseTimer, PhaseTiming};

/// Catalog listing every schema object.
pub const SCHEMA_QUERY: &str = "SELECT * FROM sqlite_schema";

/// The working table plus the `sqlite_sequence` object AUTOINCREMENT creates.
pub const EXPECTED_SCHEMA_OBJECTS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Idle,
    DroppingPriorTable,
    Creating,
    VerifyingRejectedRecreate,
    WaitingSchemaSync,
    LoadingRecords,
    WaitingReadConvergence,
    Teardown,
    Done,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Statements issued against the working table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statements {
    pub table: String,
    pub drop: String,
    pub create: String,
    pub recreate: String,
    pub insert: String,
    pub count: String,
}

impl Statements {
    pub fn for_table(table: &str) -> Self {
        Self {
            table: table.to_string(),
            drop: format!("DROP TABLE {};", table),
            create: format!(
                "CREATE TABLE {} (id INTEGER PRIMARY KEY AUTOINCREMENT, name, age, color)",
                table
            ),
            recreate: format!("CREATE TABLE {} (id, name, age, color)", table),
            insert: format!("INSERT INTO {}(name, age, color) VALUES (?,?,?)", table),
            count: format!("SELECT count(0) AS c FROM {}", table),
        }
    }
}

/// Parameters of the `i`-th inserted row.
pub fn pony_values(i: usize) -> Vec<Value> {
    vec![
        Value::Text(format!("Pony{}", i)),
        Value::Integer(i as i64 * 1337),
        Value::from("blue"),
    ]
}

pub struct Orchestrator {
    target: String,
    executor: Executor,
    statements: Statements,
    record_count: usize,
    schema_policy: PollPolicy,
    read_policy: PollPolicy,
    phase: Phase,
    phases: Vec<PhaseTiming>,
}

impl Orchestrator {
    /// Orchestrator with the default table, row count and poll intervals.
    pub fn new(target: impl Into<String>, executor: Executor) -> Self {
        Self::from_config(target, executor, &BenchConfig::default())
    }

    pub fn from_config(target: impl Into<String>, executor: Executor, config: &BenchConfig) -> Self {
        Self {
            target: target.into(),
            executor,
            statements: Statements::for_table(&config.table),
            record_count: config.record_count,
            schema_policy: config.schema_policy(),
            read_policy: config.read_policy(),
            phase: Phase::Idle,
            phases: Vec::new(),
        }
    }

    pub fn record_count(mut self, record_count: usize) -> Self {
        self.record_count = record_count;
        self
    }

    pub fn table(mut self, table: &str) -> Self {
        self.statements = Statements::for_table(table);
        self
    }

    pub fn schema_policy(mut self, policy: PollPolicy) -> Self {
        self.schema_policy = policy;
        self
    }

    pub fn read_policy(mut self, policy: PollPolicy) -> Self {
        self.read_policy = policy;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    fn enter(&mut self, phase: Phase) {
        tracing::info!("[{}] {} -> {}", self.target, self.phase, phase);
        self.phase = phase;
    }

    fn record(&mut self, timer: PhaseTimer) {
        self.phases.push(timer.snapshot());
    }

    /// Run every phase once. The orchestrator can be run again afterwards;
    /// each run starts from `Idle`.
    pub async fn run(&mut self) -> BenchResult<BenchmarkRun> {
        self.phase = Phase::Idle;
        self.phases.clear();

        let result = self.run_phases().await.in_phase(self.phase);
        match result {
            Ok(run) => {
                self.enter(Phase::Done);
                Ok(run)
            }
            Err(err) => {
                self.enter(Phase::Failed);
                Err(err)
            }
        }
    }

    async fn run_phases(&mut self) -> BenchResult<BenchmarkRun> {
        let started_at = Utc::now();
        let bench_start = Instant::now();
        let table = self.statements.table.clone();

        self.enter(Phase::DroppingPriorTable);
        let dropped = self.executor.execute(&self.statements.drop, Vec::new()).await?;
        if dropped.is_success() {
            tracing::warn!(
                "Table {} is deleted. Crashed previous time? Clean up didn't happen.",
                table
            );
        } else {
            tracing::info!("Table {} does not exist. That's expected.", table);
        }

        self.enter(Phase::Creating);
        let timer = PhaseTimer::start(format!("create table {}", table));
        let created = self.executor.execute(&self.statements.create, Vec::new()).await?;
        if let Some(err) = created.error() {
            return Err(BenchError::Assertion(format!(
                "creating table {} failed: {}",
                table, err.message
            )));
        }
        self.record(timer);

        self.enter(Phase::VerifyingRejectedRecreate);
        let timer = PhaseTimer::start(format!("create table {} again. Should fail to pass", table));
        let recreated = self.executor.execute(&self.statements.recreate, Vec::new()).await?;
        if recreated.is_success() {
            return Err(BenchError::Assertion(format!(
                "creating table {} a second time succeeded; the backend did not reject a duplicate table",
                table
            )));
        }
        self.record(timer);

        self.enter(Phase::WaitingSchemaSync);
        let timer = PhaseTimer::start("checking if schema is updated");
        let schema_sync = poll_until(
            &self.executor,
            SCHEMA_QUERY,
            |result| result.count(),
            EXPECTED_SCHEMA_OBJECTS,
            self.schema_policy,
        )
        .await?;
        self.record(timer);

        self.enter(Phase::LoadingRecords);
        let load = run_load(
            &self.executor,
            &self.statements.insert,
            self.record_count,
            pony_values,
        )
        .await?;
        self.phases.push(PhaseTiming {
            label: format!("Executing {} tasks in parallel", self.record_count),
            duration: load.duration,
        });

        self.enter(Phase::WaitingReadConvergence);
        let timer = PhaseTimer::start("waiting until all inserted data is available for read");
        let read_convergence = poll_until(
            &self.executor,
            &self.statements.count,
            |result| result.first_i64("c"),
            self.record_count as i64,
            self.read_policy,
        )
        .await?;
        let duration_syncing = timer.duration();
        self.record(timer);

        self.enter(Phase::Teardown);
        let timer = PhaseTimer::start(format!("cleaning up by dropping table {}", table));
        let teardown = self.executor.execute(&self.statements.drop, Vec::new()).await?;
        if let Some(err) = teardown.error() {
            return Err(BenchError::Assertion(format!(
                "dropping table {} failed: {}",
                table, err.message
            )));
        }
        self.record(timer);

        let report = BenchmarkReport::new(duration_syncing, load.duration, bench_start.elapsed());

        Ok(BenchmarkRun {
            target: self.target.clone(),
            started_at,
            record_count: self.record_count,
            report,
            phases: std::mem::take(&mut self.phases),
            load,
            schema_sync,
            read_convergence,
        })
    }
}

/// Connect to `target` and run one benchmark against it.
pub async fn run_target(target: &str, config: &BenchConfig) -> BenchResult<BenchmarkRun> {
    let client = config
        .client_builder(target)
        .build()
        .await
        .in_phase(Phase::Idle)?;
    let executor = Executor::from_client(client);
    Orchestrator::from_config(target, executor, config).run().await
}

/// Benchmark every configured target in order. A failing target is
/// reported and the remaining targets still run.
pub async fn run_all(config: &BenchConfig) -> Vec<TargetOutcome> {
    let mut outcomes = Vec::with_capacity(config.targets.len());
    for target in &config.targets {
        tracing::info!("Benchmarking {}", target);
        let outcome = match run_target(target, config).await {
            Ok(run) => TargetOutcome::Completed(run),
            Err(error) => {
                tracing::error!("Benchmark against {} failed: {}", target, error);
                TargetOutcome::Failed {
                    target: target.clone(),
                    error,
                }
            }
        };
        outcomes.push(outcome);
    }
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::Backend;
    use async_trait::async_trait;
    use lagbench_client::{ClientBuilder, DriverError, ResultSet};
    use std::sync::Arc;
    use std::time::Duration;

    async fn memory_executor() -> Executor {
        let client = ClientBuilder::new(":memory:").build().await.unwrap();
        Executor::from_client(client)
    }

    #[test]
    fn test_statements() {
        let s = Statements::for_table("pony");
        assert_eq!(s.drop, "DROP TABLE pony;");
        assert_eq!(
            s.create,
            "CREATE TABLE pony (id INTEGER PRIMARY KEY AUTOINCREMENT, name, age, color)"
        );
        assert_eq!(s.recreate, "CREATE TABLE pony (id, name, age, color)");
        assert_eq!(s.insert, "INSERT INTO pony(name, age, color) VALUES (?,?,?)");
        assert_eq!(s.count, "SELECT count(0) AS c FROM pony");
    }

    #[test]
    fn test_pony_values() {
        assert_eq!(
            pony_values(3),
            vec![
                Value::Text("Pony3".into()),
                Value::Integer(4011),
                Value::Text("blue".into())
            ]
        );
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::WaitingReadConvergence.to_string(), "WaitingReadConvergence");
        assert_eq!(Phase::Idle.to_string(), "Idle");
    }

    #[tokio::test]
    async fn test_full_run_in_memory() {
        let mut orchestrator = Orchestrator::new(":memory:", memory_executor().await)
            .record_count(50)
            .read_policy(PollPolicy::every(Duration::from_millis(10)));
        assert_eq!(orchestrator.phase(), Phase::Idle);

        let run = orchestrator.run().await.unwrap();
        assert_eq!(orchestrator.phase(), Phase::Done);

        assert_eq!(run.load.succeeded, 50);
        assert_eq!(run.load.failed, 0);
        assert_eq!(run.schema_sync.attempts, 1);
        assert_eq!(run.read_convergence.attempts, 1);
        assert_eq!(run.phases.len(), 6);

        let r = run.report;
        assert_eq!(r.duration_total_without_waiting, r.duration_total - r.duration_syncing);
        assert!(r.duration_total >= r.duration_insert);
        assert!(r.duration_total >= r.duration_syncing);
        assert!(r.duration_syncing >= 0.0);
    }

    #[tokio::test]
    async fn test_leftover_table_is_dropped() {
        let exec = memory_executor().await;
        let leftover = exec
            .execute("CREATE TABLE pony (id, name, age, color)", vec![])
            .await
            .unwrap();
        assert!(leftover.is_success());

        let mut orchestrator = Orchestrator::new(":memory:", exec.clone()).record_count(5);
        orchestrator.run().await.unwrap();

        // Teardown left nothing behind.
        let schema = exec.execute(SCHEMA_QUERY, vec![]).await.unwrap();
        assert_eq!(schema.count(), Some(1));
    }

    /// Accepts every statement, including the duplicate create.
    struct Permissive;

    #[async_trait]
    impl Backend for Permissive {
        async fn execute(&self, _sql: &str, _params: Vec<Value>) -> Result<ResultSet, DriverError> {
            Ok(ResultSet::default())
        }
    }

    #[tokio::test]
    async fn test_accepted_recreate_aborts() {
        let mut orchestrator = Orchestrator::new("fake", Executor::new(Arc::new(Permissive)));
        let err = orchestrator.run().await.unwrap_err();

        assert_eq!(orchestrator.phase(), Phase::Failed);
        assert_eq!(err.phase(), Some(Phase::VerifyingRejectedRecreate));
        assert!(matches!(err.root(), BenchError::Assertion(_)));
    }

    struct Unreachable;

    #[async_trait]
    impl Backend for Unreachable {
        async fn execute(&self, _sql: &str, _params: Vec<Value>) -> Result<ResultSet, DriverError> {
            Err(DriverError::ConnectionError("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn test_fatal_error_names_phase() {
        let mut orchestrator = Orchestrator::new("fake", Executor::new(Arc::new(Unreachable)));
        let err = orchestrator.run().await.unwrap_err();

        assert_eq!(err.phase(), Some(Phase::DroppingPriorTable));
        assert!(matches!(
            err.root(),
            BenchError::Driver(DriverError::ConnectionError(_))
        ));
    }

    #[tokio::test]
    async fn test_run_target_rejects_unknown_descriptor() {
        let err = run_target("ftp://nowhere", &BenchConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err.phase(), Some(Phase::Idle));
        assert!(matches!(
            err.root(),
            BenchError::Driver(DriverError::InvalidTarget(_))
        ));
    }
}
