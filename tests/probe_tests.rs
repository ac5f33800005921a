//! Read-after-write visibility tests

mod common;

use async_trait::async_trait;
use common::*;
use lagbench::{
    check_all, read_after_write, run_probe, Backend, BenchConfig, BenchError, Executor,
    VisibilityOutcome,
};
use lagbench_client::{Client, DriverError, ResultSet, Value};

/// Hides freshly inserted rows from full-table reads, like a replica that
/// has not caught up.
struct StaleReplica {
    inner: Client,
}

#[async_trait]
impl Backend for StaleReplica {
    async fn execute(&self, sql: &str, params: Vec<Value>) -> Result<ResultSet, DriverError> {
        if sql.starts_with("SELECT * FROM") {
            return Ok(ResultSet {
                columns: vec!["id".to_string(), "description".to_string()],
                ..Default::default()
            });
        }
        self.inner.execute(sql, params).await
    }
}

#[tokio::test]
async fn test_file_target_always_visible() {
    let (target, _tmp) = file_target();
    let config = BenchConfig::default();

    let report = run_probe(&target, 3, &config).await.unwrap();

    assert_eq!(report.target, target);
    assert_eq!(report.iterations, 3);
    assert_eq!(report.visible, 3);
    assert_eq!(report.results, vec![true, true, true]);
    assert!(report.always_visible());
}

#[tokio::test]
async fn test_stale_replica_reports_invisible() {
    let client = memory_client().await;
    let replica = Executor::new(std::sync::Arc::new(StaleReplica {
        inner: client.clone(),
    }));

    assert!(!read_after_write(&replica, "insert_test").await.unwrap());

    // The table was still dropped afterwards.
    let exec = Executor::from_client(client);
    assert!(read_after_write(&exec, "insert_test").await.unwrap());
}

#[tokio::test]
async fn test_zero_iterations() {
    let (target, _tmp) = file_target();
    let report = run_probe(&target, 0, &BenchConfig::default()).await.unwrap();
    assert_eq!(report.visible, 0);
    assert!(report.results.is_empty());
}

#[tokio::test]
async fn test_unknown_target_is_rejected() {
    let err = run_probe("gopher://db", 1, &BenchConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BenchError::Driver(DriverError::InvalidTarget(_))
    ));
}

#[tokio::test]
async fn test_refused_insert_is_assertion() {
    let client = memory_client().await;
    let exec = executor(RefusingInserts::new(client.clone()));

    let err = read_after_write(&exec, "insert_test").await.unwrap_err();
    match err {
        BenchError::Assertion(message) => {
            assert!(message.contains("inserting into insert_test"), "{}", message);
            assert!(message.contains("disk is full"), "{}", message);
        }
        other => panic!("unexpected error: {other}"),
    }

    // The next check replaces the table the failed one left behind.
    let exec = Executor::from_client(client);
    assert!(read_after_write(&exec, "insert_test").await.unwrap());
}

#[tokio::test]
async fn test_check_all_continues_after_failed_target() {
    let (good, _tmp) = file_target();
    let bad = "gopher://db".to_string();
    let mut config = BenchConfig {
        targets: vec![bad.clone(), good.clone()],
        ..BenchConfig::default()
    };
    config.probe.iterations = 2;

    let outcomes = check_all(&config).await;
    assert_eq!(outcomes.len(), 2);

    match &outcomes[0] {
        VisibilityOutcome::Failed { target, error } => {
            assert_eq!(target, &bad);
            assert!(matches!(
                error,
                BenchError::Driver(DriverError::InvalidTarget(_))
            ));
        }
        VisibilityOutcome::Checked(_) => panic!("unknown scheme should fail"),
    }

    assert!(outcomes[1].is_checked());
    assert_eq!(outcomes[1].target(), good);
    match &outcomes[1] {
        VisibilityOutcome::Checked(report) => assert_eq!(report.visible, 2),
        VisibilityOutcome::Failed { error, .. } => panic!("file target failed: {error}"),
    }

    let json = serde_json::to_value(&outcomes).unwrap();
    assert_eq!(json[0]["status"], "failed");
    assert_eq!(json[1]["status"], "checked");
    assert_eq!(json[1]["visible"], 2);
}
