//! Common test utilities for benchmark tests
//!
//! Provides shared helpers for:
//! - Temporary SQLite file targets
//! - Fast poll settings so runs finish quickly
//! - Fake backends that lag behind or fail on purpose

#![allow(dead_code)]

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lagbench::{BenchConfig, Backend, Executor};
use lagbench_client::{Client, ClientBuilder, DriverError, ResultSet, Value};
use tempfile::TempDir;

pub const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// A `file:` target inside a fresh temp dir. Keep the dir alive for the
/// duration of the test.
pub fn file_target() -> (String, TempDir) {
    let tmp_dir = TempDir::new().expect("Failed to create temp dir");
    let target = format!("file:{}", tmp_dir.path().join("bench.db").display());
    (target, tmp_dir)
}

pub async fn memory_client() -> Client {
    ClientBuilder::new(":memory:")
        .build()
        .await
        .expect("Failed to open in-memory database")
}

/// Config for `targets` with small row counts and short poll intervals.
pub fn fast_config(targets: Vec<String>, record_count: usize) -> BenchConfig {
    let mut config = BenchConfig {
        targets,
        record_count,
        ..BenchConfig::default()
    };
    config.polling.schema_interval_ms = POLL_INTERVAL.as_millis() as u64;
    config.polling.read_interval_ms = POLL_INTERVAL.as_millis() as u64;
    config
}

/// Wraps a real client and pretends writes have not replicated yet: the
/// first `stale_schema_reads` catalog reads see an empty schema and the
/// first `stale_count_reads` count reads see zero rows. `last_count` holds
/// the most recent count that reached the real client, or -1.
pub struct LaggingBackend {
    inner: Client,
    stale_schema_reads: AtomicUsize,
    stale_count_reads: AtomicUsize,
    pub schema_reads: AtomicUsize,
    pub count_reads: AtomicUsize,
    pub last_count: AtomicI64,
}

impl LaggingBackend {
    pub fn new(inner: Client, stale_schema_reads: usize, stale_count_reads: usize) -> Arc<Self> {
        Arc::new(Self {
            inner,
            stale_schema_reads: AtomicUsize::new(stale_schema_reads),
            stale_count_reads: AtomicUsize::new(stale_count_reads),
            schema_reads: AtomicUsize::new(0),
            count_reads: AtomicUsize::new(0),
            last_count: AtomicI64::new(-1),
        })
    }

    fn take_stale(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl Backend for LaggingBackend {
    async fn execute(&self, sql: &str, params: Vec<Value>) -> Result<ResultSet, DriverError> {
        if sql.contains("sqlite_schema") {
            self.schema_reads.fetch_add(1, Ordering::SeqCst);
            if Self::take_stale(&self.stale_schema_reads) {
                return Ok(ResultSet::default());
            }
        } else if sql.starts_with("SELECT count(0)") {
            self.count_reads.fetch_add(1, Ordering::SeqCst);
            if Self::take_stale(&self.stale_count_reads) {
                return Ok(ResultSet {
                    columns: vec!["c".to_string()],
                    rows: vec![vec![Value::Integer(0)]],
                    ..Default::default()
                });
            }
            let result = self.inner.execute(sql, params).await?;
            if let Some(Value::Integer(n)) = result.rows.first().and_then(|row| row.first()) {
                self.last_count.store(*n, Ordering::SeqCst);
            }
            return Ok(result);
        }
        self.inner.execute(sql, params).await
    }
}

/// Passes `healthy_calls` statements through, then fails every call with a
/// connection error.
pub struct FailingBackend {
    inner: Client,
    remaining: AtomicUsize,
}

impl FailingBackend {
    pub fn new(inner: Client, healthy_calls: usize) -> Arc<Self> {
        Arc::new(Self {
            inner,
            remaining: AtomicUsize::new(healthy_calls),
        })
    }
}

#[async_trait]
impl Backend for FailingBackend {
    async fn execute(&self, sql: &str, params: Vec<Value>) -> Result<ResultSet, DriverError> {
        let healthy = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if healthy {
            self.inner.execute(sql, params).await
        } else {
            Err(DriverError::ConnectionError("connection reset by peer".to_string()))
        }
    }
}

/// Refuses every insert, as a backend with a full disk would.
pub struct RefusingInserts {
    inner: Client,
}

impl RefusingInserts {
    pub fn new(inner: Client) -> Arc<Self> {
        Arc::new(Self { inner })
    }
}

#[async_trait]
impl Backend for RefusingInserts {
    async fn execute(&self, sql: &str, params: Vec<Value>) -> Result<ResultSet, DriverError> {
        if sql.starts_with("INSERT") {
            return Err(DriverError::database(
                "database or disk is full",
                Some("SQLITE_FULL".to_string()),
            ));
        }
        self.inner.execute(sql, params).await
    }
}

pub fn executor(backend: Arc<dyn Backend>) -> Executor {
    Executor::new(backend)
}
