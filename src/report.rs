//! Run reports and their console rendering

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::BenchError;
use crate::load::LoadOutcome;
use crate::poller::PollOutcome;
use crate::timer::PhaseTiming;

/// The four numbers one completed run boils down to, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BenchmarkReport {
    pub duration_syncing: f64,
    pub duration_insert: f64,
    pub duration_total: f64,
    pub duration_total_without_waiting: f64,
}

impl BenchmarkReport {
    pub fn new(syncing: Duration, insert: Duration, total: Duration) -> Self {
        let duration_syncing = syncing.as_secs_f64();
        let duration_total = total.as_secs_f64();
        Self {
            duration_syncing,
            duration_insert: insert.as_secs_f64(),
            duration_total,
            duration_total_without_waiting: duration_total - duration_syncing,
        }
    }
}

/// Everything recorded about one successful run against one target.
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkRun {
    pub target: String,
    pub started_at: DateTime<Utc>,
    pub record_count: usize,
    pub report: BenchmarkReport,
    pub phases: Vec<PhaseTiming>,
    pub load: LoadOutcome,
    pub schema_sync: PollOutcome,
    pub read_convergence: PollOutcome,
}

/// Result of benchmarking one configured target.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TargetOutcome {
    Completed(BenchmarkRun),
    Failed { target: String, error: BenchError },
}

impl TargetOutcome {
    pub fn target(&self) -> &str {
        match self {
            TargetOutcome::Completed(run) => &run.target,
            TargetOutcome::Failed { target, .. } => target,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, TargetOutcome::Completed(_))
    }
}

pub fn format_duration(d: Duration) -> String {
    if d.as_secs() > 0 {
        format!("{:.2}s", d.as_secs_f64())
    } else if d.as_millis() > 0 {
        format!("{:.2}ms", d.as_secs_f64() * 1000.0)
    } else {
        format!("{:.2}µs", d.as_secs_f64() * 1_000_000.0)
    }
}

pub fn format_ops_per_sec(count: usize, d: Duration) -> String {
    if d.is_zero() {
        return "n/a".to_string();
    }
    let ops = count as f64 / d.as_secs_f64();
    if ops >= 1_000_000.0 {
        format!("{:.2}M ops/s", ops / 1_000_000.0)
    } else if ops >= 1_000.0 {
        format!("{:.2}K ops/s", ops / 1_000.0)
    } else {
        format!("{:.2} ops/s", ops)
    }
}

fn secs(value: f64) -> Duration {
    Duration::from_secs_f64(value.max(0.0))
}

/// Plain-text lines describing one completed run.
pub fn summary_lines(run: &BenchmarkRun) -> Vec<String> {
    let report = &run.report;
    let insert = secs(report.duration_insert);
    let mut lines = vec![
        format!(
            "  {:.<40} {:>10} | {:>12} | {} rows",
            "insert",
            format_duration(insert),
            format_ops_per_sec(run.load.total(), insert),
            run.record_count
        ),
        format!(
            "  {:.<40} {:>10} | {} attempt(s)",
            "schema sync",
            format_duration(run.schema_sync.duration),
            run.schema_sync.attempts
        ),
        format!(
            "  {:.<40} {:>10} | {} attempt(s)",
            "read convergence",
            format_duration(secs(report.duration_syncing)),
            run.read_convergence.attempts
        ),
        format!(
            "  {:.<40} {:>10}",
            "total",
            format_duration(secs(report.duration_total))
        ),
        format!(
            "  {:.<40} {:>10}",
            "total without waiting",
            format_duration(secs(report.duration_total_without_waiting))
        ),
    ];
    if run.load.failed > 0 {
        lines.push(format!(
            "  {} of {} inserts were refused",
            run.load.failed,
            run.load.total()
        ));
    }
    lines
}

pub fn separator() -> String {
    "-".repeat(70)
}
