use std::time::Duration;

use lagbench_client::DriverError;
use thiserror::Error;

use crate::orchestrator::Phase;

#[derive(Error, Debug)]
pub enum BenchError {
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    #[error(
        "Convergence timeout: '{query}' did not reach {expected} after {attempts} attempts ({:.3}s), last observed {last_observed}",
        .waited.as_secs_f64()
    )]
    ConvergenceTimeout {
        query: String,
        expected: String,
        last_observed: String,
        attempts: u32,
        waited: Duration,
    },

    #[error("Assertion failed: {0}")]
    Assertion(String),

    #[error("Phase {phase} failed: {source}")]
    Phase {
        phase: Phase,
        #[source]
        source: Box<BenchError>,
    },

    #[error("Load task failed: {0}")]
    Task(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
}

pub type BenchResult<T> = Result<T, BenchError>;

impl BenchError {
    /// The phase a run failed in, if the error was raised by the orchestrator.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            BenchError::Phase { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    /// Innermost error, with phase wrappers removed.
    pub fn root(&self) -> &BenchError {
        match self {
            BenchError::Phase { source, .. } => source.root(),
            other => other,
        }
    }
}

impl serde::Serialize for BenchError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Attach the running phase to any error leaving it.
pub trait InPhase<T> {
    fn in_phase(self, phase: Phase) -> BenchResult<T>;
}

impl<T, E: Into<BenchError>> InPhase<T> for Result<T, E> {
    fn in_phase(self, phase: Phase) -> BenchResult<T> {
        self.map_err(|e| BenchError::Phase {
            phase,
            source: Box::new(e.into()),
        })
    }
}
