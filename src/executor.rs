use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use lagbench_client::{Client, DriverError, ResultSet, Value};

use crate::error::BenchResult;
use crate::result::{OperationResult, Timings};

/// Anything that can run one SQL statement with positional parameters.
///
/// Implemented for the real [`Client`]; tests substitute their own backends
/// to simulate lag or failures.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn execute(&self, sql: &str, params: Vec<Value>) -> Result<ResultSet, DriverError>;
}

#[async_trait]
impl Backend for Client {
    async fn execute(&self, sql: &str, params: Vec<Value>) -> Result<ResultSet, DriverError> {
        Client::execute(self, sql, params).await
    }
}

/// Issues statements against one target and normalizes what comes back.
///
/// Cloning is cheap; every clone shares the same backend handle, which is how
/// the load generator fans out over a single connection.
#[derive(Clone)]
pub struct Executor {
    backend: Arc<dyn Backend>,
}

impl Executor {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    pub fn from_client(client: Client) -> Self {
        Self::new(Arc::new(client))
    }

    /// Run `statement` once. A statement the backend refuses comes back as
    /// `Ok(OperationResult::Failure)`; transport and protocol failures are
    /// returned as `Err`.
    pub async fn execute(&self, statement: &str, params: Vec<Value>) -> BenchResult<OperationResult> {
        tracing::debug!("Executing: {}", statement);
        let time_start = Instant::now();

        let result_set = match self.backend.execute(statement, params).await {
            Ok(rs) => rs,
            Err(err) => {
                let result = OperationResult::from_driver_error(err)?;
                if let Some(e) = result.error() {
                    tracing::debug!("Backend refused '{}': {}", statement, e.message);
                }
                return Ok(result);
            }
        };
        let request = time_start.elapsed();

        let start_serialization = Instant::now();
        let result = OperationResult::from_result_set(result_set);
        let serialization = start_serialization.elapsed();

        Ok(result.with_timings(Timings {
            request,
            serialization,
            total: time_start.elapsed(),
        }))
    }
}
