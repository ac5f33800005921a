//! Hrana over HTTP (v2 pipeline) wire types
//!
//! Every call is a self-contained pipeline: one `execute` request followed by
//! `close`, sent without a baton, so concurrent calls never share a stream.
//!
//! ```text
//! POST /v2/pipeline
//! {"baton":null,"requests":[{"type":"execute","stmt":{...}},{"type":"close"}]}
//! ```

use base64::Engine;
use serde::{Deserialize, Serialize};

use super::{DriverError, ResultSet, Value};

/// Path of the pipeline endpoint relative to the server base URL.
pub const PIPELINE_PATH: &str = "/v2/pipeline";

#[derive(Debug, Clone, Serialize)]
pub struct PipelineRequest {
    pub baton: Option<String>,
    pub requests: Vec<StreamRequest>,
}

impl PipelineRequest {
    pub fn execute_once(stmt: Stmt) -> Self {
        Self {
            baton: None,
            requests: vec![StreamRequest::Execute { stmt }, StreamRequest::Close],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamRequest {
    Execute { stmt: Stmt },
    Close,
}

#[derive(Debug, Clone, Serialize)]
pub struct Stmt {
    pub sql: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<HranaValue>,
    pub want_rows: bool,
}

impl Stmt {
    pub fn new(sql: &str, params: &[Value]) -> Self {
        Self {
            sql: sql.to_string(),
            args: params.iter().map(HranaValue::from).collect(),
            want_rows: true,
        }
    }
}

/// Value encoding used on the wire. Integers travel as strings so that the
/// full i64 range survives JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HranaValue {
    Null,
    Integer { value: String },
    Float { value: f64 },
    Text { value: String },
    Blob { base64: String },
}

impl From<&Value> for HranaValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => HranaValue::Null,
            Value::Integer(i) => HranaValue::Integer {
                value: i.to_string(),
            },
            Value::Real(f) => HranaValue::Float { value: *f },
            Value::Text(s) => HranaValue::Text { value: s.clone() },
            Value::Blob(b) => HranaValue::Blob {
                base64: base64::engine::general_purpose::STANDARD_NO_PAD.encode(b),
            },
        }
    }
}

impl TryFrom<HranaValue> for Value {
    type Error = DriverError;

    fn try_from(value: HranaValue) -> Result<Self, Self::Error> {
        Ok(match value {
            HranaValue::Null => Value::Null,
            HranaValue::Integer { value } => Value::Integer(value.parse().map_err(|e| {
                DriverError::ProtocolError(format!("Invalid integer '{}': {}", value, e))
            })?),
            HranaValue::Float { value } => Value::Real(value),
            HranaValue::Text { value } => Value::Text(value),
            HranaValue::Blob { base64 } => {
                // Servers are not consistent about padding.
                let trimmed = base64.trim_end_matches('=');
                Value::Blob(
                    base64::engine::general_purpose::STANDARD_NO_PAD
                        .decode(trimmed)
                        .map_err(|e| DriverError::ProtocolError(format!("Invalid blob: {}", e)))?,
                )
            }
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineResponse {
    #[serde(default)]
    pub baton: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    pub results: Vec<StreamResult>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamResult {
    Ok { response: StreamResponse },
    Error { error: HranaError },
    None,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamResponse {
    Execute { result: StmtResult },
    Close,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HranaError {
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Col {
    pub name: Option<String>,
    #[serde(default)]
    pub decltype: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StmtResult {
    pub cols: Vec<Col>,
    pub rows: Vec<Vec<HranaValue>>,
    pub affected_row_count: u64,
    #[serde(default)]
    pub last_insert_rowid: Option<String>,
}

impl PipelineResponse {
    /// Pull the result of the single `execute` request out of the pipeline.
    /// A stream-level error is the backend refusing the statement.
    pub fn into_result_set(self) -> Result<ResultSet, DriverError> {
        let first = self
            .results
            .into_iter()
            .next()
            .ok_or_else(|| DriverError::ProtocolError("Empty pipeline response".to_string()))?;

        match first {
            StreamResult::Ok {
                response: StreamResponse::Execute { result },
            } => result.try_into(),
            StreamResult::Ok {
                response: StreamResponse::Close,
            } => Err(DriverError::ProtocolError(
                "Expected execute response, got close".to_string(),
            )),
            StreamResult::Error { error } => Err(DriverError::Database {
                message: error.message,
                code: error.code,
            }),
            StreamResult::None => Err(DriverError::ProtocolError(
                "Execute request was not processed".to_string(),
            )),
        }
    }
}

impl TryFrom<StmtResult> for ResultSet {
    type Error = DriverError;

    fn try_from(result: StmtResult) -> Result<Self, Self::Error> {
        let columns = result
            .cols
            .into_iter()
            .enumerate()
            .map(|(i, c)| c.name.unwrap_or_else(|| format!("column{}", i)))
            .collect();

        let rows = result
            .rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(Value::try_from)
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;

        let last_insert_rowid = match result.last_insert_rowid {
            Some(s) => Some(s.parse().map_err(|e| {
                DriverError::ProtocolError(format!("Invalid last_insert_rowid '{}': {}", s, e))
            })?),
            None => None,
        };

        Ok(ResultSet {
            columns,
            rows,
            last_insert_rowid,
            rows_affected: result.affected_row_count,
        })
    }
}
