//! Normalized outcome of one backend call
//!
//! Every component downstream of the executor sees an [`OperationResult`]:
//! either the data a statement produced or the backend's refusal. Backend
//! refusals are data here, not errors; only transport-level failures leave
//! the executor as `Err`.

use std::time::Duration;

use lagbench_client::{DriverError, ResultSet, Value};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Backend-reported error descriptor, the `{message, code}` pair a libsql
/// server returns for a refused statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    pub message: String,
    pub code: Option<String>,
}

/// Time spent inside one executor call.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Timings {
    /// Dispatch until the raw result came back.
    pub request: Duration,
    /// Building the record list from the raw rows.
    pub serialization: Duration,
    /// End to end, measured separately.
    pub total: Duration,
}

/// One row, keyed by column name, in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }
}

impl Serialize for Record {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SuccessData {
    pub columns: Vec<String>,
    pub records: Vec<Record>,
    pub last_insert_rowid: Option<i64>,
    pub rows_affected: u64,
    pub count: usize,
    pub timings: Timings,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OperationResult {
    Success(SuccessData),
    Failure(ErrorDescriptor),
}

impl OperationResult {
    /// Zip every row with the column list. Timings are left zeroed for the
    /// executor to fill in.
    pub fn from_result_set(result_set: ResultSet) -> Self {
        let ResultSet {
            columns,
            rows,
            last_insert_rowid,
            rows_affected,
        } = result_set;

        let records: Vec<Record> = rows
            .into_iter()
            .map(|row| Record {
                fields: columns.iter().cloned().zip(row).collect(),
            })
            .collect();

        OperationResult::Success(SuccessData {
            count: records.len(),
            columns,
            records,
            last_insert_rowid,
            rows_affected,
            timings: Timings::default(),
        })
    }

    pub fn failure(message: impl Into<String>, code: Option<String>) -> Self {
        OperationResult::Failure(ErrorDescriptor {
            message: message.into(),
            code,
        })
    }

    /// Backend refusals become `Failure`; any other driver error is handed
    /// back untouched because it cannot be represented as run data.
    pub fn from_driver_error(err: DriverError) -> Result<Self, DriverError> {
        match err {
            DriverError::Database { message, code } => Ok(Self::failure(message, code)),
            other => Err(other),
        }
    }

    pub fn with_timings(mut self, timings: Timings) -> Self {
        if let OperationResult::Success(data) = &mut self {
            data.timings = timings;
        }
        self
    }

    pub fn is_success(&self) -> bool {
        matches!(self, OperationResult::Success(_))
    }

    pub fn data(&self) -> Option<&SuccessData> {
        match self {
            OperationResult::Success(data) => Some(data),
            OperationResult::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorDescriptor> {
        match self {
            OperationResult::Success(_) => None,
            OperationResult::Failure(err) => Some(err),
        }
    }

    pub fn count(&self) -> Option<usize> {
        self.data().map(|d| d.count)
    }

    pub fn records(&self) -> &[Record] {
        self.data().map(|d| d.records.as_slice()).unwrap_or(&[])
    }

    /// Integer in `column` of the first record, the shape of a
    /// `SELECT count(0) AS c` answer.
    pub fn first_i64(&self, column: &str) -> Option<i64> {
        self.records().first()?.get(column)?.as_i64()
    }
}

// Flat shape with every field present, absent ones as null.
#[derive(Serialize)]
struct Wire<'a> {
    success: bool,
    columns: Option<&'a [String]>,
    records: Option<&'a [Record]>,
    last_insert_rowid: Option<i64>,
    rows_affected: Option<u64>,
    count: Option<usize>,
    request_duration: Option<f64>,
    serialization_duration: Option<f64>,
    total_duration: Option<f64>,
    error: Option<&'a ErrorDescriptor>,
}

impl Serialize for OperationResult {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let wire = match self {
            OperationResult::Success(d) => Wire {
                success: true,
                columns: Some(&d.columns),
                records: Some(&d.records),
                last_insert_rowid: d.last_insert_rowid,
                rows_affected: Some(d.rows_affected),
                count: Some(d.count),
                request_duration: Some(d.timings.request.as_secs_f64()),
                serialization_duration: Some(d.timings.serialization.as_secs_f64()),
                total_duration: Some(d.timings.total.as_secs_f64()),
                error: None,
            },
            OperationResult::Failure(e) => Wire {
                success: false,
                columns: None,
                records: None,
                last_insert_rowid: None,
                rows_affected: None,
                count: None,
                request_duration: None,
                serialization_duration: None,
                total_duration: None,
                error: Some(e),
            },
        };
        wire.serialize(serializer)
    }
}
