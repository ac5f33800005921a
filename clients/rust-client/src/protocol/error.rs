use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq)]
pub enum DriverError {
    /// The backend executed the request and rejected the statement.
    #[error("Database error: {message}")]
    Database {
        message: String,
        code: Option<String>,
    },
    #[error("Connection error: {0}")]
    ConnectionError(String),
    #[error("Protocol error: {0}")]
    ProtocolError(String),
    #[error("Server error: {0}")]
    ServerError(String),
    #[error("Invalid target: {0}")]
    InvalidTarget(String),
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl DriverError {
    pub fn database(message: impl Into<String>, code: Option<String>) -> Self {
        DriverError::Database {
            message: message.into(),
            code,
        }
    }

    /// True when the statement reached the backend and was refused there
    /// (duplicate table, missing table, constraint...). Every other variant
    /// means the request itself could not be carried out.
    pub fn is_backend_rejection(&self) -> bool {
        matches!(self, DriverError::Database { .. })
    }
}

impl From<rusqlite::Error> for DriverError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(failure, message) => {
                let message = message.unwrap_or_else(|| failure.to_string());
                DriverError::Database {
                    message,
                    code: Some(sqlite_code_name(failure.extended_code).to_string()),
                }
            }
            rusqlite::Error::InvalidPath(path) => {
                DriverError::InvalidTarget(format!("invalid database path {}", path.display()))
            }
            other => DriverError::InternalError(other.to_string()),
        }
    }
}

/// Name of the primary SQLite result code, matching what a libsql server
/// reports in the `code` field of a stream error.
fn sqlite_code_name(extended_code: i32) -> &'static str {
    match extended_code & 0xff {
        1 => "SQLITE_ERROR",
        2 => "SQLITE_INTERNAL",
        3 => "SQLITE_PERM",
        4 => "SQLITE_ABORT",
        5 => "SQLITE_BUSY",
        6 => "SQLITE_LOCKED",
        7 => "SQLITE_NOMEM",
        8 => "SQLITE_READONLY",
        9 => "SQLITE_INTERRUPT",
        10 => "SQLITE_IOERR",
        11 => "SQLITE_CORRUPT",
        13 => "SQLITE_FULL",
        14 => "SQLITE_CANTOPEN",
        17 => "SQLITE_SCHEMA",
        18 => "SQLITE_TOOBIG",
        19 => "SQLITE_CONSTRAINT",
        20 => "SQLITE_MISMATCH",
        21 => "SQLITE_MISUSE",
        23 => "SQLITE_AUTH",
        25 => "SQLITE_RANGE",
        26 => "SQLITE_NOTADB",
        _ => "SQLITE_UNKNOWN",
    }
}
