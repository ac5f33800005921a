//! Local SQLite file transport
//!
//! One connection per client, guarded by a mutex. Statements run on the
//! blocking pool; concurrent callers are serialized on the lock, which gives
//! the immediate read-after-write visibility a local file is expected to have.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::types::ValueRef;
use rusqlite::{params_from_iter, Connection, OpenFlags};

use super::DriverError;
use crate::protocol::{ResultSet, Value};

/// Descriptor used for a private in-memory database.
pub const MEMORY_TARGET: &str = ":memory:";

#[derive(Clone)]
pub struct LocalClient {
    conn: Arc<Mutex<Connection>>,
}

impl LocalClient {
    /// Open or create the database file at `path` (`:memory:` for an
    /// in-memory database).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DriverError> {
        let path = path.as_ref().to_path_buf();
        let conn = if path.as_os_str() == MEMORY_TARGET {
            Connection::open_in_memory()?
        } else {
            Connection::open_with_flags(
                &path,
                OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_CREATE
                    | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
            .map_err(|e| match DriverError::from(e) {
                DriverError::Database { message, .. } => DriverError::ConnectionError(format!(
                    "Failed to open {}: {}",
                    path.display(),
                    message
                )),
                other => other,
            })?
        };

        tracing::debug!("Opened local database {}", path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub async fn execute(&self, sql: &str, params: &[Value]) -> Result<ResultSet, DriverError> {
        let conn = Arc::clone(&self.conn);
        let sql = sql.to_string();
        let params = params.to_vec();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            run_statement(&conn, &sql, &params)
        })
        .await
        .map_err(|e| DriverError::InternalError(format!("Blocking task failed: {}", e)))?
    }
}

fn run_statement(conn: &Connection, sql: &str, params: &[Value]) -> Result<ResultSet, DriverError> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let column_count = columns.len();

    let mut rows = Vec::new();
    {
        let mut cursor = stmt.query(params_from_iter(params.iter().map(to_sql_value)))?;
        while let Some(row) = cursor.next()? {
            let mut values = Vec::with_capacity(column_count);
            for i in 0..column_count {
                values.push(from_value_ref(row.get_ref(i)?));
            }
            rows.push(values);
        }
    }

    // sqlite keeps the counters of the last INSERT/UPDATE/DELETE across
    // DDL and reads, so only those statements report them.
    let keyword = leading_keyword(sql);
    let changes_rows = !stmt.readonly()
        && ["INSERT", "REPLACE", "UPDATE", "DELETE"].contains(&keyword.as_str());
    let rows_affected = if changes_rows { conn.changes() } else { 0 };
    let inserted = rows_affected > 0 && matches!(keyword.as_str(), "INSERT" | "REPLACE");

    Ok(ResultSet {
        columns,
        rows,
        last_insert_rowid: inserted.then(|| conn.last_insert_rowid()),
        rows_affected,
    })
}

fn leading_keyword(sql: &str) -> String {
    sql.trim_start()
        .split(|c: char| !c.is_ascii_alphabetic())
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase()
}

fn to_sql_value(value: &Value) -> rusqlite::types::Value {
    match value {
        Value::Null => rusqlite::types::Value::Null,
        Value::Integer(i) => rusqlite::types::Value::Integer(*i),
        Value::Real(f) => rusqlite::types::Value::Real(*f),
        Value::Text(s) => rusqlite::types::Value::Text(s.clone()),
        Value::Blob(b) => rusqlite::types::Value::Blob(b.clone()),
    }
}

fn from_value_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
    }
}
