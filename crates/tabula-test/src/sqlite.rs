//! An in-memory SQLite stand-in for the remote engine.
//!
//! [`SqliteExecutor`] implements [`RemoteExecutor`] on top of `rusqlite`, so
//! record operations can be tested end to end without a network service.
//! Failures are reported with SQLite's own message text (for example
//! `UNIQUE constraint failed: users.email`), which is what the error
//! classifier sees from a real SQLite-compatible remote engine.
//!
//! ```rust,no_run
//! use tabula_db::RemoteExecutor;
//! use tabula_test::sqlite::SqliteExecutor;
//!
//! async fn example() {
//!     let db = SqliteExecutor::memory().unwrap();
//!     db.execute("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)", &[])
//!         .await
//!         .unwrap();
//! }
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tabula_core::{TabulaError, TabulaResult};
use tabula_db::executor::{QueryMeta, QueryResult, RemoteError, RemoteExecutor};
use tabula_db::record::Record;
use tabula_db::value::{canonical_timestamp, Value};
use tokio::sync::Mutex;
use tracing::trace;

/// A SQLite database in memory, driven through the executor contract.
///
/// Cloning shares the same database. All statements run on the blocking pool
/// behind an async mutex.
#[derive(Clone)]
pub struct SqliteExecutor {
    conn: Arc<Mutex<rusqlite::Connection>>,
    statements: Arc<AtomicUsize>,
}

impl SqliteExecutor {
    /// Opens a fresh in-memory database with foreign keys enforced.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if SQLite cannot be opened.
    pub fn memory() -> TabulaResult<Self> {
        let conn = rusqlite::Connection::open_in_memory()
            .map_err(|e| TabulaError::ConfigurationError(format!("SQLite open failed: {e}")))?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| TabulaError::ConfigurationError(format!("Failed to set pragmas: {e}")))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            statements: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Returns the number of statements executed so far.
    pub fn statement_count(&self) -> usize {
        self.statements.load(Ordering::Relaxed)
    }

    /// Resets the statement counter.
    pub fn reset_statement_count(&self) {
        self.statements.store(0, Ordering::Relaxed);
    }

    fn bind_params(stmt: &mut rusqlite::Statement<'_>, params: &[Value]) -> Result<(), RemoteError> {
        for (i, param) in params.iter().enumerate() {
            let idx = i + 1;
            match param {
                Value::Null => stmt.raw_bind_parameter(idx, rusqlite::types::Null),
                Value::Bool(b) => stmt.raw_bind_parameter(idx, b),
                Value::Int(v) => stmt.raw_bind_parameter(idx, v),
                Value::Float(v) => stmt.raw_bind_parameter(idx, v),
                Value::String(s) => stmt.raw_bind_parameter(idx, s.as_str()),
                Value::Timestamp(ts) => {
                    stmt.raw_bind_parameter(idx, canonical_timestamp(ts).as_str())
                }
                Value::Json(j) => stmt.raw_bind_parameter(idx, j.to_string().as_str()),
            }
            .map_err(|e| RemoteError::new(format!("Bind error: {e}")))?;
        }
        Ok(())
    }

    fn convert_row(row: &rusqlite::Row<'_>, columns: &[String]) -> Record {
        columns
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let value = match row.get_ref(i).unwrap_or(rusqlite::types::ValueRef::Null) {
                    rusqlite::types::ValueRef::Null => Value::Null,
                    rusqlite::types::ValueRef::Integer(v) => Value::Int(v),
                    rusqlite::types::ValueRef::Real(v) => Value::Float(v),
                    rusqlite::types::ValueRef::Text(b) | rusqlite::types::ValueRef::Blob(b) => {
                        Value::String(String::from_utf8_lossy(b).to_string())
                    }
                };
                (name.clone(), value)
            })
            .collect()
    }
}

fn is_insert(sql: &str) -> bool {
    sql.trim_start()
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("insert"))
}

#[async_trait::async_trait]
impl RemoteExecutor for SqliteExecutor {
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<QueryResult, RemoteError> {
        self.statements.fetch_add(1, Ordering::Relaxed);
        trace!(sql, params = params.len(), "sqlite statement");
        let conn = Arc::clone(&self.conn);
        let sql = sql.to_string();
        let params = params.to_vec();

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| RemoteError::new(e.to_string()))?;
            Self::bind_params(&mut stmt, &params)?;

            if stmt.column_count() > 0 {
                let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
                let mut raw_rows = stmt.raw_query();
                let mut rows = Vec::new();
                while let Some(row) = raw_rows.next().map_err(|e| RemoteError::new(e.to_string()))? {
                    rows.push(Self::convert_row(row, &columns));
                }
                return Ok(QueryResult::with_rows(rows));
            }

            let changes = stmt
                .raw_execute()
                .map_err(|e| RemoteError::new(e.to_string()))?;
            let last_insert_id = (is_insert(&sql) && changes > 0).then(|| conn.last_insert_rowid());
            Ok(QueryResult {
                rows: Vec::new(),
                meta: QueryMeta {
                    changes: u64::try_from(changes).unwrap_or(u64::MAX),
                    last_insert_id,
                    ..QueryMeta::default()
                },
            })
        })
        .await
        .map_err(|e| RemoteError::new(format!("Task join error: {e}")))?
    }
}
