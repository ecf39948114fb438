//! The remote executor contract.
//!
//! [`RemoteExecutor`] is the seam between record operations and whatever
//! transport reaches the SQL engine. It accepts SQL text with positional
//! parameters and returns rows plus metadata, or the engine's raw error
//! message. Raw messages are classified by
//! [`classify`](crate::classify::classify) before reaching callers.
//!
//! Transports that speak JSON can decode their responses into an
//! [`ExecResponse`] and call [`ExecResponse::into_result`].

use serde::Deserialize;
use thiserror::Error;

use crate::record::Record;
use crate::value::Value;

/// A raw failure reported by the remote engine or its transport.
///
/// HTTP-coded failures are expected to carry their status in the message
/// (e.g. `"HTTP 429: Too Many Requests"`).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct RemoteError(pub String);

impl RemoteError {
    /// Creates an error from a raw message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    /// Returns the raw message.
    pub fn message(&self) -> &str {
        &self.0
    }
}

/// Statement metadata reported by the engine.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct QueryMeta {
    /// Rows changed by the statement.
    pub changes: u64,
    /// The identifier generated by the last INSERT, if any.
    #[serde(alias = "lastInsertId", alias = "last_row_id", alias = "lastRowId")]
    pub last_insert_id: Option<i64>,
    /// Rows read by the engine.
    #[serde(alias = "rowsRead")]
    pub rows_read: Option<u64>,
    /// Rows written by the engine.
    #[serde(alias = "rowsWritten")]
    pub rows_written: Option<u64>,
    /// Engine-side execution time.
    #[serde(alias = "durationMs", alias = "duration")]
    pub duration_ms: Option<f64>,
}

/// The successful outcome of one statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Result rows, empty for statements that return none.
    pub rows: Vec<Record>,
    /// Statement metadata.
    pub meta: QueryMeta,
}

impl QueryResult {
    /// A result carrying rows only.
    pub fn with_rows(rows: Vec<Record>) -> Self {
        Self {
            rows,
            meta: QueryMeta::default(),
        }
    }

    /// A result carrying a change count only.
    pub fn with_changes(changes: u64) -> Self {
        Self {
            rows: Vec::new(),
            meta: QueryMeta {
                changes,
                ..QueryMeta::default()
            },
        }
    }

    /// A result for an INSERT that generated `id`.
    pub fn inserted(id: i64) -> Self {
        Self {
            rows: Vec::new(),
            meta: QueryMeta {
                changes: 1,
                last_insert_id: Some(id),
                ..QueryMeta::default()
            },
        }
    }

    /// Returns the first row, if any.
    pub fn first(&self) -> Option<&Record> {
        self.rows.first()
    }
}

/// The JSON envelope returned by HTTP SQL services:
/// `{rows, success, meta, error?}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExecResponse {
    /// Result rows as JSON objects.
    #[serde(alias = "results")]
    pub rows: Vec<serde_json::Map<String, serde_json::Value>>,
    /// Whether the statement succeeded.
    pub success: bool,
    /// Statement metadata.
    pub meta: QueryMeta,
    /// The raw error message when `success` is false.
    pub error: Option<String>,
}

impl ExecResponse {
    /// Parses an envelope from JSON text.
    ///
    /// # Errors
    ///
    /// Returns a [`RemoteError`] describing the decoding failure.
    pub fn from_json_str(body: &str) -> Result<Self, RemoteError> {
        serde_json::from_str(body)
            .map_err(|e| RemoteError::new(format!("Malformed response body: {e}")))
    }

    /// Converts the envelope into the executor result.
    ///
    /// # Errors
    ///
    /// Returns the envelope's error message when `success` is false.
    pub fn into_result(self) -> Result<QueryResult, RemoteError> {
        if !self.success {
            return Err(RemoteError::new(
                self.error
                    .unwrap_or_else(|| "Remote execution failed without a message".to_string()),
            ));
        }
        let rows = self
            .rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|(name, value)| (name, Value::from_json(value)))
                    .collect()
            })
            .collect();
        Ok(QueryResult {
            rows,
            meta: self.meta,
        })
    }
}

/// Runs SQL against the remote engine.
///
/// Implementations bind `params` positionally to the `?` placeholders of
/// `sql`. Each call is one request; no state is kept between calls.
#[async_trait::async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Executes one statement.
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<QueryResult, RemoteError>;
}
