//! An executor that records every statement it receives.
//!
//! [`RecordingExecutor`] answers from a queue of scripted responses. When the
//! queue is empty it forwards to the wrapped executor, if there is one, or
//! answers with an empty result. Tests use it to assert the exact SQL and
//! parameters an operation produced, or to inject engine failures into an
//! otherwise real SQLite run.

use std::collections::VecDeque;
use std::sync::Arc;

use tabula_db::executor::{QueryResult, RemoteError, RemoteExecutor};
use tabula_db::value::Value;
use tokio::sync::Mutex;

/// One statement as the executor received it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedStatement {
    /// The SQL text.
    pub sql: String,
    /// The bound parameters, in wire form.
    pub params: Vec<Value>,
}

type Response = Result<QueryResult, RemoteError>;

/// Records statements and replays scripted responses.
#[derive(Default)]
pub struct RecordingExecutor {
    statements: Mutex<Vec<RecordedStatement>>,
    responses: Mutex<VecDeque<Response>>,
    inner: Option<Arc<dyn RemoteExecutor>>,
}

impl RecordingExecutor {
    /// An executor answering every statement with an empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// An executor answering from `responses`, then with empty results.
    pub fn scripted(responses: impl IntoIterator<Item = Response>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            ..Self::default()
        }
    }

    /// An executor forwarding to `inner` once its scripted responses run out.
    pub fn wrap(inner: Arc<dyn RemoteExecutor>) -> Self {
        Self {
            inner: Some(inner),
            ..Self::default()
        }
    }

    /// Queues a response ahead of the fallback.
    #[must_use]
    pub fn respond(mut self, response: Response) -> Self {
        self.responses.get_mut().push_back(response);
        self
    }

    /// Queues a failure with `message` as the engine text.
    #[must_use]
    pub fn fail_with(self, message: impl Into<String>) -> Self {
        self.respond(Err(RemoteError::new(message)))
    }

    /// Queues a response while the executor is shared.
    pub async fn push_response(&self, response: Response) {
        self.responses.lock().await.push_back(response);
    }

    /// Returns every statement received so far.
    pub async fn statements(&self) -> Vec<RecordedStatement> {
        self.statements.lock().await.clone()
    }

    /// Returns the SQL text of every statement received so far.
    pub async fn sql_log(&self) -> Vec<String> {
        self.statements
            .lock()
            .await
            .iter()
            .map(|s| s.sql.clone())
            .collect()
    }

    /// Returns the most recent statement.
    pub async fn last(&self) -> Option<RecordedStatement> {
        self.statements.lock().await.last().cloned()
    }

    /// Forgets the recorded statements.
    pub async fn clear(&self) {
        self.statements.lock().await.clear();
    }
}

#[async_trait::async_trait]
impl RemoteExecutor for RecordingExecutor {
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<QueryResult, RemoteError> {
        self.statements.lock().await.push(RecordedStatement {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        let scripted = self.responses.lock().await.pop_front();
        if let Some(response) = scripted {
            return response;
        }
        match &self.inner {
            Some(inner) => inner.execute(sql, params).await,
            None => Ok(QueryResult::default()),
        }
    }
}
