//! Core error types for tabula.
//!
//! [`TabulaError`] covers every failure a record operation can surface:
//! local validation failures (no SQL issued), hard pipeline failures such as
//! [`TabulaError::NoFieldsToUpdate`], and classified execution failures carried
//! by [`QueryError`]. The [`ErrorKind`] enum is the classification taxonomy for
//! errors reported by the remote SQL engine.

use std::fmt;

use thiserror::Error;

/// A single field-level validation failure.
///
/// # Examples
///
/// ```
/// use tabula_core::error::ValidationError;
///
/// let err = ValidationError::new("age", "age must be at least 13", "min_value");
/// assert_eq!(err.to_string(), "age must be at least 13");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The field that failed validation.
    pub field: String,
    /// The human-readable message.
    pub message: String,
    /// A short code identifying the failure (e.g. "required", "min_length").
    pub code: String,
}

impl ValidationError {
    /// Creates a new `ValidationError` for the given field.
    pub fn new(
        field: impl Into<String>,
        message: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code: code.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Every violation found in one validation pass, in field-declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    /// Creates an empty error list.
    pub const fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Appends a violation.
    pub fn push(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Returns `true` if no violation was recorded.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of violations.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Returns the violations as a slice.
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Returns the violations reported for one field.
    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a ValidationError> {
        self.errors.iter().filter(move |e| e.field == field)
    }

    /// Converts into `Ok(())` when empty, or a [`TabulaError::Validation`].
    pub fn into_result(self) -> TabulaResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(TabulaError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl From<Vec<ValidationError>> for ValidationErrors {
    fn from(errors: Vec<ValidationError>) -> Self {
        Self { errors }
    }
}

impl IntoIterator for ValidationErrors {
    type Item = ValidationError;
    type IntoIter = std::vec::IntoIter<ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

/// Classification of an error reported by the remote SQL engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A unique constraint rejected the write.
    DuplicateEntry,
    /// A foreign key constraint rejected the write.
    ForeignKeyViolation,
    /// A NOT NULL constraint rejected the write.
    NotNullViolation,
    /// A NOT NULL violation on a field the schema declares optional: the
    /// table and the schema disagree.
    SchemaMismatch,
    /// A CHECK constraint rejected the write.
    CheckConstraintViolation,
    /// HTTP 400 from the remote service.
    MalformedRequest,
    /// HTTP 401 from the remote service.
    Unauthorized,
    /// HTTP 403 from the remote service.
    Forbidden,
    /// HTTP 404 from the remote service.
    NotFound,
    /// HTTP 429 from the remote service.
    RateLimited,
    /// HTTP 500 from the remote service.
    ServerError,
    /// Nothing matched; the raw message is passed through.
    Unclassified,
}

impl ErrorKind {
    /// Returns a stable snake_case name for logs and diagnostics.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DuplicateEntry => "duplicate_entry",
            Self::ForeignKeyViolation => "foreign_key_violation",
            Self::NotNullViolation => "not_null_violation",
            Self::SchemaMismatch => "schema_mismatch",
            Self::CheckConstraintViolation => "check_constraint_violation",
            Self::MalformedRequest => "malformed_request",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::Unclassified => "unclassified",
        }
    }

    /// Returns `true` for constraint violations raised by the engine itself.
    pub const fn is_constraint_violation(self) -> bool {
        matches!(
            self,
            Self::DuplicateEntry
                | Self::ForeignKeyViolation
                | Self::NotNullViolation
                | Self::SchemaMismatch
                | Self::CheckConstraintViolation
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified execution failure with its diagnostic context.
#[derive(Debug, Clone)]
pub struct QueryError {
    /// The classification of the raw engine message.
    pub kind: ErrorKind,
    /// The classified, human-readable message.
    pub message: String,
    /// The raw message reported by the executor.
    pub raw_message: String,
    /// The offending field, when the classifier could determine it.
    pub field: Option<String>,
    /// The SQL text that was issued.
    pub sql: String,
    /// The bound parameters, rendered for display.
    pub params: Vec<String>,
    /// The table the operation targeted.
    pub table: String,
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// The primary error type for tabula.
#[derive(Error, Debug)]
pub enum TabulaError {
    // ── Local, pre-SQL ───────────────────────────────────────────────

    /// One or more fields failed validation. No SQL was issued.
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// An UPDATE was requested with nothing to assign.
    #[error("No fields to update")]
    NoFieldsToUpdate,

    /// The INSERT ran but the created row could not be identified or re-read.
    #[error("Failed to create record: {0}")]
    FailedToCreate(String),

    /// A schema declaration is malformed.
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    /// An operation was called with arguments it cannot act on.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A lifecycle hook rejected the operation.
    #[error("Hook failed: {0}")]
    Hook(String),

    // ── Execution ────────────────────────────────────────────────────

    /// The remote engine rejected a statement; the message is classified.
    #[error("{0}")]
    Query(Box<QueryError>),

    /// A bulk operation with `continue_on_error = false` stopped at `index`.
    #[error("Bulk operation aborted at item {index} after {completed} completed: {source}")]
    BulkAborted {
        /// Index of the failing item in the caller's list.
        index: usize,
        /// Number of items that completed before the failure.
        completed: usize,
        /// The failure that aborted the batch.
        source: Box<TabulaError>,
    },

    // ── Configuration ────────────────────────────────────────────────

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    // ── Serialization ────────────────────────────────────────────────

    /// An error occurred during serialization or deserialization.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // ── IO ───────────────────────────────────────────────────────────

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl TabulaError {
    /// Returns the execution error classification, if this is an execution
    /// failure.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Query(err) => Some(err.kind),
            Self::BulkAborted { source, .. } => source.kind(),
            _ => None,
        }
    }

    /// Returns `true` if a unique constraint rejected the statement.
    pub fn is_duplicate_entry(&self) -> bool {
        self.kind() == Some(ErrorKind::DuplicateEntry)
    }

    /// Returns the validation violations, if this is a validation failure.
    pub const fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            Self::Validation(errors) => Some(errors),
            _ => None,
        }
    }

    /// Returns the diagnostic context of an execution failure.
    pub fn query_error(&self) -> Option<&QueryError> {
        match self {
            Self::Query(err) => Some(err),
            _ => None,
        }
    }
}

impl From<QueryError> for TabulaError {
    fn from(err: QueryError) -> Self {
        Self::Query(Box::new(err))
    }
}

impl From<ValidationErrors> for TabulaError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

/// A convenience type alias for `Result<T, TabulaError>`.
pub type TabulaResult<T> = Result<T, TabulaError>;
