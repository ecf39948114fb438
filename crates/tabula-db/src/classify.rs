//! Classification of raw engine errors.
//!
//! [`classify`] maps the raw message of a failed statement, plus the SQL that
//! was issued, onto an [`ErrorKind`] and a human-readable message. Matching is
//! case-insensitive and runs in priority order: unique/duplicate, foreign
//! key, NOT NULL, CHECK, then HTTP status codes. Anything else passes through
//! verbatim as [`ErrorKind::Unclassified`]. The function is total and
//! deterministic.

use std::sync::LazyLock;

use regex::Regex;
use tabula_core::ErrorKind;

use crate::schema::Schema;

/// Keywords used to guess the offending column of a duplicate entry when the
/// engine message does not name it.
const DUPLICATE_HINTS: [&str; 4] = ["email", "username", "slug", "sku"];

static UNIQUE_FIELD: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile_all(&[
        r"(?i)unique constraint failed:\s*([\w.]+)",
        r"(?i)for key '([^']+)'",
        r#"(?i)key \(\s*"?(\w+)"?\s*\)"#,
    ])
});

static NOT_NULL_FIELD: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile_all(&[
        r"(?i)not null constraint failed:\s*([\w.]+)",
        r#"(?i)null value in column "?(\w+)"?"#,
        r"(?i)column '(\w+)' cannot be null",
    ])
});

static HTTP_STATUS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile_all(&[r"(?i)\b(?:http|status(?:\s+code)?)\s*:?\s*(\d{3})\b"])
});

fn compile_all(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().filter_map(|p| Regex::new(p).ok()).collect()
}

fn first_capture(patterns: &[Regex], text: &str) -> Option<String> {
    patterns.iter().find_map(|re| {
        re.captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    })
}

/// Strips a `table.` prefix from an engine-reported column.
fn column_name(qualified: &str) -> String {
    qualified
        .rsplit('.')
        .next()
        .unwrap_or(qualified)
        .to_string()
}

/// The outcome of classifying one raw error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// The category.
    pub kind: ErrorKind,
    /// The human-readable message.
    pub message: String,
    /// The offending field, when it could be determined.
    pub field: Option<String>,
}

impl Classification {
    fn new(kind: ErrorKind, message: impl Into<String>, field: Option<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            field,
        }
    }
}

/// Truncates `sql` to at most `max_len` characters, marking the cut.
pub fn sql_excerpt(sql: &str, max_len: usize) -> String {
    if sql.chars().count() <= max_len {
        return sql.to_string();
    }
    let keep = max_len.saturating_sub(3);
    let mut excerpt: String = sql.chars().take(keep).collect();
    excerpt.push_str("...");
    excerpt
}

/// Classifies a raw engine error.
///
/// `schema`, when given, lets a NOT NULL violation on a field the schema
/// declares optional be reported as [`ErrorKind::SchemaMismatch`].
/// `excerpt_len` bounds the SQL quoted in HTTP-coded messages.
///
/// # Examples
///
/// ```
/// use tabula_core::ErrorKind;
/// use tabula_db::classify::classify;
///
/// let c = classify(
///     "UNIQUE constraint failed: users.email",
///     "INSERT INTO users (email) VALUES (?)",
///     None,
///     200,
/// );
/// assert_eq!(c.kind, ErrorKind::DuplicateEntry);
/// assert_eq!(c.message, "Duplicate entry for field 'email'");
/// ```
pub fn classify(raw: &str, sql: &str, schema: Option<&Schema>, excerpt_len: usize) -> Classification {
    let lower = raw.to_lowercase();

    if lower.contains("unique") || lower.contains("duplicate") {
        let field = first_capture(&UNIQUE_FIELD, raw)
            .map(|f| column_name(&f))
            .or_else(|| {
                let sql_lower = sql.to_lowercase();
                DUPLICATE_HINTS
                    .iter()
                    .find(|hint| sql_lower.contains(*hint))
                    .map(|hint| (*hint).to_string())
            });
        let message = field.as_ref().map_or_else(
            || "Duplicate entry: a record with the same unique value already exists".to_string(),
            |f| format!("Duplicate entry for field '{f}'"),
        );
        return Classification::new(ErrorKind::DuplicateEntry, message, field);
    }

    if lower.contains("foreign key") {
        return Classification::new(
            ErrorKind::ForeignKeyViolation,
            "Foreign key constraint failed: the referenced record does not exist or is still referenced",
            None,
        );
    }

    if lower.contains("not null") || lower.contains("cannot be null") || lower.contains("null value in column") {
        let field = first_capture(&NOT_NULL_FIELD, raw).map(|f| column_name(&f));
        let optional_in_schema = field
            .as_deref()
            .and_then(|f| schema.and_then(|s| s.field(f)))
            .is_some_and(|f| !f.required);
        return match (field, optional_in_schema) {
            (Some(f), true) => Classification::new(
                ErrorKind::SchemaMismatch,
                format!(
                    "Schema mismatch: field '{f}' is optional in the schema but NOT NULL in the database table"
                ),
                Some(f),
            ),
            (Some(f), false) => Classification::new(
                ErrorKind::NotNullViolation,
                format!("Missing required field '{f}'"),
                Some(f),
            ),
            (None, _) => Classification::new(
                ErrorKind::NotNullViolation,
                "Missing value for a required field",
                None,
            ),
        };
    }

    if lower.contains("check constraint") {
        return Classification::new(
            ErrorKind::CheckConstraintViolation,
            format!("Check constraint failed: {raw}"),
            None,
        );
    }

    let status = first_capture(&HTTP_STATUS, raw)
        .and_then(|code| code.parse::<u16>().ok())
        .or_else(|| status_from_keywords(&lower));
    if let Some(status) = status {
        if let Some((kind, what)) = http_category(status) {
            let excerpt = sql_excerpt(sql, excerpt_len);
            return Classification::new(kind, format!("{what} (HTTP {status}). SQL: {excerpt}"), None);
        }
    }

    Classification::new(ErrorKind::Unclassified, raw, None)
}

fn status_from_keywords(lower: &str) -> Option<u16> {
    const KEYWORDS: [(&str, u16); 7] = [
        ("bad request", 400),
        ("unauthorized", 401),
        ("forbidden", 403),
        ("not found", 404),
        ("too many requests", 429),
        ("rate limit", 429),
        ("internal server error", 500),
    ];
    KEYWORDS
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
        .map(|(_, status)| *status)
}

fn http_category(status: u16) -> Option<(ErrorKind, &'static str)> {
    let category = match status {
        400 => (
            ErrorKind::MalformedRequest,
            "Malformed request: the remote engine rejected the statement",
        ),
        401 => (
            ErrorKind::Unauthorized,
            "Unauthorized: check the database credentials",
        ),
        403 => (
            ErrorKind::Forbidden,
            "Forbidden: the credentials lack access to this database",
        ),
        404 => (
            ErrorKind::NotFound,
            "Not found: the database or endpoint does not exist",
        ),
        429 => (
            ErrorKind::RateLimited,
            "Rate limited: too many requests to the remote engine",
        ),
        500..=599 => (
            ErrorKind::ServerError,
            "Server error: the remote engine failed to execute the statement",
        ),
        _ => return None,
    };
    Some(category)
}
