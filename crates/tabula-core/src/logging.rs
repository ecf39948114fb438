//! Logging integration for tabula.
//!
//! Provides helpers for configuring [`tracing`]-based logging from
//! [`Settings`](crate::settings::Settings) and for creating per-operation spans.

use crate::settings::Settings;

/// Sets up the global tracing subscriber based on the given settings.
///
/// The filter is read from `settings.log_level` (e.g. "debug",
/// "tabula_db=debug"). In debug mode a pretty, human-readable format is used;
/// otherwise a structured JSON format is used. Calling this more than once is
/// harmless: only the first subscriber is installed.
pub fn setup_logging(settings: &Settings) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&settings.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    if settings.debug {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(true)
            .with_line_number(true)
            .pretty()
            .try_init()
            .ok();
    } else {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .try_init()
            .ok();
    }
}

/// Creates a tracing span for one record operation on a table.
///
/// # Examples
///
/// ```
/// use tabula_core::logging::operation_span;
///
/// let span = operation_span("users", "bulk_create");
/// let _guard = span.enter();
/// tracing::info!("processing chunk");
/// ```
pub fn operation_span(table: &str, operation: &'static str) -> tracing::Span {
    tracing::info_span!("operation", table = table, op = operation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_logging_is_idempotent() {
        let settings = Settings {
            log_level: "not a valid filter [".to_string(),
            ..Settings::default()
        };
        setup_logging(&settings);
        setup_logging(&Settings::default());
    }

    #[test]
    fn test_operation_span_enter() {
        let span = operation_span("users", "create");
        let _guard = span.enter();
        tracing::debug!("inside span");
    }
}
