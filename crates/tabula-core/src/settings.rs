//! Settings for tabula.
//!
//! [`Settings`] holds the knobs the record layer reads at run time: logging,
//! the SQL excerpt length used in classified error messages, the bound
//! parameter budget of the remote engine, and the chunk sizes of bulk
//! operations. Every field has a default, so a partial TOML or JSON document
//! is enough to configure it (see [`settings_loader`](crate::settings_loader)).

use serde::{Deserialize, Serialize};

/// Chunk sizes used by bulk operations.
///
/// A chunk bounds how many items are handled per round of requests. The
/// defaults trade round-trip count against per-request payload size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkSettings {
    /// Items per chunk for `bulk_create`.
    pub create_chunk_size: usize,
    /// Items per chunk for `bulk_update`.
    pub update_chunk_size: usize,
    /// Identifiers per DELETE statement for `bulk_delete`.
    pub delete_chunk_size: usize,
    /// Items per chunk for `bulk_upsert`.
    pub upsert_chunk_size: usize,
    /// Rows per chunk for `batch_insert`, before the parameter budget applies.
    pub insert_chunk_size: usize,
}

impl Default for BulkSettings {
    fn default() -> Self {
        Self {
            create_chunk_size: 100,
            update_chunk_size: 100,
            delete_chunk_size: 500,
            upsert_chunk_size: 50,
            insert_chunk_size: 100,
        }
    }
}

/// The complete set of tabula settings.
///
/// # Examples
///
/// ```
/// use tabula_core::settings::Settings;
///
/// let settings = Settings::default();
/// assert_eq!(settings.sql_excerpt_len, 200);
/// assert_eq!(settings.bulk.delete_chunk_size, 500);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // ── Logging ──────────────────────────────────────────────────────

    /// Pretty, human-readable logs when `true`; JSON logs otherwise.
    pub debug: bool,
    /// The log filter (e.g. "info", "tabula_db=debug").
    pub log_level: String,

    // ── Execution ────────────────────────────────────────────────────

    /// Maximum number of SQL characters quoted in classified error messages.
    pub sql_excerpt_len: usize,
    /// Maximum number of bound parameters the remote engine accepts per
    /// statement. Multi-row inserts are split to stay under it.
    pub max_bound_parameters: usize,

    // ── Bulk ─────────────────────────────────────────────────────────

    /// Chunk sizes for bulk operations.
    pub bulk: BulkSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: true,
            log_level: "info".to_string(),
            sql_excerpt_len: 200,
            max_bound_parameters: 100,
            bulk: BulkSettings::default(),
        }
    }
}
