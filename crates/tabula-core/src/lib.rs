//! # tabula-core
//!
//! Core types shared by every tabula crate: the error taxonomy, ORM settings,
//! settings loading, and logging setup. This crate knows nothing about SQL.
//!
//! ## Modules
//!
//! - [`error`] - Error types, the execution error taxonomy, and result aliases
//! - [`settings`] - ORM settings (chunk sizes, parameter budget, logging)
//! - [`settings_loader`] - Loading settings from TOML, JSON, and the environment
//! - [`logging`] - Tracing-based logging integration

pub mod error;
pub mod logging;
pub mod settings;
pub mod settings_loader;

// Re-export the most commonly used types at the crate root.
pub use error::{
    ErrorKind, QueryError, TabulaError, TabulaResult, ValidationError, ValidationErrors,
};
pub use settings::{BulkSettings, Settings};
