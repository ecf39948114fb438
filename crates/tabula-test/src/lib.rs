//! # tabula-test
//!
//! Testing tools for tabula. Provides an in-memory SQLite executor that
//! stands in for the remote engine, an executor that records statements and
//! replays scripted responses, statement counting assertions, and fixture
//! schemas.
//!
//! ## Module Overview
//!
//! - [`sqlite`] - [`SqliteExecutor`], a real engine in memory
//! - [`recording`] - [`RecordingExecutor`] for SQL assertions and failure injection
//! - [`assert_statements`] - Round-trip counting assertions
//! - [`fixtures`] - The `users`, `posts` and `products` schemas

#![allow(clippy::missing_panics_doc)]
#![allow(clippy::new_without_default)]

pub mod assert_statements;
pub mod fixtures;
pub mod recording;
pub mod sqlite;

pub use assert_statements::{assert_max_statements, assert_num_statements};
pub use fixtures::{model_on, posts_schema, products_schema, sqlite_model, users_schema};
pub use recording::{RecordedStatement, RecordingExecutor};
pub use sqlite::SqliteExecutor;
