//! # tabula
//!
//! A schema-driven ORM for SQL engines reached over a request/response
//! boundary. Declare a table once as a [`Schema`](db::Schema); a
//! [`Model`](db::Model) then validates records, compiles parameterized SQL,
//! sends it through a [`RemoteExecutor`](db::RemoteExecutor), and classifies
//! any failure the engine reports.
//!
//! This is the meta-crate that re-exports the sub-crates. Depend on
//! `tabula-core` or `tabula-db` directly for finer-grained control.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tabula::prelude::*;
//!
//! async fn example(executor: Arc<dyn RemoteExecutor>) -> TabulaResult<()> {
//!     let schema = Schema::new(
//!         "users",
//!         vec![
//!             FieldDef::id("id"),
//!             FieldDef::string("email").required().unique(),
//!             FieldDef::number("age").min(13.0),
//!         ],
//!         SchemaOptions::new().timestamps(),
//!     )?;
//!     let users = Model::new(schema, executor);
//!     let user = users.create(record! { "email" => "ada@example.com", "age" => 36 }).await?;
//!     let adults = users.count(Filter::new().gte("age", 18)).await?;
//!     println!("{user:?} {adults}");
//!     Ok(())
//! }
//! ```

/// Settings, logging setup, and error types.
pub use tabula_core as core;

/// Schemas, query compilation, and record operations.
pub use tabula_db as db;

/// Testing tools: an in-memory SQLite executor and fixtures.
#[cfg(feature = "testing")]
pub use tabula_test as test;

/// Implementors of [`RemoteExecutor`](db::RemoteExecutor) need this attribute.
pub use async_trait::async_trait;
pub use {chrono, serde_json, tokio, tracing};

/// The types most programs need.
pub mod prelude {
    pub use tabula_core::logging::setup_logging;
    pub use tabula_core::{ErrorKind, QueryError, Settings, TabulaError, TabulaResult};
    pub use tabula_db::{
        record, Aggregate, AggregateOptions, BulkOptions, BulkResult, CompositeIndex, FieldDef,
        Filter, FindOptions, MigrationArtifact, Model, ModelHooks, Page, QueryBuilder, Record,
        ReferentialAction, RemoteError, RemoteExecutor, Schema, SchemaOptions, UpsertOutcome,
        UpsertRequest, Value,
    };
}
