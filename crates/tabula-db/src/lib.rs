//! # tabula-db
//!
//! Schema-driven query compilation and record operations. A [`Schema`]
//! describes one table; a [`QueryBuilder`] compiles filter, sort and paging
//! specifications into parameterized SQL; a [`Model`] runs create, read,
//! update, delete, upsert, aggregate and bulk operations against any
//! [`RemoteExecutor`].
//!
//! ## Architecture
//!
//! Every operation is a one-shot pipeline: hooks and validation run locally,
//! the compiled `(sql, params)` pair is sent to the executor, and any engine
//! failure is passed through [`classify`](classify::classify) before it
//! reaches the caller. There is no connection state and no transaction.
//!
//! ## Module Overview
//!
//! - [`value`] - The tagged [`Value`] enum and timestamp helpers
//! - [`record`] - The ordered [`Record`] map and the [`record!`] macro
//! - [`fields`] - Field definitions ([`FieldDef`]) and column types
//! - [`validators`] - Length, range, choice and custom validators
//! - [`schema`] - [`Schema`], record validation, and DDL generation
//! - [`query`] - The [`Filter`] DSL, [`QueryBuilder`], and SQL compilers
//! - [`classify`] - Classification of raw engine errors
//! - [`executor`] - The [`RemoteExecutor`] contract and wire envelope
//! - [`hooks`] - Per-model lifecycle hooks
//! - [`model`] - CRUD operations
//! - [`upsert`] - Find-or-create with race recovery
//! - [`aggregate`] - SUM/AVG/MIN/MAX/COUNT, grouping, percentiles
//! - [`bulk`] - Chunked bulk operations and batch inserts
//! - [`migration`] - Create-table migration artifacts

// - struct_excessive_bools: FieldDef and SchemaOptions carry flag sets
// - doc_markdown: SQL keywords in docs are not code items
// - missing_const_for_fn: builder setters stay non-const for a uniform API
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::result_large_err)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::format_push_string)]
#![allow(clippy::significant_drop_tightening)]

pub mod aggregate;
pub mod bulk;
pub mod classify;
pub mod executor;
pub mod fields;
pub mod hooks;
pub mod migration;
pub mod model;
pub mod query;
pub mod record;
pub mod schema;
pub mod upsert;
pub mod validators;
pub mod value;

// Re-export the most commonly used types at the crate root.
pub use aggregate::{Aggregate, AggregateFn, AggregateOptions, Stats};
pub use bulk::{BulkItemError, BulkOptions, BulkResult};
pub use classify::{classify, Classification};
pub use executor::{ExecResponse, QueryMeta, QueryResult, RemoteError, RemoteExecutor};
pub use fields::{FieldDef, FieldKind, ReferentialAction};
pub use hooks::ModelHooks;
pub use migration::MigrationArtifact;
pub use model::{FindOptions, Model, Page, UpdateResult};
pub use query::{Filter, Operator, OrderBy, OrderSpec, QueryBuilder, SortDirection, WhereCondition};
pub use record::{FromValue, Record};
pub use schema::{CompositeIndex, Schema, SchemaOptions};
pub use upsert::{UpsertOutcome, UpsertRequest};
pub use validators::Validator;
pub use value::Value;
