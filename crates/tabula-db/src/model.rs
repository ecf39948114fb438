//! Record operations.
//!
//! A [`Model`] binds a [`Schema`] to a [`RemoteExecutor`] and runs the
//! create/read/update/delete pipelines against it. Each call is a one-shot
//! request pipeline: hooks and validation run locally, the compiled
//! statement is the only suspension point, and failures reported by the
//! engine are classified before they reach the caller.
//!
//! Upsert, aggregate and bulk operations live in their own modules as further
//! `impl Model` blocks.
//!
//! ```no_run
//! use std::sync::Arc;
//! use tabula_db::executor::RemoteExecutor;
//! use tabula_db::fields::FieldDef;
//! use tabula_db::model::{FindOptions, Model};
//! use tabula_db::query::Filter;
//! use tabula_db::record;
//! use tabula_db::schema::{Schema, SchemaOptions};
//!
//! # async fn demo(executor: Arc<dyn RemoteExecutor>) -> tabula_core::TabulaResult<()> {
//! let schema = Schema::new(
//!     "users",
//!     vec![FieldDef::id("id"), FieldDef::string("email").required().unique()],
//!     SchemaOptions::new().timestamps(),
//! )?;
//! let users = Model::new(schema, executor);
//! let alice = users.create(record! { "email" => "alice@example.com" }).await?;
//! let found = users
//!     .find_all(FindOptions::new().filter(Filter::new().eq("email", "alice@example.com")))
//!     .await?;
//! assert_eq!(found.len(), 1);
//! # let _ = alice;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use tabula_core::{QueryError, Settings, TabulaError, TabulaResult};
use tracing::{debug, warn};

use crate::classify::classify;
use crate::executor::{QueryMeta, QueryResult, RemoteExecutor};
use crate::hooks::ModelHooks;
use crate::query::compiler::compile_insert;
use crate::query::{Filter, OrderSpec, QueryBuilder};
use crate::record::Record;
use crate::schema::{Schema, CREATED_AT, DELETED_AT, UPDATED_AT};
use crate::validators::Validator as _;
use crate::value::{now_timestamp, Value};

/// Options for `find_*`, `count` and `paginate`.
///
/// `limit`/`take` and `offset`/`skip` are synonyms.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// Conditions every returned row satisfies.
    pub filter: Filter,
    /// Columns to select; empty selects all columns.
    pub select: Vec<String>,
    /// Result ordering.
    pub order: OrderSpec,
    /// Maximum number of rows.
    pub limit: Option<u64>,
    /// Rows to skip.
    pub offset: Option<u64>,
    /// Include soft-deleted rows.
    pub with_deleted: bool,
}

impl FindOptions {
    /// Creates options matching every row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the filter.
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    /// Sets the selected columns.
    #[must_use]
    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the ordering from a string, a list of strings, or a list of
    /// `(field, direction)` pairs.
    #[must_use]
    pub fn order_by(mut self, order: impl Into<OrderSpec>) -> Self {
        self.order = order.into();
        self
    }

    /// Sets the maximum number of rows.
    #[must_use]
    pub const fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Synonym for [`limit`](Self::limit).
    #[must_use]
    pub const fn take(self, take: u64) -> Self {
        self.limit(take)
    }

    /// Sets the number of rows to skip.
    #[must_use]
    pub const fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Synonym for [`offset`](Self::offset).
    #[must_use]
    pub const fn skip(self, skip: u64) -> Self {
        self.offset(skip)
    }

    /// Includes soft-deleted rows.
    #[must_use]
    pub const fn with_deleted(mut self) -> Self {
        self.with_deleted = true;
        self
    }
}

impl From<Filter> for FindOptions {
    fn from(filter: Filter) -> Self {
        Self::new().filter(filter)
    }
}

/// The outcome of an UPDATE.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateResult {
    /// Rows changed.
    pub changes: u64,
    /// Metadata reported by the engine.
    pub meta: QueryMeta,
}

impl UpdateResult {
    /// Returns `true` if no row matched.
    pub const fn is_empty(&self) -> bool {
        self.changes == 0
    }
}

/// One page of records.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// The records on this page.
    pub records: Vec<Record>,
    /// Rows matching the query across all pages.
    pub total: u64,
    /// The 1-based page number.
    pub page: u64,
    /// The page size.
    pub per_page: u64,
    /// The number of pages.
    pub total_pages: u64,
}

impl Page {
    /// Returns `true` if a later page exists.
    pub const fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    /// Returns `true` if an earlier page exists.
    pub const fn has_previous(&self) -> bool {
        self.page > 1
    }
}

/// Record operations on one table.
#[derive(Clone)]
pub struct Model {
    schema: Arc<Schema>,
    executor: Arc<dyn RemoteExecutor>,
    hooks: ModelHooks,
    settings: Arc<Settings>,
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("table", &self.schema.table())
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

impl Model {
    /// Creates a model with default settings and no hooks.
    pub fn new(schema: Schema, executor: Arc<dyn RemoteExecutor>) -> Self {
        Self {
            schema: Arc::new(schema),
            executor,
            hooks: ModelHooks::default(),
            settings: Arc::new(Settings::default()),
        }
    }

    /// Replaces the settings.
    #[must_use]
    pub fn with_settings(mut self, settings: impl Into<Arc<Settings>>) -> Self {
        self.settings = settings.into();
        self
    }

    /// Replaces the hook registry.
    #[must_use]
    pub fn with_hooks(mut self, hooks: ModelHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Returns the schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Returns the settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Returns the hook registry.
    pub const fn hooks(&self) -> &ModelHooks {
        &self.hooks
    }

    /// Returns the table name.
    pub fn table(&self) -> &str {
        self.schema.table()
    }

    /// Returns an empty builder on this model's table.
    pub fn query(&self) -> QueryBuilder {
        QueryBuilder::new(self.schema.table())
    }

    // ── Execution ───────────────────────────────────────────────────────

    /// Executes one statement, classifying any failure.
    ///
    /// Parameters are converted to their wire form first: timestamps become
    /// canonical strings and JSON values become JSON text.
    pub async fn execute(&self, sql: String, params: Vec<Value>) -> TabulaResult<QueryResult> {
        let params: Vec<Value> = params.into_iter().map(Value::into_param).collect();
        debug!(table = self.table(), sql = %sql, params = params.len(), "executing statement");
        match self.executor.execute(&sql, &params).await {
            Ok(result) => Ok(result),
            Err(err) => {
                let classified = classify(
                    err.message(),
                    &sql,
                    Some(&self.schema),
                    self.settings.sql_excerpt_len,
                );
                warn!(
                    table = self.table(),
                    kind = %classified.kind,
                    raw = err.message(),
                    "statement failed"
                );
                Err(QueryError {
                    kind: classified.kind,
                    message: classified.message,
                    raw_message: err.0,
                    field: classified.field,
                    sql,
                    params: params.iter().map(ToString::to_string).collect(),
                    table: self.table().to_string(),
                }
                .into())
            }
        }
    }

    /// Runs a SELECT and hydrates the rows, without hooks.
    pub async fn fetch(&self, query: &QueryBuilder) -> TabulaResult<Vec<Record>> {
        let (sql, params) = query.build();
        let result = self.execute(sql, params).await?;
        Ok(result
            .rows
            .into_iter()
            .map(|row| self.schema.hydrate(row))
            .collect())
    }

    /// Runs `build_count()` for `query` and reads the count.
    pub(crate) async fn fetch_count(&self, query: &QueryBuilder) -> TabulaResult<u64> {
        let (sql, params) = query.build_count();
        let result = self.execute(sql, params).await?;
        match result.first() {
            Some(row) => row.get_as::<u64>("count"),
            None => Ok(0),
        }
    }

    /// Reads one row by primary key, bypassing hooks and the soft-delete
    /// filter.
    pub(crate) async fn fetch_by_id(&self, id: Value) -> TabulaResult<Option<Record>> {
        let mut query = self.query();
        query.where_eq(self.schema.pk_name(), id).limit(1);
        Ok(self.fetch(&query).await?.into_iter().next())
    }

    // ── Argument checks ─────────────────────────────────────────────────

    fn check_column(&self, column: &str, context: &str) -> TabulaResult<()> {
        if self.schema.has_field(column) {
            Ok(())
        } else {
            Err(TabulaError::InvalidArgument(format!(
                "{}: unknown field '{column}' in {context}",
                self.table()
            )))
        }
    }

    pub(crate) fn check_filter(&self, filter: &Filter) -> TabulaResult<()> {
        filter
            .conditions()
            .iter()
            .try_for_each(|c| self.check_column(&c.field, "filter"))
    }

    /// Compiles find options into a builder, before hooks.
    pub(crate) fn query_for(&self, options: &FindOptions) -> TabulaResult<QueryBuilder> {
        self.check_filter(&options.filter)?;
        for column in &options.select {
            self.check_column(column, "select")?;
        }
        for order in options.order.orders() {
            self.check_column(&order.column, "order_by")?;
        }

        let mut query = self.query();
        if !options.select.is_empty() {
            query.select(options.select.iter().cloned());
        }
        query.filter(&options.filter);
        if self.schema.hides_deleted() && !options.with_deleted {
            query.where_null(DELETED_AT);
        }
        if !options.order.is_empty() {
            query.order_by(options.order.clone());
        }
        if let Some(limit) = options.limit {
            query.limit(limit);
        }
        if let Some(offset) = options.offset {
            query.offset(offset);
        }
        Ok(query)
    }

    // ── Create ──────────────────────────────────────────────────────────

    /// Fills defaults, fallbacks and timestamps on a payload about to be
    /// inserted.
    ///
    /// A declared default (literal or produced) wins. An optional field with
    /// no default gets its kind's fallback when the field's own validators
    /// accept it. Identifiers, unique fields, relations and `deleted_at` never
    /// get a fallback.
    pub fn prepare_insert(&self, data: &mut Record) {
        for field in self.schema.fields() {
            if !data.is_unset(&field.name) {
                continue;
            }
            if let Some(value) = field.resolve_default() {
                data.set(&field.name, value);
                continue;
            }
            let skip = field.required
                || field.primary_key
                || field.auto_increment
                || field.unique
                || field.is_relation()
                || field.name == DELETED_AT;
            if skip {
                continue;
            }
            let fallback = field.kind.fallback();
            let accepted = fallback.is_null()
                || field
                    .validators()
                    .iter()
                    .all(|v| v.validate(&field.name, &fallback).is_ok());
            if accepted {
                data.set(&field.name, fallback);
            }
        }
        if self.schema.timestamps() {
            for name in [CREATED_AT, UPDATED_AT] {
                if data.is_unset(name) {
                    data.set(name, now_timestamp());
                }
            }
        }
    }

    /// Inserts a record and returns it as stored.
    ///
    /// Pipeline: `before_create` hook, defaults, validation (no SQL is issued
    /// when it fails), INSERT, re-fetch by identifier, `after_create` hook.
    ///
    /// # Errors
    ///
    /// [`TabulaError::Validation`] with every violation;
    /// [`TabulaError::FailedToCreate`] when the engine reports no identifier
    /// or the row cannot be re-read; [`TabulaError::Query`] for classified
    /// engine failures; any hook error.
    pub async fn create(&self, data: Record) -> TabulaResult<Record> {
        let mut data = data;
        self.hooks.run_before_create(&mut data)?;
        self.prepare_insert(&mut data);
        self.schema.validate(&data).into_result()?;
        let data = self.schema.encode(data);

        let (sql, params) = compile_insert(self.table(), &data);
        let result = self.execute(sql, params).await?;

        let id = match data.get(self.schema.pk_name()) {
            Some(id) if !id.is_null() => id.clone(),
            _ => result.meta.last_insert_id.map(Value::Int).ok_or_else(|| {
                TabulaError::FailedToCreate(format!(
                    "{}: the executor reported no identifier for the inserted row",
                    self.table()
                ))
            })?,
        };
        let record = self.fetch_by_id(id.clone()).await?.ok_or_else(|| {
            TabulaError::FailedToCreate(format!(
                "{}: row {id} not found after insert",
                self.table()
            ))
        })?;

        self.hooks.run_after_create(&record)?;
        Ok(record)
    }

    // ── Read ────────────────────────────────────────────────────────────

    /// Returns every record matching `options`.
    pub async fn find_all(&self, options: impl Into<FindOptions>) -> TabulaResult<Vec<Record>> {
        let mut query = self.query_for(&options.into())?;
        self.hooks.run_before_find(&mut query)?;
        let mut records = self.fetch(&query).await?;
        self.hooks.run_after_find(&mut records)?;
        Ok(records)
    }

    /// Returns the first record matching `options`.
    pub async fn find_one(&self, options: impl Into<FindOptions>) -> TabulaResult<Option<Record>> {
        let options = options.into().limit(1);
        Ok(self.find_all(options).await?.into_iter().next())
    }

    /// Returns the record with primary key `id`.
    pub async fn find_by_id(&self, id: impl Into<Value>) -> TabulaResult<Option<Record>> {
        let filter = Filter::new().eq(self.schema.pk_name(), id);
        self.find_one(filter).await
    }

    /// Counts the records matching `filter`.
    pub async fn count(&self, filter: Filter) -> TabulaResult<u64> {
        let query = self.query_for(&FindOptions::from(filter))?;
        self.fetch_count(&query).await
    }

    /// Returns `true` if any record matches `filter`.
    pub async fn exists(&self, filter: Filter) -> TabulaResult<bool> {
        Ok(self.count(filter).await? > 0)
    }

    /// Returns one page of the records matching `options`.
    ///
    /// `page` is 1-based; page 0 is treated as page 1. Any limit or offset in
    /// `options` is replaced by the page window.
    ///
    /// # Errors
    ///
    /// Returns [`TabulaError::InvalidArgument`] if `per_page` is zero.
    pub async fn paginate(
        &self,
        page: u64,
        per_page: u64,
        options: impl Into<FindOptions>,
    ) -> TabulaResult<Page> {
        if per_page == 0 {
            return Err(TabulaError::InvalidArgument(
                "per_page must be at least 1".to_string(),
            ));
        }
        let page = page.max(1);
        let mut query = self.query_for(&options.into())?;
        self.hooks.run_before_find(&mut query)?;

        let mut count_query = query.clone();
        count_query.clear_paging();
        let total = self.fetch_count(&count_query).await?;

        query.paginate(page, per_page);
        let mut records = self.fetch(&query).await?;
        self.hooks.run_after_find(&mut records)?;

        Ok(Page {
            records,
            total,
            page,
            per_page,
            total_pages: total.div_ceil(per_page),
        })
    }

    // ── Update ──────────────────────────────────────────────────────────

    /// Updates every record matching `filter`.
    ///
    /// The primary key, `id` and `created_at` are stripped from the payload
    /// and `updated_at` is stamped when timestamps are enabled. Only fields
    /// present in the payload are validated. `after_update` does not fire on
    /// this path.
    ///
    /// # Errors
    ///
    /// [`TabulaError::NoFieldsToUpdate`] when nothing assignable remains;
    /// [`TabulaError::Validation`]; [`TabulaError::Query`]; hook errors.
    pub async fn update(&self, data: Record, filter: Filter) -> TabulaResult<UpdateResult> {
        let (mut data, mut filter) = (data, filter);
        self.hooks.run_before_update(&mut data, &mut filter)?;

        data.remove(self.schema.pk_name());
        data.remove("id");
        data.remove(CREATED_AT);
        if data.is_empty() {
            return Err(TabulaError::NoFieldsToUpdate);
        }
        if self.schema.timestamps() {
            data.set(UPDATED_AT, now_timestamp());
        }
        self.schema.validate_partial(&data).into_result()?;
        self.check_filter(&filter)?;
        let data = self.schema.encode(data);

        let mut query = self.query();
        query.filter(&filter);
        let (sql, params) = query.build_update(&data)?;
        let result = self.execute(sql, params).await?;
        Ok(UpdateResult {
            changes: result.meta.changes,
            meta: result.meta,
        })
    }

    /// Updates the record with primary key `id` and returns it as stored,
    /// or `None` if it does not exist. Fires `after_update`.
    pub async fn update_by_id(&self, id: impl Into<Value>, data: Record) -> TabulaResult<Option<Record>> {
        let id = id.into();
        let filter = Filter::new().eq(self.schema.pk_name(), id.clone());
        self.update(data, filter).await?;
        let record = self.fetch_by_id(id).await?;
        if let Some(record) = &record {
            self.hooks.run_after_update(record)?;
        }
        Ok(record)
    }

    // ── Delete ──────────────────────────────────────────────────────────

    /// Deletes every record matching `filter` and returns the count.
    pub async fn delete(&self, filter: Filter) -> TabulaResult<u64> {
        let mut filter = filter;
        self.hooks.run_before_delete(&mut filter)?;
        self.check_filter(&filter)?;

        let mut query = self.query();
        query.filter(&filter);
        let (sql, params) = query.build_delete();
        let changes = self.execute(sql, params).await?.meta.changes;

        self.hooks.run_after_delete(changes)?;
        Ok(changes)
    }

    /// Deletes the record with primary key `id`. Returns `true` if a row was
    /// deleted.
    pub async fn delete_by_id(&self, id: impl Into<Value>) -> TabulaResult<bool> {
        let filter = Filter::new().eq(self.schema.pk_name(), id);
        Ok(self.delete(filter).await? > 0)
    }

    // ── Soft delete ─────────────────────────────────────────────────────

    fn require_soft_delete(&self, operation: &str) -> TabulaResult<()> {
        if self.schema.soft_delete() {
            Ok(())
        } else {
            Err(TabulaError::InvalidArgument(format!(
                "{}: {operation} requires a soft-delete schema",
                self.table()
            )))
        }
    }

    /// Stamps `deleted_at` on every live record matching `filter`.
    pub async fn soft_delete(&self, filter: Filter) -> TabulaResult<u64> {
        self.require_soft_delete("soft_delete")?;
        let data = Record::new().with(DELETED_AT, now_timestamp());
        let result = self.update(data, filter.is_null(DELETED_AT)).await?;
        Ok(result.changes)
    }

    /// Clears `deleted_at` on every soft-deleted record matching `filter`.
    pub async fn restore(&self, filter: Filter) -> TabulaResult<u64> {
        self.require_soft_delete("restore")?;
        let data = Record::new().with(DELETED_AT, Value::Null);
        let result = self.update(data, filter.is_not_null(DELETED_AT)).await?;
        Ok(result.changes)
    }
}
