//! Chunked bulk operations with per-item failure accounting.
//!
//! `bulk_create`, `bulk_update` and `bulk_upsert` run the regular per-record
//! pipelines (hooks and validation included) item by item. `bulk_delete`
//! deletes by primary key with one `IN (...)` statement per chunk.
//! `batch_insert` is the fast path: one multi-row INSERT per chunk, no hooks,
//! and a failed statement marks every row of its chunk as failed.
//!
//! With `continue_on_error` (the default) failures are collected into
//! [`BulkResult::errors`]; otherwise the first failure aborts the batch with
//! [`TabulaError::BulkAborted`]. Nothing is rolled back either way.

use tabula_core::logging::operation_span;
use tabula_core::{TabulaError, TabulaResult};
use tracing::{debug, info, warn, Instrument};

use crate::model::Model;
use crate::query::compiler::{compile_bulk_insert, compile_insert};
use crate::query::Filter;
use crate::record::Record;
use crate::upsert::UpsertRequest;
use crate::value::Value;

/// Options shared by the bulk operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkOptions {
    /// Items per chunk; the operation's configured size when `None`.
    pub chunk_size: Option<usize>,
    /// Collect failures instead of aborting on the first one.
    pub continue_on_error: bool,
    /// Validate rows in `batch_insert`. The other operations always validate.
    pub validate: bool,
}

impl Default for BulkOptions {
    fn default() -> Self {
        Self {
            chunk_size: None,
            continue_on_error: true,
            validate: true,
        }
    }
}

impl BulkOptions {
    /// Creates the default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the chunk size.
    #[must_use]
    pub const fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = Some(size);
        self
    }

    /// Aborts on the first failure.
    #[must_use]
    pub const fn stop_on_error(mut self) -> Self {
        self.continue_on_error = false;
        self
    }

    /// Skips validation in `batch_insert`.
    #[must_use]
    pub const fn skip_validation(mut self) -> Self {
        self.validate = false;
        self
    }
}

/// One failed item.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkItemError {
    /// Index of the item in the caller's list.
    pub index: usize,
    /// The failure message.
    pub error: String,
    /// The item, when it was a record.
    pub data: Option<Record>,
}

/// Accounting of a bulk operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkResult {
    /// Rows inserted.
    pub created: usize,
    /// Rows updated.
    pub updated: usize,
    /// Rows deleted.
    pub deleted: usize,
    /// Failed items, in item order.
    pub errors: Vec<BulkItemError>,
}

impl BulkResult {
    /// Returns the number of failed items.
    pub fn failed(&self) -> usize {
        self.errors.len()
    }

    /// Returns `true` if no item failed.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    const fn completed(&self) -> usize {
        self.created + self.updated + self.deleted
    }

    /// Records a failure, or converts it into an abort.
    fn fail(
        &mut self,
        options: &BulkOptions,
        index: usize,
        error: TabulaError,
        data: Option<Record>,
    ) -> TabulaResult<()> {
        if !options.continue_on_error {
            return Err(TabulaError::BulkAborted {
                index,
                completed: self.completed(),
                source: Box::new(error),
            });
        }
        warn!(index, error = %error, "bulk item failed");
        self.errors.push(BulkItemError {
            index,
            error: error.to_string(),
            data,
        });
        Ok(())
    }
}

fn chunk_len(requested: Option<usize>, configured: usize) -> usize {
    requested.unwrap_or(configured).max(1)
}

impl Model {
    /// Creates every record through [`create`](Model::create).
    pub async fn bulk_create(&self, items: Vec<Record>, options: BulkOptions) -> TabulaResult<BulkResult> {
        let size = chunk_len(options.chunk_size, self.settings().bulk.create_chunk_size);
        async {
            let mut result = BulkResult::default();
            for (chunk_no, chunk) in items.chunks(size).enumerate() {
                for (offset, item) in chunk.iter().enumerate() {
                    let index = chunk_no * size + offset;
                    match self.create(item.clone()).await {
                        Ok(_) => result.created += 1,
                        Err(err) => result.fail(&options, index, err, Some(item.clone()))?,
                    }
                }
                debug!(chunk = chunk_no, rows = chunk.len(), "chunk processed");
            }
            info!(created = result.created, failed = result.failed(), "bulk_create finished");
            Ok::<_, TabulaError>(result)
        }
        .instrument(operation_span(self.table(), "bulk_create"))
        .await
    }

    /// Updates every record by its primary key through
    /// [`update_by_id`](Model::update_by_id). Each item must carry the key;
    /// the remaining fields are the payload.
    pub async fn bulk_update(&self, items: Vec<Record>, options: BulkOptions) -> TabulaResult<BulkResult> {
        let size = chunk_len(options.chunk_size, self.settings().bulk.update_chunk_size);
        let pk = self.schema().pk_name().to_string();
        async {
            let mut result = BulkResult::default();
            for (chunk_no, chunk) in items.chunks(size).enumerate() {
                for (offset, item) in chunk.iter().enumerate() {
                    let index = chunk_no * size + offset;
                    let mut data = item.clone();
                    let outcome = match data.remove(&pk).filter(|id| !id.is_null()) {
                        Some(id) => self.update_by_id(id.clone(), data).await.and_then(|found| {
                            found.map(|_| ()).ok_or_else(|| {
                                TabulaError::InvalidArgument(format!(
                                    "{}: no record with {pk} = {id}",
                                    self.table()
                                ))
                            })
                        }),
                        None => Err(TabulaError::InvalidArgument(format!(
                            "{}: bulk_update item without '{pk}'",
                            self.table()
                        ))),
                    };
                    match outcome {
                        Ok(()) => result.updated += 1,
                        Err(err) => result.fail(&options, index, err, Some(item.clone()))?,
                    }
                }
                debug!(chunk = chunk_no, rows = chunk.len(), "chunk processed");
            }
            info!(updated = result.updated, failed = result.failed(), "bulk_update finished");
            Ok::<_, TabulaError>(result)
        }
        .instrument(operation_span(self.table(), "bulk_update"))
        .await
    }

    /// Deletes the records with the given primary keys, one
    /// `DELETE ... WHERE pk IN (...)` per chunk. A failed statement marks
    /// every identifier of its chunk as failed.
    pub async fn bulk_delete(&self, ids: Vec<Value>, options: BulkOptions) -> TabulaResult<BulkResult> {
        let size = chunk_len(options.chunk_size, self.settings().bulk.delete_chunk_size);
        let pk = self.schema().pk_name().to_string();
        async {
            let mut result = BulkResult::default();
            for (chunk_no, chunk) in ids.chunks(size).enumerate() {
                let filter = Filter::new().is_in(pk.as_str(), chunk.iter().cloned());
                match self.delete(filter).await {
                    Ok(n) => result.deleted += usize::try_from(n).unwrap_or(usize::MAX),
                    Err(err) => {
                        let message = err.to_string();
                        let first = chunk_no * size;
                        if !options.continue_on_error {
                            return Err(TabulaError::BulkAborted {
                                index: first,
                                completed: result.completed(),
                                source: Box::new(err),
                            });
                        }
                        warn!(chunk = chunk_no, error = %message, "bulk_delete chunk failed");
                        result.errors.extend(chunk.iter().enumerate().map(|(offset, id)| {
                            BulkItemError {
                                index: first + offset,
                                error: message.clone(),
                                data: Some(Record::new().with(pk.as_str(), id.clone())),
                            }
                        }));
                    }
                }
            }
            info!(deleted = result.deleted, failed = result.failed(), "bulk_delete finished");
            Ok::<_, TabulaError>(result)
        }
        .instrument(operation_span(self.table(), "bulk_delete"))
        .await
    }

    /// Upserts every record through [`upsert`](Model::upsert), matching on
    /// `unique_fields`.
    pub async fn bulk_upsert(
        &self,
        items: Vec<Record>,
        unique_fields: &[&str],
        options: BulkOptions,
    ) -> TabulaResult<BulkResult> {
        let size = chunk_len(options.chunk_size, self.settings().bulk.upsert_chunk_size);
        async {
            let mut result = BulkResult::default();
            for (chunk_no, chunk) in items.chunks(size).enumerate() {
                for (offset, item) in chunk.iter().enumerate() {
                    let index = chunk_no * size + offset;
                    let request = UpsertRequest::by_unique_fields(item.clone(), unique_fields.iter().copied());
                    match self.upsert(request).await {
                        Ok(outcome) if outcome.created => result.created += 1,
                        Ok(_) => result.updated += 1,
                        Err(err) => result.fail(&options, index, err, Some(item.clone()))?,
                    }
                }
                debug!(chunk = chunk_no, rows = chunk.len(), "chunk processed");
            }
            info!(
                created = result.created,
                updated = result.updated,
                failed = result.failed(),
                "bulk_upsert finished"
            );
            Ok::<_, TabulaError>(result)
        }
        .instrument(operation_span(self.table(), "bulk_upsert"))
        .await
    }

    /// Inserts rows with one multi-row INSERT per chunk.
    ///
    /// Defaults are applied to every row; validation runs unless
    /// [`BulkOptions::skip_validation`] is set. Hooks never run. Rows per
    /// statement are capped so that `rows x columns` stays within
    /// `max_bound_parameters`, with at least one row per statement.
    pub async fn batch_insert(&self, rows: Vec<Record>, options: BulkOptions) -> TabulaResult<BulkResult> {
        let configured = chunk_len(options.chunk_size, self.settings().bulk.insert_chunk_size);
        async {
            let mut result = BulkResult::default();
            let mut ready: Vec<(usize, Record)> = Vec::with_capacity(rows.len());
            for (index, row) in rows.into_iter().enumerate() {
                let mut row = row;
                self.prepare_insert(&mut row);
                if options.validate {
                    if let Err(err) = self.schema().validate(&row).into_result() {
                        result.fail(&options, index, err, Some(row))?;
                        continue;
                    }
                }
                ready.push((index, self.schema().encode(row)));
            }

            let mut columns: Vec<String> = Vec::new();
            for (_, row) in &ready {
                for field in row.fields() {
                    if !columns.iter().any(|c| c == field) {
                        columns.push(field.to_string());
                    }
                }
            }
            let budget = self.settings().max_bound_parameters / columns.len().max(1);
            let size = configured.min(budget).max(1);
            debug!(columns = columns.len(), rows_per_statement = size, "batch layout");

            for chunk in ready.chunks(size) {
                let records: Vec<Record> = chunk.iter().map(|(_, row)| row.clone()).collect();
                let (sql, params) = if columns.is_empty() {
                    compile_insert(self.table(), &Record::new())
                } else {
                    compile_bulk_insert(self.table(), &columns, &records)
                };
                let statements = if columns.is_empty() { records.len() } else { 1 };
                let mut outcome = Ok(());
                for _ in 0..statements {
                    if let Err(err) = self.execute(sql.clone(), params.clone()).await {
                        outcome = Err(err);
                        break;
                    }
                }
                match outcome {
                    Ok(()) => result.created += chunk.len(),
                    Err(err) => {
                        let message = err.to_string();
                        let first = chunk[0].0;
                        if !options.continue_on_error {
                            return Err(TabulaError::BulkAborted {
                                index: first,
                                completed: result.completed(),
                                source: Box::new(err),
                            });
                        }
                        warn!(rows = chunk.len(), error = %message, "batch_insert chunk failed");
                        result.errors.extend(chunk.iter().map(|(index, row)| BulkItemError {
                            index: *index,
                            error: message.clone(),
                            data: Some(row.clone()),
                        }));
                    }
                }
            }
            result.errors.sort_by_key(|e| e.index);
            info!(created = result.created, failed = result.failed(), "batch_insert finished");
            Ok::<_, TabulaError>(result)
        }
        .instrument(operation_span(self.table(), "batch_insert"))
        .await
    }
}
