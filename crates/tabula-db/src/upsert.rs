//! Find-or-create with race recovery.
//!
//! The remote engine offers no transactions, so an upsert is a find followed
//! by either an update or an insert. Another caller can insert the same
//! unique key between the two; the insert then fails with a duplicate-entry
//! error, which is treated as a lost race: the row is looked up again and the
//! update path runs instead.

use tabula_core::{TabulaError, TabulaResult};
use tracing::warn;

use crate::model::Model;
use crate::query::Filter;
use crate::record::Record;
use crate::schema::CREATED_AT;
use crate::value::Value;

/// The two calling conventions of [`Model::upsert`].
#[derive(Debug, Clone, PartialEq)]
pub enum UpsertRequest {
    /// Match on the values `data` holds for `unique_fields`; insert or
    /// update with `data`.
    ByUniqueFields {
        /// The payload for both paths.
        data: Record,
        /// The fields whose values identify the row.
        unique_fields: Vec<String>,
    },
    /// Match on `filter`; insert `create` or apply `update`.
    Explicit {
        /// Identifies the row.
        filter: Filter,
        /// The payload inserted when no row matches.
        create: Record,
        /// The payload applied when a row matches.
        update: Record,
    },
}

impl UpsertRequest {
    /// Builds a [`UpsertRequest::ByUniqueFields`] request.
    pub fn by_unique_fields<I, S>(data: Record, unique_fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::ByUniqueFields {
            data,
            unique_fields: unique_fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Builds a [`UpsertRequest::Explicit`] request.
    pub const fn explicit(filter: Filter, create: Record, update: Record) -> Self {
        Self::Explicit {
            filter,
            create,
            update,
        }
    }

    fn into_parts(self) -> (Filter, Record, Record) {
        match self {
            Self::ByUniqueFields {
                data,
                unique_fields,
            } => {
                let mut filter = Filter::new();
                for field in &unique_fields {
                    if let Some(value) = data.get(field).filter(|v| !v.is_null()) {
                        filter = filter.eq(field.as_str(), value.clone());
                    }
                }
                (filter, data.clone(), data)
            }
            Self::Explicit {
                filter,
                create,
                update,
            } => (filter, create, update),
        }
    }
}

/// What an upsert did.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertOutcome {
    /// The record as stored.
    pub record: Record,
    /// A new row was inserted.
    pub created: bool,
    /// An existing row was updated.
    pub updated: bool,
}

impl UpsertOutcome {
    const fn created(record: Record) -> Self {
        Self {
            record,
            created: true,
            updated: false,
        }
    }

    const fn updated(record: Record) -> Self {
        Self {
            record,
            created: false,
            updated: true,
        }
    }

    const fn found(record: Record) -> Self {
        Self {
            record,
            created: false,
            updated: false,
        }
    }
}

impl Model {
    /// Updates the matching record or creates a new one.
    ///
    /// # Errors
    ///
    /// [`TabulaError::InvalidArgument`] when the request identifies no row
    /// (no unique values present, or an empty filter); otherwise any error of
    /// [`create`](Model::create) or [`update_by_id`](Model::update_by_id)
    /// other than a recovered duplicate entry.
    pub async fn upsert(&self, request: UpsertRequest) -> TabulaResult<UpsertOutcome> {
        let (filter, create, update) = request.into_parts();
        if filter.is_empty() {
            return Err(TabulaError::InvalidArgument(format!(
                "{}: upsert needs at least one value to match on",
                self.table()
            )));
        }

        if let Some(existing) = self.find_one(filter.clone()).await? {
            return self.apply_update(existing, update).await;
        }
        match self.create(create).await {
            Ok(record) => Ok(UpsertOutcome::created(record)),
            Err(err) if err.is_duplicate_entry() => {
                warn!(table = self.table(), "upsert lost an insert race, retrying as update");
                match self.find_one(filter).await? {
                    Some(existing) => self.apply_update(existing, update).await,
                    None => Err(err),
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Updates the record with primary key `id`, or creates it with that
    /// identifier.
    ///
    /// For an auto-increment key the identifier must be a positive integer;
    /// otherwise it must match the key's declared type.
    pub async fn upsert_by_id(&self, id: impl Into<Value>, data: Record) -> TabulaResult<UpsertOutcome> {
        let id = id.into();
        self.check_identifier(&id)?;
        let pk = self.schema().pk_name().to_string();
        let filter = Filter::new().eq(pk.as_str(), id.clone());

        let mut create = data.clone();
        create.set(pk.as_str(), id);
        self.upsert(UpsertRequest::explicit(filter, create, data)).await
    }

    /// Returns the record matching `filter`, creating it from `data` if none
    /// exists. Never updates.
    pub async fn create_if_not_exists(&self, filter: Filter, data: Record) -> TabulaResult<UpsertOutcome> {
        if filter.is_empty() {
            return Err(TabulaError::InvalidArgument(format!(
                "{}: create_if_not_exists needs at least one value to match on",
                self.table()
            )));
        }
        if let Some(existing) = self.find_one(filter.clone()).await? {
            return Ok(UpsertOutcome::found(existing));
        }
        match self.create(data).await {
            Ok(record) => Ok(UpsertOutcome::created(record)),
            Err(err) if err.is_duplicate_entry() => {
                warn!(table = self.table(), "create_if_not_exists lost an insert race");
                match self.find_one(filter).await? {
                    Some(existing) => Ok(UpsertOutcome::found(existing)),
                    None => Err(err),
                }
            }
            Err(err) => Err(err),
        }
    }

    fn check_identifier(&self, id: &Value) -> TabulaResult<()> {
        let pk = self.schema().pk_field();
        let valid = if pk.auto_increment {
            matches!(id, Value::Int(n) if *n > 0)
        } else {
            !id.is_null() && pk.kind.accepts(id)
        };
        if valid {
            Ok(())
        } else {
            Err(TabulaError::InvalidArgument(format!(
                "{}: {id} is not a valid identifier for {} ({})",
                self.table(),
                pk.name,
                if pk.auto_increment {
                    "a positive integer is required"
                } else {
                    pk.kind.describe()
                },
            )))
        }
    }

    async fn apply_update(&self, existing: Record, update: Record) -> TabulaResult<UpsertOutcome> {
        let pk = self.schema().pk_name();
        let id = existing.get(pk).cloned().ok_or_else(|| {
            TabulaError::InvalidArgument(format!(
                "{}: matched row carries no '{pk}' column",
                self.table()
            ))
        })?;
        let assignable = update
            .fields()
            .any(|f| f != pk && f != "id" && f != CREATED_AT);
        if !assignable {
            return Ok(UpsertOutcome::found(existing));
        }
        let record = self.update_by_id(id.clone(), update).await?.ok_or_else(|| {
            TabulaError::FailedToCreate(format!(
                "{}: row {id} disappeared during upsert",
                self.table()
            ))
        })?;
        Ok(UpsertOutcome::updated(record))
    }
}
