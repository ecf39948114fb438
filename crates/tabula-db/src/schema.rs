//! Table schemas.
//!
//! A [`Schema`] owns the ordered field definitions of one table plus the
//! table-level [`SchemaOptions`]. It is the single authority on which fields a
//! [`Record`] may carry, validates records before any SQL is issued, converts
//! engine rows back to logical values, and generates the table's DDL.
//!
//! Managed fields are appended at construction: `created_at`/`updated_at` when
//! timestamps are enabled and a nullable `deleted_at` when soft delete is
//! enabled. Fields already declared under those names are left untouched.

use std::collections::HashSet;

use tabula_core::{TabulaError, TabulaResult, ValidationError, ValidationErrors};

use crate::fields::{FieldDef, FieldDefault, FieldKind};
use crate::record::Record;
use crate::value::{now_timestamp, Value};

/// Creation timestamp column managed when timestamps are enabled.
pub const CREATED_AT: &str = "created_at";
/// Modification timestamp column managed when timestamps are enabled.
pub const UPDATED_AT: &str = "updated_at";
/// Deletion marker column managed when soft delete is enabled.
pub const DELETED_AT: &str = "deleted_at";

/// A multi-column index declared on a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeIndex {
    /// Explicit index name; generated from the table and columns when `None`.
    pub name: Option<String>,
    /// The indexed columns, in order.
    pub fields: Vec<String>,
    /// Whether the index enforces uniqueness.
    pub unique: bool,
}

impl CompositeIndex {
    /// A non-unique index over `fields`.
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: None,
            fields: fields.into_iter().map(Into::into).collect(),
            unique: false,
        }
    }

    /// A unique index over `fields`.
    pub fn unique<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            unique: true,
            ..Self::new(fields)
        }
    }

    /// Sets an explicit index name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Table-level schema options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaOptions {
    /// Manage `created_at` / `updated_at`.
    pub timestamps: bool,
    /// Manage a nullable `deleted_at` marker.
    pub soft_delete: bool,
    /// Keep soft-deleted rows visible to finds.
    pub paranoid: bool,
    /// Extra multi-column indexes.
    pub composite_indexes: Vec<CompositeIndex>,
}

impl SchemaOptions {
    /// Options with every feature off.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables managed timestamps.
    #[must_use]
    pub const fn timestamps(mut self) -> Self {
        self.timestamps = true;
        self
    }

    /// Enables soft delete.
    #[must_use]
    pub const fn soft_delete(mut self) -> Self {
        self.soft_delete = true;
        self
    }

    /// Keeps soft-deleted rows visible to finds.
    #[must_use]
    pub const fn paranoid(mut self) -> Self {
        self.paranoid = true;
        self
    }

    /// Adds a composite index.
    #[must_use]
    pub fn index(mut self, index: CompositeIndex) -> Self {
        self.composite_indexes.push(index);
        self
    }
}

/// Which fields [`Schema::validate_with`] checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    /// Every declared field; auto-increment fields are exempt from
    /// required-ness.
    Create,
    /// Only the fields present in the record.
    Partial,
}

/// A resolved index: name, columns and uniqueness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    /// The index name.
    pub name: String,
    /// The indexed columns.
    pub columns: Vec<String>,
    /// Whether the index is unique.
    pub unique: bool,
}

/// The field set and options of one table.
///
/// # Examples
///
/// ```
/// use tabula_db::fields::FieldDef;
/// use tabula_db::record;
/// use tabula_db::schema::{Schema, SchemaOptions};
///
/// let schema = Schema::new(
///     "users",
///     vec![
///         FieldDef::id("id"),
///         FieldDef::string("email").required().unique(),
///         FieldDef::number("age").min(13.0).max(120.0),
///     ],
///     SchemaOptions::default(),
/// )
/// .unwrap();
///
/// let errors = schema.validate(&record! { "email" => "a@b.com", "age" => 10 });
/// assert_eq!(errors.len(), 1);
/// assert_eq!(errors.errors()[0].message, "age must be at least 13");
/// ```
#[derive(Debug, Clone)]
pub struct Schema {
    table: String,
    fields: Vec<FieldDef>,
    options: SchemaOptions,
    pk_index: usize,
}

impl Schema {
    /// Builds a schema, appending managed fields and checking the declaration.
    ///
    /// # Errors
    ///
    /// Returns [`TabulaError::InvalidSchema`] when the table name is empty, a
    /// field name repeats, an auto-increment field is not the primary key or
    /// not numeric, the schema does not declare exactly one primary key, a
    /// required field's literal default fails its own validation, or a
    /// composite index names an undeclared field.
    pub fn new(
        table: impl Into<String>,
        fields: Vec<FieldDef>,
        options: SchemaOptions,
    ) -> TabulaResult<Self> {
        let table = table.into();
        if table.trim().is_empty() {
            return Err(TabulaError::InvalidSchema(
                "table name must not be empty".to_string(),
            ));
        }

        let mut fields = fields;
        let declared = |fields: &[FieldDef], name: &str| fields.iter().any(|f| f.name == name);
        if options.timestamps {
            for name in [CREATED_AT, UPDATED_AT] {
                if !declared(&fields, name) {
                    fields.push(FieldDef::date(name).default_with(now_timestamp));
                }
            }
        }
        if options.soft_delete && !declared(&fields, DELETED_AT) {
            fields.push(FieldDef::date(DELETED_AT));
        }

        let mut seen = HashSet::new();
        for field in &fields {
            if !seen.insert(field.name.as_str()) {
                return Err(TabulaError::InvalidSchema(format!(
                    "{table}: duplicate field '{}'",
                    field.name
                )));
            }
            check_field(&table, field)?;
        }

        let pks: Vec<usize> = fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.primary_key)
            .map(|(i, _)| i)
            .collect();
        let [pk_index] = *pks.as_slice() else {
            return Err(TabulaError::InvalidSchema(format!(
                "{table}: expected exactly one primary key, found {}",
                pks.len()
            )));
        };

        for index in &options.composite_indexes {
            if index.fields.is_empty() {
                return Err(TabulaError::InvalidSchema(format!(
                    "{table}: composite index without fields"
                )));
            }
            if let Some(missing) = index.fields.iter().find(|f| !seen.contains(f.as_str())) {
                return Err(TabulaError::InvalidSchema(format!(
                    "{table}: composite index references unknown field '{missing}'"
                )));
            }
        }

        Ok(Self {
            table,
            fields,
            options,
            pk_index,
        })
    }

    /// Returns the table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Returns the fields in declaration order, managed fields last.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Returns the table-level options.
    pub const fn options(&self) -> &SchemaOptions {
        &self.options
    }

    /// Looks up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns `true` if the schema declares `name`.
    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Returns the primary key field.
    pub fn pk_field(&self) -> &FieldDef {
        &self.fields[self.pk_index]
    }

    /// Returns the primary key column name.
    pub fn pk_name(&self) -> &str {
        &self.pk_field().name
    }

    /// Returns `true` if timestamps are managed.
    pub const fn timestamps(&self) -> bool {
        self.options.timestamps
    }

    /// Returns `true` if soft delete is enabled.
    pub const fn soft_delete(&self) -> bool {
        self.options.soft_delete
    }

    /// Returns `true` if finds should hide soft-deleted rows by default.
    pub const fn hides_deleted(&self) -> bool {
        self.options.soft_delete && !self.options.paranoid
    }

    // ── Validation ──────────────────────────────────────────────────────

    /// Validates a record about to be inserted.
    ///
    /// Never fails: the returned list is empty when the record is valid. Every
    /// violation is reported, in field-declaration order, followed by any
    /// undeclared fields.
    pub fn validate(&self, record: &Record) -> ValidationErrors {
        self.validate_with(record, ValidationMode::Create)
    }

    /// Validates only the fields present in `record` (partial updates).
    pub fn validate_partial(&self, record: &Record) -> ValidationErrors {
        self.validate_with(record, ValidationMode::Partial)
    }

    /// Validates a record in the given mode.
    pub fn validate_with(&self, record: &Record, mode: ValidationMode) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        for field in &self.fields {
            if mode == ValidationMode::Partial && !record.contains(&field.name) {
                continue;
            }
            match record.get(&field.name) {
                None | Some(Value::Null) => {
                    let exempt = mode == ValidationMode::Create && field.auto_increment;
                    if field.required && !exempt {
                        errors.push(ValidationError::new(
                            &field.name,
                            format!("{} is required", field.name),
                            "required",
                        ));
                    }
                }
                Some(value) => {
                    for error in check_value(field, value) {
                        errors.push(error);
                    }
                }
            }
        }
        for error in self.check_fields(record) {
            errors.push(error);
        }
        errors
    }

    /// Reports every field of `record` the schema does not declare.
    pub fn check_fields(&self, record: &Record) -> Vec<ValidationError> {
        record
            .fields()
            .filter(|name| !self.has_field(name))
            .map(|name| {
                ValidationError::new(
                    name,
                    format!("{name} is not a field of {}", self.table),
                    "unknown",
                )
            })
            .collect()
    }

    // ── Row conversion ──────────────────────────────────────────────────

    /// Converts a payload to its stored form: every non-null value in a json
    /// field is written as JSON text, so a plain string such as `"42"` is
    /// stored quoted and reads back as the same string.
    pub fn encode(&self, record: Record) -> Record {
        record
            .into_iter()
            .map(|(name, value)| {
                let value = match (self.field(&name).map(|f| f.kind), value) {
                    (Some(FieldKind::Json), Value::Null) => Value::Null,
                    (Some(FieldKind::Json), Value::Json(json)) => Value::Json(json),
                    (Some(FieldKind::Json), value) => Value::Json(value.to_json()),
                    (_, value) => value,
                };
                (name, value)
            })
            .collect()
    }

    /// Converts an engine row back to logical values: integer 0/1 becomes a
    /// boolean for boolean fields and JSON text is decoded for json fields.
    /// Decoded scalars take their natural variant; text that is not valid
    /// JSON is kept as a string.
    pub fn hydrate(&self, record: Record) -> Record {
        record
            .into_iter()
            .map(|(name, value)| {
                let value = match (self.field(&name).map(|f| f.kind), value) {
                    (Some(FieldKind::Boolean), Value::Int(i)) => Value::Bool(i != 0),
                    (Some(FieldKind::Json), Value::String(text)) => {
                        match serde_json::from_str::<serde_json::Value>(&text) {
                            Ok(json) => Value::from_json(json),
                            Err(_) => Value::String(text),
                        }
                    }
                    (_, value) => value,
                };
                (name, value)
            })
            .collect()
    }

    // ── DDL ─────────────────────────────────────────────────────────────

    /// Generates the `CREATE TABLE` statement.
    pub fn generate_create_table_sql(&self) -> String {
        let mut parts: Vec<String> = self.fields.iter().map(FieldDef::column_sql).collect();
        for field in &self.fields {
            if let Some(relation) = &field.relation {
                parts.push(format!(
                    "FOREIGN KEY ({}) REFERENCES {}({}) ON DELETE {} ON UPDATE {}",
                    field.name,
                    relation.target_table,
                    relation.target_field,
                    relation.on_delete.as_sql(),
                    relation.on_update.as_sql()
                ));
            }
        }
        format!("CREATE TABLE {} ({})", self.table, parts.join(", "))
    }

    /// Generates one `CREATE [UNIQUE] INDEX` per indexed field (primary and
    /// unique fields already have implicit indexes) and per composite index.
    pub fn generate_index_sql(&self) -> Vec<String> {
        self.indexes()
            .into_iter()
            .map(|index| {
                format!(
                    "CREATE {}INDEX {} ON {}({})",
                    if index.unique { "UNIQUE " } else { "" },
                    index.name,
                    self.table,
                    index.columns.join(", ")
                )
            })
            .collect()
    }

    /// Generates the `DROP TABLE` statement.
    pub fn generate_drop_table_sql(&self) -> String {
        format!("DROP TABLE IF EXISTS {}", self.table)
    }

    /// Resolves the indexes the DDL creates.
    pub fn indexes(&self) -> Vec<IndexSpec> {
        let single = self
            .fields
            .iter()
            .filter(|f| f.indexed && !f.primary_key && !f.unique)
            .map(|f| IndexSpec {
                name: format!("idx_{}_{}", self.table, f.name),
                columns: vec![f.name.clone()],
                unique: false,
            });
        let composite = self.options.composite_indexes.iter().map(|index| IndexSpec {
            name: index.name.clone().unwrap_or_else(|| {
                format!(
                    "{}_{}_{}",
                    if index.unique { "uidx" } else { "idx" },
                    self.table,
                    index.fields.join("_")
                )
            }),
            columns: index.fields.clone(),
            unique: index.unique,
        });
        single.chain(composite).collect()
    }
}

fn check_value(field: &FieldDef, value: &Value) -> Vec<ValidationError> {
    if !field.kind.accepts(value) {
        return vec![ValidationError::new(
            &field.name,
            format!("{} must be {}", field.name, field.kind.describe()),
            "type",
        )];
    }
    field
        .validators()
        .iter()
        .filter_map(|v| v.validate(&field.name, value).err())
        .collect()
}

fn check_field(table: &str, field: &FieldDef) -> TabulaResult<()> {
    if field.name.trim().is_empty() {
        return Err(TabulaError::InvalidSchema(format!(
            "{table}: field name must not be empty"
        )));
    }
    if field.auto_increment && !field.primary_key {
        return Err(TabulaError::InvalidSchema(format!(
            "{table}.{}: auto-increment requires primary key",
            field.name
        )));
    }
    if field.auto_increment && field.kind != FieldKind::Number {
        return Err(TabulaError::InvalidSchema(format!(
            "{table}.{}: auto-increment requires a number field",
            field.name
        )));
    }
    if let (true, Some(FieldDefault::Literal(value))) = (field.required, &field.default) {
        let problems = if value.is_null() {
            vec![format!("{} is required", field.name)]
        } else {
            check_value(field, value)
                .into_iter()
                .map(|e| e.message)
                .collect()
        };
        if !problems.is_empty() {
            return Err(TabulaError::InvalidSchema(format!(
                "{table}.{}: default value is invalid: {}",
                field.name,
                problems.join("; ")
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::ReferentialAction;
    use crate::record;

    fn users() -> Schema {
        Schema::new(
            "users",
            vec![
                FieldDef::id("id"),
                FieldDef::string("email").required().unique().max_length(255),
                FieldDef::number("age").min(13.0).max(120.0),
            ],
            SchemaOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_validate_reports_min_bound() {
        let errors = users().validate(&record! { "email" => "a@b.com", "age" => 10 });
        assert_eq!(errors.len(), 1);
        let err = &errors.errors()[0];
        assert_eq!(err.field, "age");
        assert_eq!(err.code, "min_value");
        assert!(err.message.contains("13"));
    }

    #[test]
    fn test_validate_collects_every_violation_in_order() {
        let errors = users().validate(&record! { "age" => "old", "nickname" => "x" });
        let fields: Vec<&str> = errors.errors().iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["email", "age", "nickname"]);
        let codes: Vec<&str> = errors.errors().iter().map(|e| e.code.as_str()).collect();
        assert_eq!(codes, vec!["required", "type", "unknown"]);
    }

    #[test]
    fn test_validate_auto_increment_exempt_on_create() {
        let errors = users().validate(&record! { "email" => "a@b.com" });
        assert!(errors.is_empty());
    }

    #[test]
    fn test_validate_partial_skips_absent_required() {
        let schema = users();
        assert!(schema.validate_partial(&record! { "age" => 30 }).is_empty());
        let errors = schema.validate_partial(&record! { "email" => Value::Null });
        assert_eq!(errors.errors()[0].code, "required");
    }

    #[test]
    fn test_managed_fields_appended_once() {
        let options = SchemaOptions::new().timestamps().soft_delete();
        let schema = Schema::new(
            "posts",
            vec![FieldDef::id("id"), FieldDef::date(CREATED_AT).required()],
            options,
        )
        .unwrap();
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["id", "created_at", "updated_at", "deleted_at"]);
        assert!(schema.field(CREATED_AT).unwrap().required);
        assert!(!schema.field(DELETED_AT).unwrap().required);
        assert!(schema.hides_deleted());
    }

    #[test]
    fn test_new_rejects_auto_increment_without_pk() {
        let err = Schema::new(
            "t",
            vec![FieldDef::id("id"), FieldDef::number("seq").auto_increment()],
            SchemaOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, TabulaError::InvalidSchema(_)));
    }

    #[test]
    fn test_new_requires_exactly_one_pk() {
        let none = Schema::new("t", vec![FieldDef::string("a")], SchemaOptions::default());
        assert!(none.unwrap_err().to_string().contains("found 0"));
        let two = Schema::new(
            "t",
            vec![FieldDef::id("a"), FieldDef::string("b").primary_key()],
            SchemaOptions::default(),
        );
        assert!(two.unwrap_err().to_string().contains("found 2"));
    }

    #[test]
    fn test_new_rejects_duplicates() {
        let err = Schema::new(
            "t",
            vec![FieldDef::id("id"), FieldDef::string("a"), FieldDef::text("a")],
            SchemaOptions::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate field 'a'"));
    }

    #[test]
    fn test_new_rejects_invalid_required_default() {
        let err = Schema::new(
            "t",
            vec![
                FieldDef::id("id"),
                FieldDef::string("code").required().min_length(3).default("x"),
            ],
            SchemaOptions::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("default value is invalid"));

        let ok = Schema::new(
            "t",
            vec![
                FieldDef::id("id"),
                FieldDef::string("code").required().min_length(3).default("abc"),
            ],
            SchemaOptions::default(),
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn test_new_rejects_unknown_composite_field() {
        let err = Schema::new(
            "t",
            vec![FieldDef::id("id")],
            SchemaOptions::new().index(CompositeIndex::new(["id", "nope"])),
        )
        .unwrap_err();
        assert!(err.to_string().contains("'nope'"));
    }

    #[test]
    fn test_create_table_sql() {
        let schema = Schema::new(
            "posts",
            vec![
                FieldDef::id("id"),
                FieldDef::string("title").required().max_length(200),
                FieldDef::number("user_id")
                    .required()
                    .references("users", "id")
                    .on_delete(ReferentialAction::Cascade),
            ],
            SchemaOptions::new().timestamps(),
        )
        .unwrap();
        assert_eq!(
            schema.generate_create_table_sql(),
            "CREATE TABLE posts (id INTEGER PRIMARY KEY AUTOINCREMENT, \
             title VARCHAR(200) NOT NULL, user_id INTEGER NOT NULL, \
             created_at DATETIME DEFAULT CURRENT_TIMESTAMP, \
             updated_at DATETIME DEFAULT CURRENT_TIMESTAMP, \
             FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE ON UPDATE NO ACTION)"
        );
    }

    #[test]
    fn test_index_sql() {
        let schema = Schema::new(
            "posts",
            vec![
                FieldDef::id("id").indexed(),
                FieldDef::string("slug").unique().indexed(),
                FieldDef::number("user_id").indexed(),
                FieldDef::string("status"),
            ],
            SchemaOptions::new()
                .index(CompositeIndex::new(["user_id", "status"]))
                .index(CompositeIndex::unique(["user_id", "slug"]))
                .index(CompositeIndex::new(["status"]).named("posts_by_status")),
        )
        .unwrap();
        assert_eq!(
            schema.generate_index_sql(),
            vec![
                "CREATE INDEX idx_posts_user_id ON posts(user_id)",
                "CREATE INDEX idx_posts_user_id_status ON posts(user_id, status)",
                "CREATE UNIQUE INDEX uidx_posts_user_id_slug ON posts(user_id, slug)",
                "CREATE INDEX posts_by_status ON posts(status)",
            ]
        );
        assert_eq!(schema.generate_drop_table_sql(), "DROP TABLE IF EXISTS posts");
    }

    #[test]
    fn test_hydrate() {
        let schema = Schema::new(
            "t",
            vec![
                FieldDef::id("id"),
                FieldDef::boolean("active"),
                FieldDef::json("meta"),
                FieldDef::string("raw"),
            ],
            SchemaOptions::default(),
        )
        .unwrap();
        let row = record! {
            "id" => 1,
            "active" => 1,
            "meta" => r#"{"a":1}"#,
            "raw" => r#"{"a":1}"#,
        };
        let hydrated = schema.hydrate(row);
        assert_eq!(hydrated.get("active"), Some(&Value::Bool(true)));
        assert_eq!(
            hydrated.get("meta"),
            Some(&Value::Json(serde_json::json!({"a": 1})))
        );
        assert_eq!(hydrated.get("raw"), Some(&Value::from(r#"{"a":1}"#)));
    }

    #[test]
    fn test_encode_quotes_scalars_in_json_fields() {
        let schema = Schema::new(
            "t",
            vec![FieldDef::id("id"), FieldDef::json("meta"), FieldDef::string("raw")],
            SchemaOptions::default(),
        )
        .unwrap();

        let encoded = schema.encode(record! { "meta" => "42", "raw" => "42" });
        assert_eq!(encoded.get("meta"), Some(&Value::Json(serde_json::json!("42"))));
        assert_eq!(encoded.get("raw"), Some(&Value::from("42")));

        let stored: Record = encoded.into_iter().map(|(k, v)| (k, v.into_param())).collect();
        let back = schema.hydrate(stored);
        assert_eq!(back.get("meta"), Some(&Value::from("42")));

        let untouched = schema.encode(record! { "meta" => Value::Null });
        assert_eq!(untouched.get("meta"), Some(&Value::Null));
    }
}
