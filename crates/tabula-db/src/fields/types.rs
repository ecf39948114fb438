//! Field type definitions.
//!
//! A [`FieldDef`] describes one column: its logical [`FieldKind`], the
//! constraints checked by [`Schema::validate`](crate::schema::Schema::validate),
//! its default, and an optional foreign-key [`Relation`]. Field definitions are
//! built with chained builder methods and handed to
//! [`Schema::new`](crate::schema::Schema::new).

use std::fmt;
use std::sync::Arc;

use crate::validators::{
    ChoicesValidator, FnValidator, MaxLengthValidator, MaxValueValidator, MinLengthValidator,
    MinValueValidator, Validator,
};
use crate::value::{canonical_timestamp, now_timestamp, parse_timestamp, Value};

/// The logical type of a field, determining its column type and which
/// values it accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Short text; `VARCHAR(n)` when a max length is declared.
    String,
    /// Integer or floating-point number.
    Number,
    /// True/false.
    Boolean,
    /// Date and time, stored as a canonical timestamp string.
    Date,
    /// Unbounded text.
    Text,
    /// A JSON document stored as text.
    Json,
}

impl FieldKind {
    /// Returns the column type used in generated DDL.
    pub fn column_type(self, max_length: Option<usize>) -> String {
        match self {
            Self::String => max_length.map_or_else(|| "TEXT".to_string(), |n| format!("VARCHAR({n})")),
            Self::Number => "INTEGER".to_string(),
            Self::Boolean => "BOOLEAN".to_string(),
            Self::Date => "DATETIME".to_string(),
            Self::Text | Self::Json => "TEXT".to_string(),
        }
    }

    /// Returns `true` if a non-null value conforms to this kind.
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String | Self::Text => matches!(value, Value::String(_)),
            Self::Number => matches!(value, Value::Int(_) | Value::Float(_)),
            Self::Boolean => matches!(value, Value::Bool(_)),
            Self::Date => match value {
                Value::Timestamp(_) => true,
                Value::String(s) => parse_timestamp(s).is_some(),
                _ => false,
            },
            Self::Json => true,
        }
    }

    /// The value injected into an optional field left unset on create when
    /// no default was declared.
    pub fn fallback(self) -> Value {
        match self {
            Self::String | Self::Text => Value::String(String::new()),
            Self::Number => Value::Int(0),
            Self::Boolean => Value::Bool(false),
            Self::Date => now_timestamp(),
            Self::Json => Value::Null,
        }
    }

    /// The noun used in type-mismatch messages.
    pub const fn describe(self) -> &'static str {
        match self {
            Self::String | Self::Text => "a string",
            Self::Number => "a number",
            Self::Boolean => "a boolean",
            Self::Date => "a valid date",
            Self::Json => "JSON",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Text => "text",
            Self::Json => "json",
        };
        f.write_str(name)
    }
}

/// Referential action for `ON DELETE` / `ON UPDATE` clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferentialAction {
    /// Propagate the change to referencing rows.
    Cascade,
    /// Set the referencing column to NULL.
    SetNull,
    /// Set the referencing column to its default.
    SetDefault,
    /// Reject the change while references exist.
    Restrict,
    /// Take no action.
    #[default]
    NoAction,
}

impl ReferentialAction {
    /// Returns the SQL keyword(s) for this action.
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
            Self::Restrict => "RESTRICT",
            Self::NoAction => "NO ACTION",
        }
    }
}

/// A foreign-key reference from a field to a column of another table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    /// The referenced table.
    pub target_table: String,
    /// The referenced column.
    pub target_field: String,
    /// Action when the referenced row is deleted.
    pub on_delete: ReferentialAction,
    /// Action when the referenced key is updated.
    pub on_update: ReferentialAction,
}

/// A function producing a default value at insert time.
pub type DefaultProducer = Arc<dyn Fn() -> Value + Send + Sync>;

/// A field default: a literal or a producer evaluated per insert.
#[derive(Clone)]
pub enum FieldDefault {
    /// A constant value, also rendered into DDL.
    Literal(Value),
    /// A function evaluated for every insert.
    Producer(DefaultProducer),
}

impl fmt::Debug for FieldDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(v) => f.debug_tuple("Literal").field(v).finish(),
            Self::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

/// Complete definition of a field, including constraints and default.
///
/// # Examples
///
/// ```
/// use tabula_db::fields::{FieldDef, FieldKind};
///
/// let age = FieldDef::number("age").min(13.0).max(120.0);
/// assert_eq!(age.kind, FieldKind::Number);
/// assert!(!age.required);
/// ```
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// The column name.
    pub name: String,
    /// The logical type.
    pub kind: FieldKind,
    /// Whether a value must be present.
    pub required: bool,
    /// Whether a UNIQUE constraint is applied.
    pub unique: bool,
    /// Whether this field is the primary key.
    pub primary_key: bool,
    /// Whether the engine generates the value.
    pub auto_increment: bool,
    /// Default injected on create.
    pub default: Option<FieldDefault>,
    /// Minimum string length, in characters.
    pub min_length: Option<usize>,
    /// Maximum string length, in characters.
    pub max_length: Option<usize>,
    /// Minimum numeric value.
    pub min: Option<f64>,
    /// Maximum numeric value.
    pub max: Option<f64>,
    /// Allowed values.
    pub enum_values: Option<Vec<Value>>,
    /// Custom validator run after the built-in checks.
    pub validator: Option<Arc<FnValidator>>,
    /// Foreign-key reference.
    pub relation: Option<Relation>,
    /// Whether a non-unique index should be created.
    pub indexed: bool,
}

impl FieldDef {
    /// Creates an optional, unconstrained field of the given kind.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            unique: false,
            primary_key: false,
            auto_increment: false,
            default: None,
            min_length: None,
            max_length: None,
            min: None,
            max: None,
            enum_values: None,
            validator: None,
            relation: None,
            indexed: false,
        }
    }

    /// Shorthand for a [`FieldKind::String`] field.
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::String)
    }

    /// Shorthand for a [`FieldKind::Number`] field.
    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Number)
    }

    /// Shorthand for a [`FieldKind::Boolean`] field.
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Boolean)
    }

    /// Shorthand for a [`FieldKind::Date`] field.
    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Date)
    }

    /// Shorthand for a [`FieldKind::Text`] field.
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Text)
    }

    /// Shorthand for a [`FieldKind::Json`] field.
    pub fn json(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Json)
    }

    /// An auto-increment integer primary key.
    pub fn id(name: impl Into<String>) -> Self {
        Self::number(name).primary_key().auto_increment()
    }

    /// Marks this field as required.
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Marks this field as having a UNIQUE constraint.
    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Marks this field as the primary key.
    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Lets the engine generate this field's value.
    #[must_use]
    pub const fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Requests a non-unique index on this field.
    #[must_use]
    pub const fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    /// Sets a literal default value.
    #[must_use]
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(FieldDefault::Literal(value.into()));
        self
    }

    /// Sets a default produced at insert time.
    #[must_use]
    pub fn default_with(mut self, producer: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        self.default = Some(FieldDefault::Producer(Arc::new(producer)));
        self
    }

    /// Sets the minimum string length.
    #[must_use]
    pub const fn min_length(mut self, min_length: usize) -> Self {
        self.min_length = Some(min_length);
        self
    }

    /// Sets the maximum string length.
    #[must_use]
    pub const fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    /// Sets the minimum numeric value.
    #[must_use]
    pub const fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    /// Sets the maximum numeric value.
    #[must_use]
    pub const fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    /// Restricts the field to a set of allowed values.
    #[must_use]
    pub fn enum_values<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.enum_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Adds a custom validator returning an error message on failure.
    #[must_use]
    pub fn validator(
        mut self,
        check: impl Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.validator = Some(Arc::new(FnValidator::new(check)));
        self
    }

    /// Declares a foreign key to `target_table.target_field`.
    #[must_use]
    pub fn references(mut self, target_table: impl Into<String>, target_field: impl Into<String>) -> Self {
        self.relation = Some(Relation {
            target_table: target_table.into(),
            target_field: target_field.into(),
            on_delete: ReferentialAction::default(),
            on_update: ReferentialAction::default(),
        });
        self
    }

    /// Sets the `ON DELETE` action of the relation.
    #[must_use]
    pub fn on_delete(mut self, action: ReferentialAction) -> Self {
        if let Some(relation) = self.relation.as_mut() {
            relation.on_delete = action;
        }
        self
    }

    /// Sets the `ON UPDATE` action of the relation.
    #[must_use]
    pub fn on_update(mut self, action: ReferentialAction) -> Self {
        if let Some(relation) = self.relation.as_mut() {
            relation.on_update = action;
        }
        self
    }

    /// Returns `true` if this field carries a foreign key.
    pub const fn is_relation(&self) -> bool {
        self.relation.is_some()
    }

    /// Evaluates the default, normalizing timestamps to the canonical string
    /// form.
    pub fn resolve_default(&self) -> Option<Value> {
        let value = match self.default.as_ref()? {
            FieldDefault::Literal(v) => v.clone(),
            FieldDefault::Producer(produce) => produce(),
        };
        Some(match value {
            Value::Timestamp(ts) => Value::String(canonical_timestamp(&ts)),
            other => other,
        })
    }

    /// Returns the constraint validators in the order they are checked.
    pub fn validators(&self) -> Vec<Box<dyn Validator>> {
        let mut validators: Vec<Box<dyn Validator>> = Vec::new();
        if let Some(n) = self.min_length {
            validators.push(Box::new(MinLengthValidator::new(n)));
        }
        if let Some(n) = self.max_length {
            validators.push(Box::new(MaxLengthValidator::new(n)));
        }
        if let Some(n) = self.min {
            validators.push(Box::new(MinValueValidator::new(n)));
        }
        if let Some(n) = self.max {
            validators.push(Box::new(MaxValueValidator::new(n)));
        }
        if let Some(values) = &self.enum_values {
            validators.push(Box::new(ChoicesValidator::new(values.clone())));
        }
        if let Some(custom) = &self.validator {
            validators.push(Box::new(Arc::clone(custom)));
        }
        validators
    }

    /// Returns the column definition used in `CREATE TABLE`.
    pub fn column_sql(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.kind.column_type(self.max_length));
        if self.primary_key {
            sql.push_str(" PRIMARY KEY");
            if self.auto_increment {
                sql.push_str(" AUTOINCREMENT");
            }
        } else if self.required {
            sql.push_str(" NOT NULL");
        }
        if self.unique && !self.primary_key {
            sql.push_str(" UNIQUE");
        }
        if let Some(default) = self.default_sql() {
            sql.push_str(" DEFAULT ");
            sql.push_str(&default);
        }
        sql
    }

    /// Returns the `DEFAULT` fragment, if the default is representable in DDL.
    ///
    /// A produced default on a date field becomes `CURRENT_TIMESTAMP`; any
    /// other produced default is left to insert-time injection.
    pub fn default_sql(&self) -> Option<String> {
        match self.default.as_ref()? {
            FieldDefault::Producer(_) => {
                (self.kind == FieldKind::Date).then(|| "CURRENT_TIMESTAMP".to_string())
            }
            FieldDefault::Literal(value) => Some(literal_sql(value)),
        }
    }
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn literal_sql(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::String(s) => quote(s),
        Value::Timestamp(ts) => quote(&canonical_timestamp(ts)),
        Value::Json(j) => quote(&j.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_def_new_defaults() {
        let f = FieldDef::string("first_name");
        assert_eq!(f.name, "first_name");
        assert_eq!(f.kind, FieldKind::String);
        assert!(!f.required);
        assert!(!f.primary_key);
        assert!(f.default.is_none());
        assert!(f.relation.is_none());
        assert!(f.validators().is_empty());
    }

    #[test]
    fn test_field_def_builder() {
        let f = FieldDef::string("email")
            .required()
            .unique()
            .indexed()
            .min_length(3)
            .max_length(254);
        assert!(f.required && f.unique && f.indexed);
        assert_eq!(f.max_length, Some(254));
        assert_eq!(f.validators().len(), 2);
    }

    #[test]
    fn test_id_shorthand() {
        let f = FieldDef::id("id");
        assert!(f.primary_key && f.auto_increment);
        assert_eq!(f.column_sql(), "id INTEGER PRIMARY KEY AUTOINCREMENT");
    }

    #[test]
    fn test_column_types() {
        assert_eq!(FieldKind::String.column_type(Some(50)), "VARCHAR(50)");
        assert_eq!(FieldKind::String.column_type(None), "TEXT");
        assert_eq!(FieldKind::Number.column_type(None), "INTEGER");
        assert_eq!(FieldKind::Boolean.column_type(None), "BOOLEAN");
        assert_eq!(FieldKind::Date.column_type(None), "DATETIME");
        assert_eq!(FieldKind::Json.column_type(None), "TEXT");
    }

    #[test]
    fn test_column_sql_constraints() {
        let f = FieldDef::string("email").required().unique().max_length(100);
        assert_eq!(f.column_sql(), "email VARCHAR(100) NOT NULL UNIQUE");

        let f = FieldDef::string("status").default("draft");
        assert_eq!(f.column_sql(), "status TEXT DEFAULT 'draft'");

        let f = FieldDef::boolean("active").default(true);
        assert_eq!(f.column_sql(), "active BOOLEAN DEFAULT TRUE");
    }

    #[test]
    fn test_default_sql_producers() {
        let date = FieldDef::date("seen_at").default_with(now_timestamp);
        assert_eq!(date.default_sql().as_deref(), Some("CURRENT_TIMESTAMP"));

        let token = FieldDef::string("token").default_with(|| Value::from("abc"));
        assert_eq!(token.default_sql(), None);
        assert_eq!(token.column_sql(), "token TEXT");
    }

    #[test]
    fn test_default_sql_escapes_quotes() {
        let f = FieldDef::string("motto").default("it's");
        assert_eq!(f.default_sql().as_deref(), Some("'it''s'"));
    }

    #[test]
    fn test_resolve_default_normalizes_timestamps() {
        use chrono::TimeZone;
        let ts = chrono::Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        let f = FieldDef::date("published_at").default(ts);
        assert_eq!(
            f.resolve_default(),
            Some(Value::from("2024-01-15T00:00:00.000Z"))
        );
        assert_eq!(FieldDef::number("n").resolve_default(), None);
    }

    #[test]
    fn test_accepts() {
        assert!(FieldKind::String.accepts(&Value::from("x")));
        assert!(!FieldKind::String.accepts(&Value::Int(1)));
        assert!(FieldKind::Number.accepts(&Value::Float(1.5)));
        assert!(!FieldKind::Boolean.accepts(&Value::Int(1)));
        assert!(FieldKind::Date.accepts(&Value::from("2024-01-15")));
        assert!(!FieldKind::Date.accepts(&Value::from("soon")));
        assert!(FieldKind::Json.accepts(&Value::Int(3)));
    }

    #[test]
    fn test_fallbacks() {
        assert_eq!(FieldKind::Text.fallback(), Value::from(""));
        assert_eq!(FieldKind::Number.fallback(), Value::Int(0));
        assert_eq!(FieldKind::Boolean.fallback(), Value::Bool(false));
        assert_eq!(FieldKind::Json.fallback(), Value::Null);
        assert!(FieldKind::Date.fallback().as_timestamp().is_some());
    }

    #[test]
    fn test_relation_actions() {
        let f = FieldDef::number("user_id")
            .references("users", "id")
            .on_delete(ReferentialAction::Cascade);
        let relation = f.relation.as_ref().unwrap();
        assert_eq!(relation.target_table, "users");
        assert_eq!(relation.on_delete.as_sql(), "CASCADE");
        assert_eq!(relation.on_update.as_sql(), "NO ACTION");
        assert!(f.is_relation());
    }

    #[test]
    fn test_on_delete_without_relation_is_ignored() {
        let f = FieldDef::number("n").on_delete(ReferentialAction::Cascade);
        assert!(f.relation.is_none());
    }
}
