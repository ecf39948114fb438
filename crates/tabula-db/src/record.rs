//! Records: ordered field-name → [`Value`] maps.
//!
//! A [`Record`] is what callers hand to create/update and what every read
//! returns. Insertion order is preserved so compiled column lists follow the
//! order in which fields were set (for prepared records, the schema's
//! declaration order). The schema decides which names a record may carry;
//! see [`Schema::check_fields`](crate::schema::Schema::check_fields).

use std::fmt;

use chrono::{DateTime, Utc};
use tabula_core::{TabulaError, TabulaResult};

use crate::value::Value;

/// An insertion-ordered mapping from field name to value.
///
/// # Examples
///
/// ```
/// use tabula_db::record;
/// use tabula_db::value::Value;
///
/// let r = record! { "email" => "a@b.com", "age" => 30 };
/// assert_eq!(r.get("age"), Some(&Value::Int(30)));
/// assert_eq!(r.get_as::<String>("email").unwrap(), "a@b.com");
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    entries: Vec<(String, Value)>,
}

impl Record {
    /// Creates an empty record.
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Sets a field and returns the record, for chained construction.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    /// Sets a field, replacing any previous value in place.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        let field = field.into();
        let value = value.into();
        if let Some(slot) = self.entries.iter_mut().find(|(name, _)| *name == field) {
            slot.1 = value;
        } else {
            self.entries.push((field, value));
        }
    }

    /// Returns the value of a field, if present.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    /// Gets a typed value by field name.
    ///
    /// # Errors
    ///
    /// Returns an error if the field is absent or the value cannot be
    /// converted to the requested type.
    pub fn get_as<T: FromValue>(&self, field: &str) -> TabulaResult<T> {
        let value = self.get(field).ok_or_else(|| {
            TabulaError::InvalidArgument(format!("Field '{field}' not found in record"))
        })?;
        T::from_value(value)
    }

    /// Removes a field, returning its value.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        let idx = self.entries.iter().position(|(name, _)| name == field)?;
        Some(self.entries.remove(idx).1)
    }

    /// Returns `true` if the field is present (even when its value is NULL).
    pub fn contains(&self, field: &str) -> bool {
        self.entries.iter().any(|(name, _)| name == field)
    }

    /// Returns `true` if the field is absent or NULL.
    pub fn is_unset(&self, field: &str) -> bool {
        self.get(field).map_or(true, Value::is_null)
    }

    /// Returns the field names in order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Iterates over `(field, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Returns the number of fields.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copies every field of `other` into this record, overwriting duplicates.
    pub fn merge(&mut self, other: &Self) {
        for (field, value) in other.iter() {
            self.set(field, value.clone());
        }
    }

    /// Converts the record into a JSON object.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.entries
                .iter()
                .map(|(name, value)| (name.clone(), value.to_json()))
                .collect(),
        )
    }

    /// Builds a record from a JSON object.
    ///
    /// # Errors
    ///
    /// Returns an error if `json` is not an object.
    pub fn from_json(json: serde_json::Value) -> TabulaResult<Self> {
        match json {
            serde_json::Value::Object(map) => Ok(map
                .into_iter()
                .map(|(name, value)| (name, Value::from_json(value)))
                .collect()),
            other => Err(TabulaError::SerializationError(format!(
                "Expected a JSON object for a record, got {other}"
            ))),
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}: {value}")?;
        }
        write!(f, "}}")
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Self::new();
        for (field, value) in iter {
            record.set(field, value);
        }
        record
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Builds a [`Record`] from `field => value` pairs.
///
/// ```
/// use tabula_db::record;
///
/// let r = record! { "name" => "Alice", "active" => true };
/// assert_eq!(r.len(), 2);
/// let empty = record! {};
/// assert!(empty.is_empty());
/// ```
#[macro_export]
macro_rules! record {
    () => {
        $crate::record::Record::new()
    };
    ($($field:expr => $value:expr),+ $(,)?) => {{
        let mut record = $crate::record::Record::new();
        $(record.set($field, $value);)+
        record
    }};
}

/// Trait for converting a [`Value`] to a concrete Rust type.
pub trait FromValue: Sized {
    /// Attempts to convert a value reference to this type.
    fn from_value(value: &Value) -> TabulaResult<Self>;
}

fn mismatch(expected: &str, value: &Value) -> TabulaError {
    TabulaError::SerializationError(format!("Expected {expected}, got {value:?}"))
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> TabulaResult<Self> {
        match value {
            Value::Int(i) => Ok(*i),
            _ => Err(mismatch("Int", value)),
        }
    }
}

impl FromValue for u64 {
    fn from_value(value: &Value) -> TabulaResult<Self> {
        match value {
            Value::Int(i) => u64::try_from(*i).map_err(|e| {
                TabulaError::SerializationError(format!("Int value out of u64 range: {e}"))
            }),
            _ => Err(mismatch("Int", value)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> TabulaResult<Self> {
        value.as_f64().ok_or_else(|| mismatch("Float", value))
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> TabulaResult<Self> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Int(0) => Ok(false),
            Value::Int(1) => Ok(true),
            _ => Err(mismatch("Bool", value)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> TabulaResult<Self> {
        match value {
            Value::String(s) => Ok(s.clone()),
            _ => Err(mismatch("String", value)),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: &Value) -> TabulaResult<Self> {
        value.as_timestamp().ok_or_else(|| mismatch("Timestamp", value))
    }
}

impl FromValue for serde_json::Value {
    fn from_value(value: &Value) -> TabulaResult<Self> {
        Ok(value.to_json())
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> TabulaResult<Self> {
        Ok(value.clone())
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> TabulaResult<Self> {
        match value {
            Value::Null => Ok(None),
            _ => T::from_value(value).map(Some),
        }
    }
}
