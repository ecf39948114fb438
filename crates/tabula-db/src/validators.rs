//! Field validators.
//!
//! Validators enforce a single constraint on a non-null field value before it
//! is written. [`FieldDef::validators`](crate::fields::FieldDef::validators)
//! assembles them from a field's declared bounds; the schema runs them in
//! declaration order and collects every failure.

use std::fmt;
use std::sync::Arc;

use tabula_core::ValidationError;

use crate::value::Value;

/// A trait for validating field values.
///
/// # Examples
///
/// ```
/// use tabula_db::validators::{Validator, MaxLengthValidator};
/// use tabula_db::value::Value;
///
/// let v = MaxLengthValidator::new(5);
/// assert!(v.validate("name", &Value::from("hi")).is_ok());
/// assert!(v.validate("name", &Value::from("toolong")).is_err());
/// ```
pub trait Validator: Send + Sync + fmt::Debug {
    /// Validates the value of `field`, returning an error if invalid.
    fn validate(&self, field: &str, value: &Value) -> Result<(), ValidationError>;

    /// Returns a human-readable name for this validator.
    fn name(&self) -> &str;
}

impl<V: Validator + ?Sized> Validator for Arc<V> {
    fn validate(&self, field: &str, value: &Value) -> Result<(), ValidationError> {
        (**self).validate(field, value)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Validates that a string value does not exceed a maximum length.
#[derive(Debug, Clone)]
pub struct MaxLengthValidator {
    /// The maximum allowed length, in characters.
    pub max_length: usize,
}

impl MaxLengthValidator {
    /// Creates a new `MaxLengthValidator` with the given maximum length.
    pub const fn new(max_length: usize) -> Self {
        Self { max_length }
    }
}

impl Validator for MaxLengthValidator {
    fn validate(&self, field: &str, value: &Value) -> Result<(), ValidationError> {
        if let Value::String(s) = value {
            if s.chars().count() > self.max_length {
                return Err(ValidationError::new(
                    field,
                    format!("{field} must be at most {} characters", self.max_length),
                    "max_length",
                ));
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "MaxLengthValidator"
    }
}

/// Validates that a string value meets a minimum length requirement.
#[derive(Debug, Clone)]
pub struct MinLengthValidator {
    /// The minimum required length, in characters.
    pub min_length: usize,
}

impl MinLengthValidator {
    /// Creates a new `MinLengthValidator` with the given minimum length.
    pub const fn new(min_length: usize) -> Self {
        Self { min_length }
    }
}

impl Validator for MinLengthValidator {
    fn validate(&self, field: &str, value: &Value) -> Result<(), ValidationError> {
        if let Value::String(s) = value {
            if s.chars().count() < self.min_length {
                return Err(ValidationError::new(
                    field,
                    format!("{field} must be at least {} characters", self.min_length),
                    "min_length",
                ));
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "MinLengthValidator"
    }
}

/// Validates that a numeric value does not exceed a maximum.
#[derive(Debug, Clone)]
pub struct MaxValueValidator {
    /// The maximum allowed value.
    pub max_value: f64,
}

impl MaxValueValidator {
    /// Creates a new `MaxValueValidator` with the given maximum.
    pub const fn new(max_value: f64) -> Self {
        Self { max_value }
    }
}

impl Validator for MaxValueValidator {
    fn validate(&self, field: &str, value: &Value) -> Result<(), ValidationError> {
        if let Some(n) = value.as_f64() {
            if n > self.max_value {
                return Err(ValidationError::new(
                    field,
                    format!("{field} must be at most {}", self.max_value),
                    "max_value",
                ));
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "MaxValueValidator"
    }
}

/// Validates that a numeric value meets a minimum requirement.
#[derive(Debug, Clone)]
pub struct MinValueValidator {
    /// The minimum required value.
    pub min_value: f64,
}

impl MinValueValidator {
    /// Creates a new `MinValueValidator` with the given minimum.
    pub const fn new(min_value: f64) -> Self {
        Self { min_value }
    }
}

impl Validator for MinValueValidator {
    fn validate(&self, field: &str, value: &Value) -> Result<(), ValidationError> {
        if let Some(n) = value.as_f64() {
            if n < self.min_value {
                return Err(ValidationError::new(
                    field,
                    format!("{field} must be at least {}", self.min_value),
                    "min_value",
                ));
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "MinValueValidator"
    }
}

/// Validates that a value is one of an allowed set.
#[derive(Debug, Clone)]
pub struct ChoicesValidator {
    /// The allowed values.
    pub choices: Vec<Value>,
}

impl ChoicesValidator {
    /// Creates a new `ChoicesValidator` over the given values.
    pub const fn new(choices: Vec<Value>) -> Self {
        Self { choices }
    }
}

impl Validator for ChoicesValidator {
    fn validate(&self, field: &str, value: &Value) -> Result<(), ValidationError> {
        if self.choices.contains(value) {
            return Ok(());
        }
        let allowed: Vec<String> = self.choices.iter().map(ToString::to_string).collect();
        Err(ValidationError::new(
            field,
            format!("{field} must be one of: {}", allowed.join(", ")),
            "enum",
        ))
    }

    fn name(&self) -> &str {
        "ChoicesValidator"
    }
}

type CheckFn = dyn Fn(&Value) -> Result<(), String> + Send + Sync;

/// Wraps a caller-supplied check returning an error message on failure.
pub struct FnValidator {
    check: Box<CheckFn>,
}

impl FnValidator {
    /// Creates a validator from a closure.
    pub fn new(check: impl Fn(&Value) -> Result<(), String> + Send + Sync + 'static) -> Self {
        Self {
            check: Box::new(check),
        }
    }
}

impl fmt::Debug for FnValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnValidator")
    }
}

impl Validator for FnValidator {
    fn validate(&self, field: &str, value: &Value) -> Result<(), ValidationError> {
        (self.check)(value).map_err(|message| ValidationError::new(field, message, "custom"))
    }

    fn name(&self) -> &str {
        "FnValidator"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_length_valid() {
        let v = MaxLengthValidator::new(5);
        assert!(v.validate("name", &Value::from("hello")).is_ok());
    }

    #[test]
    fn test_max_length_invalid() {
        let v = MaxLengthValidator::new(3);
        let err = v.validate("name", &Value::from("toolong")).unwrap_err();
        assert_eq!(err.code, "max_length");
        assert_eq!(err.message, "name must be at most 3 characters");
    }

    #[test]
    fn test_length_counts_characters() {
        let v = MaxLengthValidator::new(3);
        assert!(v.validate("name", &Value::from("äöü")).is_ok());
    }

    #[test]
    fn test_max_length_non_string() {
        let v = MaxLengthValidator::new(3);
        assert!(v.validate("n", &Value::Int(12345)).is_ok());
    }

    #[test]
    fn test_min_length_invalid() {
        let v = MinLengthValidator::new(5);
        let err = v.validate("code", &Value::from("hi")).unwrap_err();
        assert_eq!(err.field, "code");
        assert_eq!(err.code, "min_length");
    }

    #[test]
    fn test_min_value_message() {
        let v = MinValueValidator::new(13.0);
        let err = v.validate("age", &Value::Int(10)).unwrap_err();
        assert_eq!(err.message, "age must be at least 13");
        assert!(v.validate("age", &Value::Float(13.0)).is_ok());
    }

    #[test]
    fn test_max_value_invalid() {
        let v = MaxValueValidator::new(100.0);
        assert!(v.validate("n", &Value::Int(101)).is_err());
        assert!(v.validate("n", &Value::Float(100.1)).is_err());
        assert!(v.validate("n", &Value::Int(100)).is_ok());
    }

    #[test]
    fn test_choices() {
        let v = ChoicesValidator::new(vec![Value::from("draft"), Value::from("published")]);
        assert!(v.validate("status", &Value::from("draft")).is_ok());
        let err = v.validate("status", &Value::from("archived")).unwrap_err();
        assert_eq!(err.message, "status must be one of: draft, published");
    }

    #[test]
    fn test_fn_validator() {
        let v = FnValidator::new(|value| match value.as_str() {
            Some(s) if s.contains('@') => Ok(()),
            _ => Err("email must contain @".to_string()),
        });
        assert!(v.validate("email", &Value::from("a@b")).is_ok());
        let err = v.validate("email", &Value::from("nope")).unwrap_err();
        assert_eq!(err.code, "custom");
        assert_eq!(err.message, "email must contain @");
    }

    #[test]
    fn test_validator_names() {
        assert_eq!(MaxLengthValidator::new(5).name(), "MaxLengthValidator");
        assert_eq!(MinLengthValidator::new(5).name(), "MinLengthValidator");
        assert_eq!(MaxValueValidator::new(5.0).name(), "MaxValueValidator");
        assert_eq!(MinValueValidator::new(5.0).name(), "MinValueValidator");
        assert_eq!(Arc::new(ChoicesValidator::new(vec![])).name(), "ChoicesValidator");
    }
}
