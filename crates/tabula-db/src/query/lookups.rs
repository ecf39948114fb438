//! Filter conditions.
//!
//! A [`WhereCondition`] pairs a column with an [`Operator`] and its operand.
//! A [`Filter`] is a conjunction of conditions; it is what record operations
//! accept as their where-spec and what the builder compiles into a `WHERE`
//! clause.
//!
//! # Examples
//!
//! ```
//! use tabula_db::query::lookups::Filter;
//!
//! // status = 'active' AND age >= 18 AND role IN ('admin', 'editor')
//! let filter = Filter::new()
//!     .eq("status", "active")
//!     .gte("age", 18)
//!     .is_in("role", ["admin", "editor"]);
//! assert_eq!(filter.len(), 3);
//! ```

use std::fmt;
use std::str::FromStr;

use tabula_core::TabulaError;

use crate::record::Record;
use crate::value::Value;

/// A comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `=`
    Eq,
    /// `!=`
    Ne,
    /// `>`
    Gt,
    /// `<`
    Lt,
    /// `>=`
    Gte,
    /// `<=`
    Lte,
    /// `LIKE`
    Like,
    /// `NOT LIKE`
    NotLike,
    /// `IN (...)`
    In,
    /// `NOT IN (...)`
    NotIn,
    /// `BETWEEN ? AND ?`
    Between,
    /// `IS NULL`
    IsNull,
    /// `IS NOT NULL`
    IsNotNull,
}

impl Operator {
    /// Returns the SQL spelling of this operator.
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Gte => ">=",
            Self::Lte => "<=",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
            Self::Between => "BETWEEN",
            Self::IsNull => "IS NULL",
            Self::IsNotNull => "IS NOT NULL",
        }
    }

    /// Returns `true` for operators whose operand is a value list.
    pub const fn takes_list(self) -> bool {
        matches!(self, Self::In | Self::NotIn | Self::Between)
    }

    /// Returns `true` for operators without an operand.
    pub const fn is_unary(self) -> bool {
        matches!(self, Self::IsNull | Self::IsNotNull)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for Operator {
    type Err = TabulaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase();
        let op = match normalized.as_str() {
            "=" | "==" => Self::Eq,
            "!=" | "<>" => Self::Ne,
            ">" => Self::Gt,
            "<" => Self::Lt,
            ">=" => Self::Gte,
            "<=" => Self::Lte,
            "LIKE" => Self::Like,
            "NOT LIKE" => Self::NotLike,
            "IN" => Self::In,
            "NOT IN" => Self::NotIn,
            "BETWEEN" => Self::Between,
            "IS NULL" => Self::IsNull,
            "IS NOT NULL" => Self::IsNotNull,
            _ => {
                return Err(TabulaError::InvalidArgument(format!(
                    "Unknown operator '{s}'"
                )))
            }
        };
        Ok(op)
    }
}

/// The operand of a condition.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionValue {
    /// No operand (`IS NULL`, `IS NOT NULL`).
    None,
    /// A single value.
    Single(Value),
    /// A value list (`IN`, `NOT IN`, `BETWEEN`).
    List(Vec<Value>),
}

/// One predicate of a `WHERE` or `HAVING` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct WhereCondition {
    /// The column (or expression, in `HAVING`).
    pub field: String,
    /// The comparison.
    pub operator: Operator,
    /// The operand.
    pub value: ConditionValue,
}

impl WhereCondition {
    /// A condition with a single-value operand.
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        let value = if operator.is_unary() {
            ConditionValue::None
        } else {
            ConditionValue::Single(value.into())
        };
        Self {
            field: field.into(),
            operator,
            value,
        }
    }

    /// A condition with a list operand.
    pub fn list<I, V>(field: impl Into<String>, operator: Operator, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            field: field.into(),
            operator,
            value: ConditionValue::List(values.into_iter().map(Into::into).collect()),
        }
    }

    /// A condition without an operand.
    pub fn unary(field: impl Into<String>, operator: Operator) -> Self {
        Self {
            field: field.into(),
            operator,
            value: ConditionValue::None,
        }
    }
}

/// A conjunction of conditions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<WhereCondition>,
}

impl Filter {
    /// An empty filter, matching every row.
    pub const fn new() -> Self {
        Self {
            conditions: Vec::new(),
        }
    }

    /// Appends a condition.
    #[must_use]
    pub fn condition(mut self, condition: WhereCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Appends a condition in place.
    pub fn push(&mut self, condition: WhereCondition) {
        self.conditions.push(condition);
    }

    /// `field = value`; a NULL value compiles to `IS NULL`.
    #[must_use]
    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.condition(WhereCondition::new(field, Operator::Eq, value))
    }

    /// `field != value`; a NULL value compiles to `IS NOT NULL`.
    #[must_use]
    pub fn ne(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.condition(WhereCondition::new(field, Operator::Ne, value))
    }

    /// `field > value`
    #[must_use]
    pub fn gt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.condition(WhereCondition::new(field, Operator::Gt, value))
    }

    /// `field >= value`
    #[must_use]
    pub fn gte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.condition(WhereCondition::new(field, Operator::Gte, value))
    }

    /// `field < value`
    #[must_use]
    pub fn lt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.condition(WhereCondition::new(field, Operator::Lt, value))
    }

    /// `field <= value`
    #[must_use]
    pub fn lte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.condition(WhereCondition::new(field, Operator::Lte, value))
    }

    /// `field LIKE pattern`
    #[must_use]
    pub fn like(self, field: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.condition(WhereCondition::new(field, Operator::Like, pattern.into()))
    }

    /// `field NOT LIKE pattern`
    #[must_use]
    pub fn not_like(self, field: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.condition(WhereCondition::new(field, Operator::NotLike, pattern.into()))
    }

    /// `field IN (values)`; an empty list matches nothing.
    #[must_use]
    pub fn is_in<I, V>(self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.condition(WhereCondition::list(field, Operator::In, values))
    }

    /// `field NOT IN (values)`; an empty list matches nothing.
    #[must_use]
    pub fn not_in<I, V>(self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.condition(WhereCondition::list(field, Operator::NotIn, values))
    }

    /// `field BETWEEN low AND high`
    #[must_use]
    pub fn between(
        self,
        field: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        self.condition(WhereCondition::list(
            field,
            Operator::Between,
            [low.into(), high.into()],
        ))
    }

    /// `field IS NULL`
    #[must_use]
    pub fn is_null(self, field: impl Into<String>) -> Self {
        self.condition(WhereCondition::unary(field, Operator::IsNull))
    }

    /// `field IS NOT NULL`
    #[must_use]
    pub fn is_not_null(self, field: impl Into<String>) -> Self {
        self.condition(WhereCondition::unary(field, Operator::IsNotNull))
    }

    /// Appends every condition of `other`.
    #[must_use]
    pub fn and(mut self, other: Self) -> Self {
        self.conditions.extend(other.conditions);
        self
    }

    /// Returns the conditions in order.
    pub fn conditions(&self) -> &[WhereCondition] {
        &self.conditions
    }

    /// Returns `true` if the filter has no conditions.
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Returns the number of conditions.
    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    /// Returns `true` if any condition targets `field`.
    pub fn mentions(&self, field: &str) -> bool {
        self.conditions.iter().any(|c| c.field == field)
    }
}

impl From<Record> for Filter {
    fn from(record: Record) -> Self {
        record
            .into_iter()
            .fold(Self::new(), |filter, (field, value)| filter.eq(field, value))
    }
}

impl From<WhereCondition> for Filter {
    fn from(condition: WhereCondition) -> Self {
        Self::new().condition(condition)
    }
}

impl IntoIterator for Filter {
    type Item = WhereCondition;
    type IntoIter = std::vec::IntoIter<WhereCondition>;

    fn into_iter(self) -> Self::IntoIter {
        self.conditions.into_iter()
    }
}
