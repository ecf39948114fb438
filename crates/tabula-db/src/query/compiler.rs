//! SQL compilation primitives.
//!
//! Every compiled statement is a `(sql, params)` pair using positional `?`
//! placeholders. The remote engine binds parameters by position, so each
//! compiler pushes exactly one parameter per placeholder it emits, in the
//! order the placeholders appear in the text.

use crate::query::lookups::{ConditionValue, Operator, WhereCondition};
use crate::record::Record;
use crate::value::Value;

/// The predicate emitted for conditions that can match no row.
pub const ALWAYS_FALSE: &str = "1=0";

/// Compiles a conjunction of conditions, appending their operands to
/// `params`. Returns `None` when there are no conditions.
pub fn compile_conditions(
    conditions: &[WhereCondition],
    params: &mut Vec<Value>,
) -> Option<String> {
    if conditions.is_empty() {
        return None;
    }
    let parts: Vec<String> = conditions
        .iter()
        .map(|c| compile_condition(c, params))
        .collect();
    Some(parts.join(" AND "))
}

/// Compiles a single condition.
///
/// `IN`, `NOT IN` and `BETWEEN` with an unusable list (empty, or not exactly
/// two bounds for `BETWEEN`) compile to [`ALWAYS_FALSE`] rather than failing.
/// Equality with NULL compiles to `IS NULL`, inequality to `IS NOT NULL`.
pub fn compile_condition(condition: &WhereCondition, params: &mut Vec<Value>) -> String {
    let field = &condition.field;
    let op = condition.operator;
    match (op, &condition.value) {
        (Operator::IsNull | Operator::IsNotNull, _) => format!("{field} {}", op.as_sql()),
        (Operator::Eq, ConditionValue::Single(Value::Null) | ConditionValue::None) => {
            format!("{field} IS NULL")
        }
        (Operator::Ne, ConditionValue::Single(Value::Null) | ConditionValue::None) => {
            format!("{field} IS NOT NULL")
        }
        (Operator::In | Operator::NotIn, ConditionValue::List(values)) => {
            if values.is_empty() {
                return ALWAYS_FALSE.to_string();
            }
            let placeholders = push_all(params, values);
            format!("{field} {} ({placeholders})", op.as_sql())
        }
        (Operator::In | Operator::NotIn, ConditionValue::Single(value)) => {
            params.push(value.clone());
            format!("{field} {} (?)", op.as_sql())
        }
        (Operator::Between, ConditionValue::List(values)) if values.len() == 2 => {
            params.push(values[0].clone());
            params.push(values[1].clone());
            format!("{field} BETWEEN ? AND ?")
        }
        (_, ConditionValue::Single(value)) if !op.takes_list() => {
            params.push(value.clone());
            format!("{field} {} ?", op.as_sql())
        }
        _ => ALWAYS_FALSE.to_string(),
    }
}

fn push_all(params: &mut Vec<Value>, values: &[Value]) -> String {
    params.extend(values.iter().cloned());
    vec!["?"; values.len()].join(", ")
}

/// Compiles an INSERT of one record.
pub fn compile_insert(table: &str, record: &Record) -> (String, Vec<Value>) {
    if record.is_empty() {
        return (format!("INSERT INTO {table} DEFAULT VALUES"), Vec::new());
    }
    let columns: Vec<&str> = record.fields().collect();
    let params: Vec<Value> = record.iter().map(|(_, v)| v.clone()).collect();
    let sql = format!(
        "INSERT INTO {table} ({}) VALUES ({})",
        columns.join(", "),
        vec!["?"; params.len()].join(", ")
    );
    (sql, params)
}

/// Compiles one multi-row INSERT over `columns`.
///
/// A row missing a column binds NULL in its place, so every row contributes
/// exactly `columns.len()` parameters.
pub fn compile_bulk_insert(
    table: &str,
    columns: &[String],
    rows: &[Record],
) -> (String, Vec<Value>) {
    let mut params = Vec::with_capacity(columns.len() * rows.len());
    let tuple = format!("({})", vec!["?"; columns.len()].join(", "));
    let mut tuples = Vec::with_capacity(rows.len());
    for row in rows {
        for column in columns {
            params.push(row.get(column).cloned().unwrap_or(Value::Null));
        }
        tuples.push(tuple.clone());
    }
    let sql = format!(
        "INSERT INTO {table} ({}) VALUES {}",
        columns.join(", "),
        tuples.join(", ")
    );
    (sql, params)
}

/// Counts the `?` characters in compiled SQL.
///
/// Values compiled from records and filters are always bound, never inlined.
/// Raw fragments are copied as written, though: join `ON` text, `HAVING`
/// expressions and select expressions. A `?` inside one of them is counted
/// here without a matching parameter.
pub fn placeholder_count(sql: &str) -> usize {
    sql.matches('?').count()
}
