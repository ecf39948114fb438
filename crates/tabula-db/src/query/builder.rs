//! The fluent query builder.
//!
//! [`QueryBuilder`] accumulates the clauses of one statement and compiles
//! them on demand. Builder methods take `&mut self` and return `&mut Self`,
//! so a builder can be configured by chained calls and also handed to a
//! `before_find` hook for further mutation. Compilation never mutates the
//! builder: calling [`build`](QueryBuilder::build) twice yields identical
//! output.
//!
//! # Examples
//!
//! ```
//! use tabula_db::query::builder::QueryBuilder;
//!
//! let mut qb = QueryBuilder::new("users");
//! qb.select(["id", "email"]).where_eq("active", true).order_by("email").limit(10);
//! let (sql, params) = qb.build();
//! assert_eq!(
//!     sql,
//!     "SELECT id, email FROM users WHERE active = ? ORDER BY email ASC LIMIT 10"
//! );
//! assert_eq!(params.len(), 1);
//! ```

use std::fmt;

use tabula_core::{TabulaError, TabulaResult};

use crate::query::compiler::compile_conditions;
use crate::query::lookups::{Filter, Operator, WhereCondition};
use crate::record::Record;
use crate::value::Value;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

impl SortDirection {
    /// Returns the SQL keyword.
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// A column ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// The column to order by.
    pub column: String,
    /// The direction.
    pub direction: SortDirection,
}

impl OrderBy {
    /// Creates an ascending order.
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Asc,
        }
    }

    /// Creates a descending order.
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Desc,
        }
    }

    /// Parses `"name"`, `"name DESC"`, `"name asc"` or `"-name"`.
    ///
    /// An unrecognized direction word sorts ascending.
    pub fn parse(spec: &str) -> Option<Self> {
        let spec = spec.trim();
        if let Some(column) = spec.strip_prefix('-') {
            let column = column.trim();
            return (!column.is_empty()).then(|| Self::desc(column));
        }
        let mut words = spec.split_whitespace();
        let column = words.next()?;
        let direction = match words.next() {
            Some(dir) if dir.eq_ignore_ascii_case("desc") => SortDirection::Desc,
            _ => SortDirection::Asc,
        };
        Some(Self {
            column: column.to_string(),
            direction,
        })
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.column, self.direction.as_sql())
    }
}

/// An ordering specification in any of the accepted shapes: a single string
/// (comma-separated terms allowed), a list of strings, or a list of
/// `(field, direction)` pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderSpec(pub Vec<OrderBy>);

impl OrderSpec {
    /// Returns `true` if no ordering was given.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the orderings.
    pub fn orders(&self) -> &[OrderBy] {
        &self.0
    }
}

impl From<&str> for OrderSpec {
    fn from(spec: &str) -> Self {
        Self(spec.split(',').filter_map(OrderBy::parse).collect())
    }
}

impl From<String> for OrderSpec {
    fn from(spec: String) -> Self {
        Self::from(spec.as_str())
    }
}

impl From<Vec<&str>> for OrderSpec {
    fn from(specs: Vec<&str>) -> Self {
        Self(specs.into_iter().filter_map(OrderBy::parse).collect())
    }
}

impl From<Vec<(&str, SortDirection)>> for OrderSpec {
    fn from(pairs: Vec<(&str, SortDirection)>) -> Self {
        Self(
            pairs
                .into_iter()
                .map(|(column, direction)| OrderBy {
                    column: column.to_string(),
                    direction,
                })
                .collect(),
        )
    }
}

impl From<Vec<OrderBy>> for OrderSpec {
    fn from(orders: Vec<OrderBy>) -> Self {
        Self(orders)
    }
}

impl From<OrderBy> for OrderSpec {
    fn from(order: OrderBy) -> Self {
        Self(vec![order])
    }
}

/// SQL join types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    /// INNER JOIN.
    Inner,
    /// LEFT JOIN.
    Left,
    /// RIGHT JOIN.
    Right,
}

impl JoinType {
    /// Returns the SQL keyword for this join type.
    pub const fn sql_keyword(self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::Left => "LEFT JOIN",
            Self::Right => "RIGHT JOIN",
        }
    }
}

/// A JOIN clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    /// The type of join.
    pub join_type: JoinType,
    /// The joined table.
    pub table: String,
    /// The ON condition, as SQL text.
    pub on: String,
}

/// A mutable accumulator of SQL clauses for one table.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryBuilder {
    select: Vec<String>,
    from: String,
    joins: Vec<Join>,
    conditions: Vec<WhereCondition>,
    group_by: Vec<String>,
    having: Vec<WhereCondition>,
    order_by: Vec<OrderBy>,
    limit: Option<u64>,
    offset: Option<u64>,
    distinct: bool,
}

impl QueryBuilder {
    /// Creates a builder selecting `*` from `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            select: Vec::new(),
            from: table.into(),
            joins: Vec::new(),
            conditions: Vec::new(),
            group_by: Vec::new(),
            having: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
            distinct: false,
        }
    }

    // ── Clause setters ──────────────────────────────────────────────────

    /// Replaces the select list. Entries may be columns or aliased
    /// expressions (`"SUM(price) AS total"`).
    pub fn select<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the table.
    pub fn from(&mut self, table: impl Into<String>) -> &mut Self {
        self.from = table.into();
        self
    }

    /// Adds `field <op> value`.
    pub fn where_(
        &mut self,
        field: impl Into<String>,
        operator: Operator,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.conditions
            .push(WhereCondition::new(field, operator, value));
        self
    }

    /// Adds `field = value`.
    pub fn where_eq(&mut self, field: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.where_(field, Operator::Eq, value)
    }

    /// Adds `field IN (values)`; an empty list matches nothing.
    pub fn where_in<I, V>(&mut self, field: impl Into<String>, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.conditions
            .push(WhereCondition::list(field, Operator::In, values));
        self
    }

    /// Adds `field NOT IN (values)`; an empty list matches nothing.
    pub fn where_not_in<I, V>(&mut self, field: impl Into<String>, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.conditions
            .push(WhereCondition::list(field, Operator::NotIn, values));
        self
    }

    /// Adds `field BETWEEN low AND high`.
    pub fn where_between(
        &mut self,
        field: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> &mut Self {
        self.conditions.push(WhereCondition::list(
            field,
            Operator::Between,
            [low.into(), high.into()],
        ));
        self
    }

    /// Adds `field IS NULL`.
    pub fn where_null(&mut self, field: impl Into<String>) -> &mut Self {
        self.conditions
            .push(WhereCondition::unary(field, Operator::IsNull));
        self
    }

    /// Adds `field IS NOT NULL`.
    pub fn where_not_null(&mut self, field: impl Into<String>) -> &mut Self {
        self.conditions
            .push(WhereCondition::unary(field, Operator::IsNotNull));
        self
    }

    /// Adds a prepared condition.
    pub fn where_condition(&mut self, condition: WhereCondition) -> &mut Self {
        self.conditions.push(condition);
        self
    }

    /// Adds every condition of a filter.
    pub fn filter(&mut self, filter: &Filter) -> &mut Self {
        self.conditions.extend(filter.conditions().iter().cloned());
        self
    }

    fn push_join(&mut self, join_type: JoinType, table: impl Into<String>, on: impl Into<String>) -> &mut Self {
        self.joins.push(Join {
            join_type,
            table: table.into(),
            on: on.into(),
        });
        self
    }

    /// Adds an INNER JOIN. `on` is copied into the SQL as written, so it must
    /// not contain placeholders.
    pub fn join(&mut self, table: impl Into<String>, on: impl Into<String>) -> &mut Self {
        self.push_join(JoinType::Inner, table, on)
    }

    /// Adds a LEFT JOIN. `on` is copied as written.
    pub fn left_join(&mut self, table: impl Into<String>, on: impl Into<String>) -> &mut Self {
        self.push_join(JoinType::Left, table, on)
    }

    /// Adds a RIGHT JOIN.
    pub fn right_join(&mut self, table: impl Into<String>, on: impl Into<String>) -> &mut Self {
        self.push_join(JoinType::Right, table, on)
    }

    /// Appends orderings parsed from any [`OrderSpec`] shape.
    pub fn order_by(&mut self, spec: impl Into<OrderSpec>) -> &mut Self {
        self.order_by.extend(spec.into().0);
        self
    }

    /// Appends GROUP BY columns.
    pub fn group_by<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_by.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Adds a HAVING condition; `expression` may be an aggregate and is
    /// copied as written. Only `value` is bound.
    pub fn having(
        &mut self,
        expression: impl Into<String>,
        operator: Operator,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.having
            .push(WhereCondition::new(expression, operator, value));
        self
    }

    /// Sets the LIMIT.
    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the OFFSET.
    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.offset = Some(offset);
        self
    }

    /// Sets LIMIT/OFFSET for a 1-based page. Page 0 is treated as page 1.
    pub fn paginate(&mut self, page: u64, per_page: u64) -> &mut Self {
        let page = page.max(1);
        self.limit = Some(per_page);
        self.offset = Some((page - 1).saturating_mul(per_page));
        self
    }

    /// Selects distinct rows.
    pub fn distinct(&mut self) -> &mut Self {
        self.distinct = true;
        self
    }

    /// Removes ordering, limit and offset.
    pub fn clear_paging(&mut self) -> &mut Self {
        self.order_by.clear();
        self.limit = None;
        self.offset = None;
        self
    }

    // ── Accessors ───────────────────────────────────────────────────────

    /// Returns the table.
    pub fn table(&self) -> &str {
        &self.from
    }

    /// Returns the WHERE conditions.
    pub fn conditions(&self) -> &[WhereCondition] {
        &self.conditions
    }

    /// Returns the orderings.
    pub fn orders(&self) -> &[OrderBy] {
        &self.order_by
    }

    /// Returns the LIMIT.
    pub const fn limit_value(&self) -> Option<u64> {
        self.limit
    }

    /// Returns the OFFSET.
    pub const fn offset_value(&self) -> Option<u64> {
        self.offset
    }

    // ── Compilation ─────────────────────────────────────────────────────

    fn push_joins(&self, sql: &mut String) {
        for join in &self.joins {
            sql.push(' ');
            sql.push_str(join.join_type.sql_keyword());
            sql.push(' ');
            sql.push_str(&join.table);
            sql.push_str(" ON ");
            sql.push_str(&join.on);
        }
    }

    fn push_where(&self, sql: &mut String, params: &mut Vec<Value>) {
        if let Some(predicate) = compile_conditions(&self.conditions, params) {
            sql.push_str(" WHERE ");
            sql.push_str(&predicate);
        }
    }

    fn push_grouping(&self, sql: &mut String, params: &mut Vec<Value>) {
        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }
        if let Some(predicate) = compile_conditions(&self.having, params) {
            sql.push_str(" HAVING ");
            sql.push_str(&predicate);
        }
    }

    fn select_core(&self, params: &mut Vec<Value>) -> String {
        let mut sql = String::from("SELECT ");
        if self.distinct {
            sql.push_str("DISTINCT ");
        }
        if self.select.is_empty() {
            sql.push('*');
        } else {
            sql.push_str(&self.select.join(", "));
        }
        sql.push_str(" FROM ");
        sql.push_str(&self.from);
        self.push_joins(&mut sql);
        self.push_where(&mut sql, params);
        self.push_grouping(&mut sql, params);
        sql
    }

    /// Compiles the SELECT statement.
    pub fn build(&self) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let mut sql = self.select_core(&mut params);
        if !self.order_by.is_empty() {
            let orders: Vec<String> = self.order_by.iter().map(ToString::to_string).collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&orders.join(", "));
        }
        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}")),
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {limit}")),
            (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {offset}")),
            (None, None) => {}
        }
        (sql, params)
    }

    /// Compiles `SELECT COUNT(*) AS count` over the same rows, ignoring
    /// ordering and paging. Distinct or grouped selections are counted
    /// through a subquery.
    pub fn build_count(&self) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        if self.distinct || !self.group_by.is_empty() {
            let inner = self.select_core(&mut params);
            return (format!("SELECT COUNT(*) AS count FROM ({inner}) AS counted"), params);
        }
        let mut sql = format!("SELECT COUNT(*) AS count FROM {}", self.from);
        self.push_joins(&mut sql);
        self.push_where(&mut sql, &mut params);
        (sql, params)
    }

    /// Compiles `UPDATE ... SET ... WHERE ...`, assignments first.
    ///
    /// # Errors
    ///
    /// Returns [`TabulaError::NoFieldsToUpdate`] if `set` is empty.
    pub fn build_update(&self, set: &Record) -> TabulaResult<(String, Vec<Value>)> {
        if set.is_empty() {
            return Err(TabulaError::NoFieldsToUpdate);
        }
        let mut params: Vec<Value> = Vec::with_capacity(set.len());
        let assignments: Vec<String> = set
            .iter()
            .map(|(field, value)| {
                params.push(value.clone());
                format!("{field} = ?")
            })
            .collect();
        let mut sql = format!("UPDATE {} SET {}", self.from, assignments.join(", "));
        self.push_where(&mut sql, &mut params);
        Ok((sql, params))
    }

    /// Compiles `DELETE FROM ... WHERE ...`.
    pub fn build_delete(&self) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let mut sql = format!("DELETE FROM {}", self.from);
        self.push_where(&mut sql, &mut params);
        (sql, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::compiler::placeholder_count;
    use crate::record;

    #[test]
    fn test_simple_select() {
        let (sql, params) = QueryBuilder::new("users").build();
        assert_eq!(sql, "SELECT * FROM users");
        assert!(params.is_empty());
    }

    #[test]
    fn test_full_select_clause_order() {
        let mut qb = QueryBuilder::new("posts");
        qb.select(["posts.user_id", "COUNT(*) AS n"])
            .distinct()
            .left_join("users", "users.id = posts.user_id")
            .where_eq("posts.status", "published")
            .where_between("posts.score", 1, 10)
            .group_by(["posts.user_id"])
            .having("COUNT(*)", Operator::Gt, 2)
            .order_by("-n")
            .limit(5)
            .offset(10);
        let (sql, params) = qb.build();
        assert_eq!(
            sql,
            "SELECT DISTINCT posts.user_id, COUNT(*) AS n FROM posts \
             LEFT JOIN users ON users.id = posts.user_id \
             WHERE posts.status = ? AND posts.score BETWEEN ? AND ? \
             GROUP BY posts.user_id HAVING COUNT(*) > ? \
             ORDER BY n DESC LIMIT 5 OFFSET 10"
        );
        assert_eq!(
            params,
            vec![Value::from("published"), Value::Int(1), Value::Int(10), Value::Int(2)]
        );
        assert_eq!(placeholder_count(&sql), params.len());
    }

    #[test]
    fn test_build_is_idempotent() {
        let mut qb = QueryBuilder::new("users");
        qb.where_in("id", [1, 2]).order_by("name DESC");
        assert_eq!(qb.build(), qb.build());
    }

    #[test]
    fn test_where_in_empty_matches_nothing() {
        let mut qb = QueryBuilder::new("users");
        qb.where_in("id", Vec::<i64>::new());
        let (sql, params) = qb.build();
        assert_eq!(sql, "SELECT * FROM users WHERE 1=0");
        assert!(params.is_empty());
    }

    #[test]
    fn test_clone_is_independent() {
        let mut base = QueryBuilder::new("users");
        base.where_eq("active", true);
        let mut derived = base.clone();
        derived.where_eq("role", "admin").limit(1);
        assert_eq!(base.conditions().len(), 1);
        assert_eq!(base.limit_value(), None);
        assert_eq!(derived.conditions().len(), 2);
    }

    #[test]
    fn test_paginate() {
        let mut qb = QueryBuilder::new("users");
        qb.paginate(3, 20);
        assert_eq!(qb.build().0, "SELECT * FROM users LIMIT 20 OFFSET 40");
        qb.paginate(0, 20);
        assert_eq!(qb.offset_value(), Some(0));
    }

    #[test]
    fn test_offset_without_limit() {
        let mut qb = QueryBuilder::new("users");
        qb.offset(5);
        assert_eq!(qb.build().0, "SELECT * FROM users LIMIT -1 OFFSET 5");
    }

    #[test]
    fn test_build_count_ignores_paging() {
        let mut qb = QueryBuilder::new("users");
        qb.where_eq("active", true).order_by("name").limit(5);
        let (sql, params) = qb.build_count();
        assert_eq!(sql, "SELECT COUNT(*) AS count FROM users WHERE active = ?");
        assert_eq!(params, vec![Value::Bool(true)]);
    }

    #[test]
    fn test_build_count_distinct_uses_subquery() {
        let mut qb = QueryBuilder::new("users");
        qb.select(["role"]).distinct();
        assert_eq!(
            qb.build_count().0,
            "SELECT COUNT(*) AS count FROM (SELECT DISTINCT role FROM users) AS counted"
        );
    }

    #[test]
    fn test_build_update() {
        let mut qb = QueryBuilder::new("t");
        qb.where_eq("id", 1);
        let (sql, params) = qb
            .build_update(&record! { "status" => "x", "updated_at" => "2024-01-01T00:00:00.000Z" })
            .unwrap();
        assert_eq!(sql, "UPDATE t SET status = ?, updated_at = ? WHERE id = ?");
        assert_eq!(params[0], Value::from("x"));
        assert_eq!(params[2], Value::Int(1));
    }

    #[test]
    fn test_build_update_requires_fields() {
        let err = QueryBuilder::new("t").build_update(&Record::new()).unwrap_err();
        assert!(matches!(err, TabulaError::NoFieldsToUpdate));
    }

    #[test]
    fn test_build_delete() {
        let (sql, _) = QueryBuilder::new("t").build_delete();
        assert_eq!(sql, "DELETE FROM t");
        let mut qb = QueryBuilder::new("t");
        qb.where_eq("id", 3).where_null("deleted_at");
        assert_eq!(
            qb.build_delete().0,
            "DELETE FROM t WHERE id = ? AND deleted_at IS NULL"
        );
    }

    #[test]
    fn test_order_spec_shapes() {
        assert_eq!(
            OrderSpec::from("name DESC, -age, email").orders(),
            &[OrderBy::desc("name"), OrderBy::desc("age"), OrderBy::asc("email")]
        );
        assert_eq!(
            OrderSpec::from(vec!["name", "-id"]).orders(),
            &[OrderBy::asc("name"), OrderBy::desc("id")]
        );
        assert_eq!(
            OrderSpec::from(vec![("name", SortDirection::Desc)]).orders(),
            &[OrderBy::desc("name")]
        );
        assert!(OrderSpec::from("").is_empty());
        assert!(OrderSpec::from(" - ").is_empty());
    }
}
