//! Aggregate queries.
//!
//! Every helper compiles one `SELECT <FN>(field) AS alias` through a scratch
//! [`QueryBuilder`](crate::query::QueryBuilder) built from the same filter
//! compiler as the CRUD operations, so soft-deleted rows are excluded the same
//! way. Percentiles are computed with a count followed by an ordered
//! single-row fetch, since the engine has no percentile function.

use std::fmt;

use tabula_core::{TabulaError, TabulaResult};

use crate::model::{FindOptions, Model};
use crate::query::{Filter, OrderSpec, QueryBuilder};
use crate::record::{FromValue, Record};
use crate::value::Value;

/// An SQL aggregate function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFn {
    /// `COUNT(field)`, or `COUNT(*)` for the field `*`.
    Count,
    /// `COUNT(DISTINCT field)`.
    CountDistinct,
    /// `SUM(field)`.
    Sum,
    /// `AVG(field)`.
    Avg,
    /// `MIN(field)`.
    Min,
    /// `MAX(field)`.
    Max,
}

impl AggregateFn {
    /// The lowercase name, used in default aliases.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::CountDistinct => "count_distinct",
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Min => "min",
            Self::Max => "max",
        }
    }

    /// Renders the SQL expression over `field`.
    pub fn expression(self, field: &str) -> String {
        match self {
            Self::Count => format!("COUNT({field})"),
            Self::CountDistinct => format!("COUNT(DISTINCT {field})"),
            Self::Sum => format!("SUM({field})"),
            Self::Avg => format!("AVG({field})"),
            Self::Min => format!("MIN({field})"),
            Self::Max => format!("MAX({field})"),
        }
    }
}

impl fmt::Display for AggregateFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One aliased aggregate expression of an [`aggregate`](Model::aggregate)
/// call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregate {
    /// The function.
    pub function: AggregateFn,
    /// The column, or `*` for `COUNT(*)`.
    pub field: String,
    /// The result column name.
    pub alias: String,
}

impl Aggregate {
    /// Creates an aggregate aliased `<fn>_<field>`.
    pub fn new(function: AggregateFn, field: impl Into<String>) -> Self {
        let field = field.into();
        let alias = if field == "*" {
            function.name().to_string()
        } else {
            format!("{}_{field}", function.name())
        };
        Self {
            function,
            field,
            alias,
        }
    }

    /// `COUNT(*)`, aliased `count`.
    pub fn count_all() -> Self {
        Self::new(AggregateFn::Count, "*")
    }

    /// `COUNT(field)`.
    pub fn count(field: impl Into<String>) -> Self {
        Self::new(AggregateFn::Count, field)
    }

    /// `COUNT(DISTINCT field)`.
    pub fn count_distinct(field: impl Into<String>) -> Self {
        Self::new(AggregateFn::CountDistinct, field)
    }

    /// `SUM(field)`.
    pub fn sum(field: impl Into<String>) -> Self {
        Self::new(AggregateFn::Sum, field)
    }

    /// `AVG(field)`.
    pub fn avg(field: impl Into<String>) -> Self {
        Self::new(AggregateFn::Avg, field)
    }

    /// `MIN(field)`.
    pub fn min(field: impl Into<String>) -> Self {
        Self::new(AggregateFn::Min, field)
    }

    /// `MAX(field)`.
    pub fn max(field: impl Into<String>) -> Self {
        Self::new(AggregateFn::Max, field)
    }

    /// Replaces the alias.
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }
}

/// Filter, grouping and ordering for [`aggregate`](Model::aggregate).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateOptions {
    /// Rows to aggregate.
    pub filter: Filter,
    /// Grouping columns; empty aggregates all rows into one.
    pub group_by: Vec<String>,
    /// Ordering over grouping columns or aliases.
    pub order: OrderSpec,
}

impl AggregateOptions {
    /// Creates options aggregating every row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the filter.
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    /// Sets the grouping columns.
    #[must_use]
    pub fn group_by<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_by = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the ordering.
    #[must_use]
    pub fn order_by(mut self, order: impl Into<OrderSpec>) -> Self {
        self.order = order.into();
        self
    }
}

/// Summary statistics of one numeric column.
#[derive(Debug, Clone, PartialEq)]
pub struct Stats {
    /// Non-null values.
    pub count: u64,
    /// Sum, `None` when there are no values.
    pub sum: Option<f64>,
    /// Mean, `None` when there are no values.
    pub avg: Option<f64>,
    /// Smallest value.
    pub min: Option<Value>,
    /// Largest value.
    pub max: Option<Value>,
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn non_null(value: Value) -> Option<Value> {
    (!value.is_null()).then_some(value)
}

impl Model {
    fn scratch(&self, filter: &Filter) -> TabulaResult<QueryBuilder> {
        self.query_for(&FindOptions::from(filter.clone()))
    }

    fn check_aggregate_field(&self, function: AggregateFn, field: &str) -> TabulaResult<()> {
        if field == "*" && function == AggregateFn::Count {
            return Ok(());
        }
        if self.schema().has_field(field) {
            Ok(())
        } else {
            Err(TabulaError::InvalidArgument(format!(
                "{}: unknown field '{field}' in {function}",
                self.table()
            )))
        }
    }

    /// Computes one aggregate over the rows matching `filter`. Returns NULL
    /// when the engine does (e.g. SUM over no rows).
    pub async fn aggregate_value(
        &self,
        function: AggregateFn,
        field: &str,
        filter: &Filter,
    ) -> TabulaResult<Value> {
        self.check_aggregate_field(function, field)?;
        let mut query = self.scratch(filter)?;
        query.select([format!("{} AS value", function.expression(field))]);
        let row = self.fetch(&query).await?.into_iter().next();
        Ok(row
            .and_then(|mut row| row.remove("value"))
            .unwrap_or(Value::Null))
    }

    /// `SUM(field)`; `None` when no row matches.
    pub async fn sum(&self, field: &str, filter: &Filter) -> TabulaResult<Option<f64>> {
        Ok(self
            .aggregate_value(AggregateFn::Sum, field, filter)
            .await?
            .as_f64())
    }

    /// `AVG(field)`; `None` when no row matches.
    pub async fn avg(&self, field: &str, filter: &Filter) -> TabulaResult<Option<f64>> {
        Ok(self
            .aggregate_value(AggregateFn::Avg, field, filter)
            .await?
            .as_f64())
    }

    /// `MIN(field)`; `None` when no row matches.
    pub async fn min(&self, field: &str, filter: &Filter) -> TabulaResult<Option<Value>> {
        Ok(non_null(
            self.aggregate_value(AggregateFn::Min, field, filter).await?,
        ))
    }

    /// `MAX(field)`; `None` when no row matches.
    pub async fn max(&self, field: &str, filter: &Filter) -> TabulaResult<Option<Value>> {
        Ok(non_null(
            self.aggregate_value(AggregateFn::Max, field, filter).await?,
        ))
    }

    /// `COUNT(field)`: the non-null values of `field`. Use `*` to count rows.
    pub async fn count_values(&self, field: &str, filter: &Filter) -> TabulaResult<u64> {
        let value = self.aggregate_value(AggregateFn::Count, field, filter).await?;
        if value.is_null() {
            return Ok(0);
        }
        u64::from_value(&value)
    }

    /// `COUNT(DISTINCT field)`.
    pub async fn count_distinct(&self, field: &str, filter: &Filter) -> TabulaResult<u64> {
        let value = self
            .aggregate_value(AggregateFn::CountDistinct, field, filter)
            .await?;
        if value.is_null() {
            return Ok(0);
        }
        u64::from_value(&value)
    }

    /// The distinct values of `field`, ascending.
    pub async fn distinct(&self, field: &str, filter: &Filter) -> TabulaResult<Vec<Value>> {
        self.check_aggregate_field(AggregateFn::Min, field)?;
        let mut query = self.scratch(filter)?;
        query.select([field]).distinct().order_by(field);
        Ok(self
            .fetch(&query)
            .await?
            .into_iter()
            .filter_map(|mut row| row.remove(field))
            .collect())
    }

    /// Row counts per value of `field`: one record `{field, count}` per
    /// group, ascending by `field`.
    pub async fn group_by(&self, field: &str, filter: &Filter) -> TabulaResult<Vec<Record>> {
        self.aggregate(
            &[Aggregate::count_all()],
            AggregateOptions::new()
                .filter(filter.clone())
                .group_by([field])
                .order_by(field),
        )
        .await
    }

    /// Runs several aggregates in one SELECT.
    ///
    /// Ungrouped, the result is a single record keyed by alias. Grouped, it
    /// holds one record per group with the grouping columns first.
    ///
    /// # Errors
    ///
    /// [`TabulaError::InvalidArgument`] for an empty list, an unknown field,
    /// a malformed alias, or an ordering on a column that is neither a
    /// grouping column nor an alias.
    pub async fn aggregate(
        &self,
        aggregates: &[Aggregate],
        options: AggregateOptions,
    ) -> TabulaResult<Vec<Record>> {
        if aggregates.is_empty() {
            return Err(TabulaError::InvalidArgument(
                "aggregate needs at least one expression".to_string(),
            ));
        }
        for aggregate in aggregates {
            self.check_aggregate_field(aggregate.function, &aggregate.field)?;
            if !is_identifier(&aggregate.alias) {
                return Err(TabulaError::InvalidArgument(format!(
                    "invalid aggregate alias '{}'",
                    aggregate.alias
                )));
            }
        }
        for column in &options.group_by {
            self.check_aggregate_field(AggregateFn::Min, column)?;
        }
        for order in options.order.orders() {
            let known = options.group_by.contains(&order.column)
                || aggregates.iter().any(|a| a.alias == order.column);
            if !known {
                return Err(TabulaError::InvalidArgument(format!(
                    "cannot order aggregate results by '{}'",
                    order.column
                )));
            }
        }

        let mut query = self.scratch(&options.filter)?;
        let mut select = options.group_by.clone();
        select.extend(
            aggregates
                .iter()
                .map(|a| format!("{} AS {}", a.function.expression(&a.field), a.alias)),
        );
        query.select(select);
        if !options.group_by.is_empty() {
            query.group_by(options.group_by.iter().cloned());
        }
        if !options.order.is_empty() {
            query.order_by(options.order);
        }
        self.fetch(&query).await
    }

    /// The value at the `p`-th percentile of `field` (nearest-rank), or
    /// `None` when no row has a value.
    ///
    /// The 1-based rank is `ceil(p / 100 * count)`, at least 1, so `p = 0`
    /// yields the minimum and `p = 100` the maximum. NULLs are ignored.
    ///
    /// # Errors
    ///
    /// [`TabulaError::InvalidArgument`] if `p` is outside `0..=100`.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub async fn percentile(&self, field: &str, p: f64, filter: &Filter) -> TabulaResult<Option<Value>> {
        if !(0.0..=100.0).contains(&p) {
            return Err(TabulaError::InvalidArgument(format!(
                "percentile must be between 0 and 100, got {p}"
            )));
        }
        self.check_aggregate_field(AggregateFn::Min, field)?;

        let mut base = self.scratch(filter)?;
        base.where_not_null(field);
        let count = self.fetch_count(&base).await?;
        if count == 0 {
            return Ok(None);
        }
        let rank = ((p / 100.0) * count as f64).ceil() as u64;
        let rank = rank.clamp(1, count);

        base.select([field]).order_by(field).limit(1).offset(rank - 1);
        Ok(self
            .fetch(&base)
            .await?
            .into_iter()
            .next()
            .and_then(|mut row| row.remove(field)))
    }

    /// The 50th percentile.
    pub async fn median(&self, field: &str, filter: &Filter) -> TabulaResult<Option<Value>> {
        self.percentile(field, 50.0, filter).await
    }

    /// Count, sum, mean, minimum and maximum of `field`, fetched
    /// concurrently. The calls are independent statements; concurrent writers
    /// may make them disagree.
    pub async fn stats(&self, field: &str, filter: &Filter) -> TabulaResult<Stats> {
        let (count, sum, avg, min, max) = tokio::try_join!(
            self.count_values(field, filter),
            self.sum(field, filter),
            self.avg(field, filter),
            self.min(field, filter),
            self.max(field, filter),
        )?;
        Ok(Stats {
            count,
            sum,
            avg,
            min,
            max,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::QueryResult;
    use crate::model::tests::{users, Scripted};
    use crate::record;

    fn scalar(value: impl Into<Value>) -> QueryResult {
        QueryResult::with_rows(vec![record! { "value" => value }])
    }

    #[tokio::test]
    async fn test_sum_sql_and_value() {
        let exec = Scripted::with(vec![Ok(scalar(42))]);
        let model = Model::new(users(), exec.clone());
        let total = model.sum("age", &Filter::new().eq("status", "active")).await.unwrap();
        assert_eq!(total, Some(42.0));
        assert_eq!(
            exec.statements()[0].0,
            "SELECT SUM(age) AS value FROM users WHERE status = ?"
        );
    }

    #[tokio::test]
    async fn test_sum_of_nothing_is_none() {
        let exec = Scripted::with(vec![Ok(scalar(Value::Null))]);
        let model = Model::new(users(), exec);
        assert_eq!(model.sum("age", &Filter::new()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unknown_field_rejected() {
        let model = Model::new(users(), Scripted::with(vec![]));
        let err = model.avg("salary", &Filter::new()).await.unwrap_err();
        assert!(matches!(err, TabulaError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_aggregate_grouped_sql() {
        let exec = Scripted::with(vec![]);
        let model = Model::new(users(), exec.clone());
        model
            .aggregate(
                &[Aggregate::count_all(), Aggregate::avg("age").alias("mean_age")],
                AggregateOptions::new().group_by(["status"]).order_by("mean_age DESC"),
            )
            .await
            .unwrap();
        assert_eq!(
            exec.statements()[0].0,
            "SELECT status, COUNT(*) AS count, AVG(age) AS mean_age FROM users GROUP BY status ORDER BY mean_age DESC"
        );
    }

    #[tokio::test]
    async fn test_aggregate_rejects_bad_alias_and_order() {
        let model = Model::new(users(), Scripted::with(vec![]));
        let err = model
            .aggregate(&[Aggregate::sum("age").alias("x; DROP")], AggregateOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TabulaError::InvalidArgument(_)));
        let err = model
            .aggregate(&[Aggregate::sum("age")], AggregateOptions::new().order_by("email"))
            .await
            .unwrap_err();
        assert!(matches!(err, TabulaError::InvalidArgument(_)));
        let err = model.aggregate(&[], AggregateOptions::new()).await.unwrap_err();
        assert!(matches!(err, TabulaError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_percentile_rank_and_offset() {
        let exec = Scripted::with(vec![
            Ok(QueryResult::with_rows(vec![record! { "count" => 10 }])),
            Ok(QueryResult::with_rows(vec![record! { "age" => 55 }])),
        ]);
        let model = Model::new(users(), exec.clone());
        let value = model.percentile("age", 90.0, &Filter::new()).await.unwrap();
        assert_eq!(value, Some(Value::Int(55)));
        let statements = exec.statements();
        assert_eq!(
            statements[0].0,
            "SELECT COUNT(*) AS count FROM users WHERE age IS NOT NULL"
        );
        assert_eq!(
            statements[1].0,
            "SELECT age FROM users WHERE age IS NOT NULL ORDER BY age ASC LIMIT 1 OFFSET 8"
        );
    }

    #[tokio::test]
    async fn test_percentile_zero_is_first_row() {
        let exec = Scripted::with(vec![
            Ok(QueryResult::with_rows(vec![record! { "count" => 4 }])),
            Ok(QueryResult::with_rows(vec![record! { "age" => 13 }])),
        ]);
        let model = Model::new(users(), exec.clone());
        model.percentile("age", 0.0, &Filter::new()).await.unwrap();
        assert!(exec.statements()[1].0.ends_with("LIMIT 1 OFFSET 0"));
    }

    #[tokio::test]
    async fn test_percentile_empty_and_out_of_range() {
        let exec = Scripted::with(vec![Ok(QueryResult::with_rows(vec![record! { "count" => 0 }]))]);
        let model = Model::new(users(), exec.clone());
        assert_eq!(model.median("age", &Filter::new()).await.unwrap(), None);
        assert_eq!(exec.statements().len(), 1);
        for p in [-1.0, 100.5, f64::NAN] {
            assert!(model.percentile("age", p, &Filter::new()).await.is_err());
        }
    }

    #[test]
    fn test_identifier_check() {
        assert!(is_identifier("total_2"));
        assert!(!is_identifier("2total"));
        assert!(!is_identifier("a b"));
        assert!(!is_identifier(""));
    }
}
