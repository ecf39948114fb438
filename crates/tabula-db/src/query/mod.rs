//! Query building and compilation.
//!
//! - [`lookups`] - operators, conditions and the [`Filter`] DSL
//! - [`builder`] - the fluent [`QueryBuilder`] for SELECT/COUNT/UPDATE/DELETE
//! - [`compiler`] - shared condition compilation and INSERT compilers

pub mod builder;
pub mod compiler;
pub mod lookups;

pub use builder::{Join, JoinType, OrderBy, OrderSpec, QueryBuilder, SortDirection};
pub use compiler::{compile_bulk_insert, compile_insert};
pub use lookups::{ConditionValue, Filter, Operator, WhereCondition};
