//! Statement counting assertions.
//!
//! Bulk operations promise a bounded number of round trips (one INSERT per
//! chunk, one UPDATE per item). [`assert_num_statements`] checks the exact
//! count an async block sends to a [`SqliteExecutor`].
//!
//! ```rust,no_run
//! use tabula_test::assert_statements::assert_num_statements;
//! use tabula_test::fixtures::{sqlite_model, users_schema};
//! use tabula_db::record;
//!
//! async fn example() {
//!     let (users, db) = sqlite_model(users_schema()).await;
//!     assert_num_statements(&db, 2, || async {
//!         users.create(record! { "email" => "a@b.com" }).await.unwrap();
//!     })
//!     .await;
//! }
//! ```

use std::future::Future;

use crate::sqlite::SqliteExecutor;

/// Asserts that exactly `expected` statements run during `f`.
///
/// # Panics
///
/// Panics if the count differs.
pub async fn assert_num_statements<F, Fut>(db: &SqliteExecutor, expected: usize, f: F)
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = ()>,
{
    db.reset_statement_count();
    f().await;
    let actual = db.statement_count();
    assert_eq!(
        actual, expected,
        "expected {expected} statements, {actual} were executed"
    );
}

/// Asserts that at most `max` statements run during `f`.
///
/// # Panics
///
/// Panics if more statements run.
pub async fn assert_max_statements<F, Fut>(db: &SqliteExecutor, max: usize, f: F)
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = ()>,
{
    db.reset_statement_count();
    f().await;
    let actual = db.statement_count();
    assert!(
        actual <= max,
        "expected at most {max} statements, {actual} were executed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabula_db::executor::RemoteExecutor;

    #[tokio::test]
    async fn test_counts_statements_inside_block() {
        let db = SqliteExecutor::memory().unwrap();
        db.execute("CREATE TABLE t (a INTEGER)", &[]).await.unwrap();
        assert_num_statements(&db, 2, || async {
            db.execute("INSERT INTO t (a) VALUES (1)", &[]).await.unwrap();
            db.execute("SELECT * FROM t", &[]).await.unwrap();
        })
        .await;
    }

    #[tokio::test]
    #[should_panic(expected = "at most 0 statements")]
    async fn test_max_statements_panics_when_exceeded() {
        let db = SqliteExecutor::memory().unwrap();
        assert_max_statements(&db, 0, || async {
            db.execute("SELECT 1", &[]).await.unwrap();
        })
        .await;
    }
}
