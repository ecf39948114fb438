//! Create, read, update and delete against an in-memory SQLite engine.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tabula_core::{ErrorKind, TabulaError};
use tabula_db::{
    record, FieldDef, Filter, FindOptions, Model, ModelHooks, Operator, Record, Schema,
    SchemaOptions, Value, WhereCondition,
};
use tabula_test::{
    model_on, posts_schema, sqlite_model, users_schema, RecordingExecutor, SqliteExecutor,
};

async fn seed_users(users: &Model, ages: &[i64]) {
    for (i, age) in ages.iter().enumerate() {
        users
            .create(record! { "email" => format!("user{i}@example.com"), "age" => *age })
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_create_applies_defaults_and_timestamps() {
    let (users, _db) = sqlite_model(users_schema()).await;
    let user = users
        .create(record! { "email" => "ada@example.com", "name" => "Ada" })
        .await
        .unwrap();

    assert_eq!(user.get("id"), Some(&Value::Int(1)));
    assert_eq!(user.get("status"), Some(&Value::from("active")));
    assert_eq!(user.get("verified"), Some(&Value::Bool(false)));
    assert!(!user.is_unset("created_at"));
    assert!(!user.is_unset("updated_at"));
    // A 0 fallback would violate min 13, so age stays NULL.
    assert_eq!(user.get("age"), Some(&Value::Null));
}

#[tokio::test]
async fn test_validation_failure_issues_no_statement() {
    let (users, db) = sqlite_model(users_schema()).await;
    let err = users
        .create(record! { "email" => "kid@example.com", "age" => 10 })
        .await
        .unwrap_err();

    let errors = err.validation_errors().unwrap();
    let age = errors.for_field("age").next().unwrap();
    assert_eq!(age.code, "min_value");
    assert_eq!(db.statement_count(), 0);
}

#[tokio::test]
async fn test_missing_required_field_lists_every_violation() {
    let (users, _db) = sqlite_model(users_schema()).await;
    let err = users
        .create(record! { "age" => 200, "verified" => "yes" })
        .await
        .unwrap_err();

    let errors = err.validation_errors().unwrap();
    let fields: Vec<&str> = errors.errors().iter().map(|e| e.field.as_str()).collect();
    assert!(fields.contains(&"email"));
    assert!(fields.contains(&"age"));
    assert!(fields.contains(&"verified"));
}

#[tokio::test]
async fn test_duplicate_email_is_classified() {
    let (users, _db) = sqlite_model(users_schema()).await;
    users.create(record! { "email" => "dup@example.com" }).await.unwrap();
    let err = users
        .create(record! { "email" => "dup@example.com" })
        .await
        .unwrap_err();

    assert!(err.is_duplicate_entry());
    let query = err.query_error().unwrap();
    assert_eq!(query.field.as_deref(), Some("email"));
    assert_eq!(query.message, "Duplicate entry for field 'email'");
    assert_eq!(query.raw_message, "UNIQUE constraint failed: users.email");
    assert!(query.sql.starts_with("INSERT INTO users ("));
    assert_eq!(query.table, "users");
}

#[tokio::test]
async fn test_find_all_filters_orders_and_limits() {
    let (users, _db) = sqlite_model(users_schema()).await;
    seed_users(&users, &[20, 30, 40, 50]).await;

    let found = users
        .find_all(
            FindOptions::new()
                .filter(Filter::new().gte("age", 25))
                .order_by("-age")
                .take(2),
        )
        .await
        .unwrap();
    let ages: Vec<i64> = found.iter().map(|r| r.get_as::<i64>("age").unwrap()).collect();
    assert_eq!(ages, vec![50, 40]);

    let skipped = users
        .find_all(FindOptions::new().order_by("age").limit(2).skip(1))
        .await
        .unwrap();
    let ages: Vec<i64> = skipped.iter().map(|r| r.get_as::<i64>("age").unwrap()).collect();
    assert_eq!(ages, vec![30, 40]);
}

#[tokio::test]
async fn test_find_by_id_and_find_one() {
    let (users, _db) = sqlite_model(users_schema()).await;
    seed_users(&users, &[20, 30]).await;

    let second = users.find_by_id(2).await.unwrap().unwrap();
    assert_eq!(second.get_as::<String>("email").unwrap(), "user1@example.com");
    assert!(users.find_by_id(99).await.unwrap().is_none());

    let one = users
        .find_one(Filter::new().eq("email", "user0@example.com"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(one.get_as::<i64>("age").unwrap(), 20);
}

#[tokio::test]
async fn test_unknown_filter_field_is_rejected_before_sql() {
    let (users, db) = sqlite_model(users_schema()).await;
    let err = users
        .find_all(Filter::new().eq("nickname", "x"))
        .await
        .unwrap_err();
    assert!(matches!(err, TabulaError::InvalidArgument(_)));
    assert_eq!(db.statement_count(), 0);
}

#[tokio::test]
async fn test_count_exists_and_paginate() {
    let (users, _db) = sqlite_model(users_schema()).await;
    seed_users(&users, &[20, 21, 22, 23, 24]).await;

    assert_eq!(users.count(Filter::new()).await.unwrap(), 5);
    assert_eq!(users.count(Filter::new().lt("age", 22)).await.unwrap(), 2);
    assert!(users.exists(Filter::new().eq("age", 24)).await.unwrap());
    assert!(!users.exists(Filter::new().eq("age", 99)).await.unwrap());

    let page = users
        .paginate(2, 2, FindOptions::new().order_by("age"))
        .await
        .unwrap();
    assert_eq!(page.total, 5);
    assert_eq!(page.total_pages, 3);
    assert!(page.has_next());
    assert!(page.has_previous());
    let ages: Vec<i64> = page.records.iter().map(|r| r.get_as::<i64>("age").unwrap()).collect();
    assert_eq!(ages, vec![22, 23]);

    let err = users.paginate(1, 0, FindOptions::new()).await.unwrap_err();
    assert!(matches!(err, TabulaError::InvalidArgument(_)));
}

#[tokio::test]
async fn test_update_by_filter_and_by_id() {
    let (users, _db) = sqlite_model(users_schema()).await;
    seed_users(&users, &[20, 30, 40]).await;

    let result = users
        .update(record! { "status" => "inactive" }, Filter::new().gte("age", 30))
        .await
        .unwrap();
    assert_eq!(result.changes, 2);
    assert_eq!(users.count(Filter::new().eq("status", "inactive")).await.unwrap(), 2);

    let updated = users
        .update_by_id(1, record! { "name" => "First", "id" => 77 })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.get("id"), Some(&Value::Int(1)));
    assert_eq!(updated.get_as::<String>("name").unwrap(), "First");

    assert!(users.update_by_id(42, record! { "name" => "Ghost" }).await.unwrap().is_none());
}

#[tokio::test]
async fn test_update_without_assignable_fields() {
    let (users, db) = sqlite_model(users_schema()).await;
    let err = users
        .update(record! { "id" => 1, "created_at" => "2024-01-01T00:00:00Z" }, Filter::new())
        .await
        .unwrap_err();
    assert!(matches!(err, TabulaError::NoFieldsToUpdate));
    assert_eq!(db.statement_count(), 0);
}

#[tokio::test]
async fn test_partial_update_validates_present_fields_only() {
    let (users, _db) = sqlite_model(users_schema()).await;
    seed_users(&users, &[20]).await;

    let err = users
        .update_by_id(1, record! { "age" => 500 })
        .await
        .unwrap_err();
    assert_eq!(err.validation_errors().unwrap().errors()[0].code, "max_value");

    // email is required but absent from the payload: not a violation here.
    users.update_by_id(1, record! { "age" => 21 }).await.unwrap();
}

#[tokio::test]
async fn test_delete_and_delete_by_id() {
    let (users, _db) = sqlite_model(users_schema()).await;
    seed_users(&users, &[20, 30, 40]).await;

    assert!(users.delete_by_id(1).await.unwrap());
    assert!(!users.delete_by_id(1).await.unwrap());
    assert_eq!(users.delete(Filter::new().gt("age", 25)).await.unwrap(), 2);
    assert_eq!(users.count(Filter::new()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_foreign_key_violation_and_cascade() {
    let db = Arc::new(SqliteExecutor::memory().unwrap());
    let users = model_on(&db, users_schema()).await;
    let posts = model_on(&db, posts_schema()).await;

    let err = posts
        .create(record! { "author_id" => 9, "title" => "Orphan" })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::ForeignKeyViolation));

    let author = users.create(record! { "email" => "au@example.com" }).await.unwrap();
    let post = posts
        .create(record! {
            "author_id" => author.get("id").cloned().unwrap(),
            "title" => "Hello",
            "tags" => serde_json::json!(["intro", "rust"]),
        })
        .await
        .unwrap();
    assert_eq!(post.get("published"), Some(&Value::Bool(false)));
    assert_eq!(post.get("tags"), Some(&Value::Json(serde_json::json!(["intro", "rust"]))));

    users.delete_by_id(1).await.unwrap();
    assert_eq!(posts.count(Filter::new()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_soft_delete_hides_rows_until_restored() {
    let db = Arc::new(SqliteExecutor::memory().unwrap());
    let users = model_on(&db, users_schema()).await;
    let posts = model_on(&db, posts_schema()).await;
    users.create(record! { "email" => "au@example.com" }).await.unwrap();
    for title in ["a", "b", "c"] {
        posts
            .create(record! { "author_id" => 1, "title" => title })
            .await
            .unwrap();
    }

    assert_eq!(posts.soft_delete(Filter::new().eq("title", "b")).await.unwrap(), 1);
    assert_eq!(posts.count(Filter::new()).await.unwrap(), 2);
    assert!(posts.find_by_id(2).await.unwrap().is_none());
    let all = posts
        .find_all(FindOptions::new().with_deleted())
        .await
        .unwrap();
    assert_eq!(all.len(), 3);

    // Already deleted rows are not stamped again.
    assert_eq!(posts.soft_delete(Filter::new().eq("title", "b")).await.unwrap(), 0);
    assert_eq!(posts.restore(Filter::new()).await.unwrap(), 1);
    assert_eq!(posts.count(Filter::new()).await.unwrap(), 3);

    let err = users.soft_delete(Filter::new()).await.unwrap_err();
    assert!(matches!(err, TabulaError::InvalidArgument(_)));
}

#[tokio::test]
async fn test_hooks_shape_the_pipeline() {
    let db = Arc::new(SqliteExecutor::memory().unwrap());
    let hooks = ModelHooks::new()
        .before_create(|data: &mut Record| {
            if let Some(Value::String(email)) = data.get("email").cloned() {
                data.set("email", email.to_lowercase());
            }
            Ok(())
        })
        .before_delete(|filter| {
            if filter.is_empty() {
                return Err(TabulaError::Hook("refusing to delete every row".to_string()));
            }
            Ok(())
        })
        .after_find(|records| {
            for record in records.iter_mut() {
                record.remove("updated_at");
            }
            Ok(())
        });
    let users = model_on(&db, users_schema()).await.with_hooks(hooks);

    let user = users.create(record! { "email" => "MiXeD@Example.com" }).await.unwrap();
    assert_eq!(user.get_as::<String>("email").unwrap(), "mixed@example.com");

    let found = users.find_by_id(1).await.unwrap().unwrap();
    assert!(!found.contains("updated_at"));

    let err = users.delete(Filter::new()).await.unwrap_err();
    assert!(matches!(err, TabulaError::Hook(_)));
    assert_eq!(users.count(Filter::new()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_json_field_values_round_trip() {
    let schema = Schema::new(
        "docs",
        vec![FieldDef::id("id"), FieldDef::json("meta")],
        SchemaOptions::default(),
    )
    .unwrap();
    let (docs, _db) = sqlite_model(schema).await;

    let cases = [
        Value::from("42"),
        Value::from("true"),
        Value::from("not json"),
        Value::Int(7),
        Value::Bool(false),
        Value::Json(serde_json::json!({"k": [1, 2]})),
    ];
    for stored in cases {
        let created = docs.create(record! { "meta" => stored.clone() }).await.unwrap();
        assert_eq!(created.get("meta"), Some(&stored));
    }

    docs.update_by_id(1, record! { "meta" => "null" }).await.unwrap();
    let updated = docs.find_by_id(1).await.unwrap().unwrap();
    assert_eq!(updated.get("meta"), Some(&Value::from("null")));
}

#[tokio::test]
async fn test_update_hooks_fire_per_path() {
    let db = Arc::new(SqliteExecutor::memory().unwrap());
    model_on(&db, users_schema()).await;
    let recorder = Arc::new(RecordingExecutor::wrap(db));

    let created = Arc::new(AtomicUsize::new(0));
    let updated = Arc::new(AtomicUsize::new(0));
    let hooks = ModelHooks::new()
        .after_create({
            let created = created.clone();
            move |_: &Record| {
                created.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .after_update({
            let updated = updated.clone();
            move |_: &Record| {
                updated.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .before_update(|_data: &mut Record, filter: &mut Filter| {
            filter.push(WhereCondition::new("status", Operator::Ne, "banned"));
            Ok(())
        })
        .before_find(|query| {
            query.where_not_null("email");
            Ok(())
        });
    let users = Model::new(users_schema(), recorder.clone()).with_hooks(hooks);

    users.create(record! { "email" => "a@example.com" }).await.unwrap();
    users
        .create(record! { "email" => "b@example.com", "status" => "banned" })
        .await
        .unwrap();
    assert_eq!(created.load(Ordering::SeqCst), 2);

    recorder.clear().await;
    let result = users
        .update(
            record! { "name" => "B" },
            Filter::new().eq("email", "b@example.com"),
        )
        .await
        .unwrap();
    assert_eq!(result.changes, 0);
    let statement = recorder.last().await.unwrap();
    assert_eq!(
        statement.sql,
        "UPDATE users SET name = ?, updated_at = ? WHERE email = ? AND status != ?"
    );
    assert_eq!(statement.params[2], Value::from("b@example.com"));
    assert_eq!(statement.params[3], Value::from("banned"));

    users
        .update(record! { "name" => "A" }, Filter::new().eq("id", 1))
        .await
        .unwrap();
    assert_eq!(updated.load(Ordering::SeqCst), 0);

    let a = users
        .update_by_id(1, record! { "verified" => true })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(a.get_as::<String>("name").unwrap(), "A");
    assert_eq!(updated.load(Ordering::SeqCst), 1);
    assert_eq!(created.load(Ordering::SeqCst), 2);

    users.find_all(Filter::new().eq("status", "active")).await.unwrap();
    let find = recorder.last().await.unwrap();
    assert_eq!(
        find.sql,
        "SELECT * FROM users WHERE status = ? AND email IS NOT NULL"
    );
}
