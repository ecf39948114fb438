//! Bulk operations: chunking, partial failure and abort semantics.

use tabula_core::{Settings, TabulaError};
use tabula_db::{record, BulkOptions, Filter, FindOptions, Record, Value};
use tabula_test::{assert_num_statements, products_schema, sqlite_model, users_schema};

fn product(sku: &str, price: i64) -> Record {
    record! { "sku" => sku, "name" => format!("Item {sku}"), "price" => price, "category" => "tools" }
}

#[tokio::test]
async fn test_bulk_create_collects_failures() {
    let (users, _db) = sqlite_model(users_schema()).await;
    let result = users
        .bulk_create(
            vec![
                record! { "email" => "a@example.com" },
                record! { "email" => "b@example.com", "age" => 5 },
                record! { "email" => "a@example.com" },
                record! { "email" => "c@example.com" },
            ],
            BulkOptions::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.created, 2);
    assert_eq!(result.failed(), 2);
    let indexes: Vec<usize> = result.errors.iter().map(|e| e.index).collect();
    assert_eq!(indexes, vec![1, 2]);
    assert!(result.errors[1].error.contains("Duplicate entry"));
    assert_eq!(
        result.errors[0].data.as_ref().and_then(|d| d.get("email")).cloned(),
        Some(Value::from("b@example.com"))
    );

    let stored: Vec<String> = users
        .find_all(FindOptions::new().order_by("id"))
        .await
        .unwrap()
        .iter()
        .map(|r| r.get_as::<String>("email").unwrap())
        .collect();
    assert_eq!(stored, vec!["a@example.com", "c@example.com"]);
    assert!(users
        .find_one(Filter::new().eq("email", "b@example.com"))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_bulk_create_stop_on_error_aborts() {
    let (users, _db) = sqlite_model(users_schema()).await;
    let err = users
        .bulk_create(
            vec![
                record! { "email" => "a@example.com" },
                record! { "age" => 30 },
                record! { "email" => "c@example.com" },
            ],
            BulkOptions::new().stop_on_error(),
        )
        .await
        .unwrap_err();

    match err {
        TabulaError::BulkAborted { index, completed, source } => {
            assert_eq!(index, 1);
            assert_eq!(completed, 1);
            assert!(source.validation_errors().is_some());
        }
        other => panic!("expected BulkAborted, got {other:?}"),
    }
    assert_eq!(users.count(Filter::new()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_bulk_update_requires_identifiers() {
    let (users, _db) = sqlite_model(users_schema()).await;
    for email in ["a@example.com", "b@example.com"] {
        users.create(record! { "email" => email }).await.unwrap();
    }

    let result = users
        .bulk_update(
            vec![
                record! { "id" => 1, "name" => "A" },
                record! { "name" => "nobody" },
                record! { "id" => 2, "name" => "B" },
                record! { "id" => 9, "name" => "ghost" },
            ],
            BulkOptions::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.updated, 2);
    let indexes: Vec<usize> = result.errors.iter().map(|e| e.index).collect();
    assert_eq!(indexes, vec![1, 3]);
    assert!(result.errors[0].error.contains("without 'id'"));
    let b = users.find_by_id(2).await.unwrap().unwrap();
    assert_eq!(b.get_as::<String>("name").unwrap(), "B");
}

#[tokio::test]
async fn test_bulk_delete_by_chunks() {
    let (users, db) = sqlite_model(users_schema()).await;
    for i in 0..5 {
        users
            .create(record! { "email" => format!("u{i}@example.com") })
            .await
            .unwrap();
    }
    let ids: Vec<Value> = (1..=5).map(Value::Int).collect();

    db.reset_statement_count();
    let result = users
        .bulk_delete(ids, BulkOptions::new().chunk_size(2))
        .await
        .unwrap();
    assert_eq!(db.statement_count(), 3);
    assert_eq!(result.deleted, 5);
    assert!(result.is_success());
}

#[tokio::test]
async fn test_batch_insert_sends_one_statement_per_chunk() {
    let (products, db) = sqlite_model(products_schema()).await;
    let rows: Vec<Record> = (0..5).map(|i| product(&format!("S-{i}"), 10 + i)).collect();

    db.reset_statement_count();
    let result = products
        .batch_insert(rows, BulkOptions::new().chunk_size(2))
        .await
        .unwrap();
    assert_eq!(db.statement_count(), 3);
    assert_eq!(result.created, 5);

    let first = products.find_by_id(1).await.unwrap().unwrap();
    assert_eq!(first.get("quantity"), Some(&Value::Int(0)));
}

#[tokio::test]
async fn test_batch_insert_respects_parameter_budget() {
    let (products, db) = sqlite_model(products_schema()).await;
    let products = products.with_settings(Settings {
        max_bound_parameters: 10,
        ..Settings::default()
    });
    let rows: Vec<Record> = (0..5).map(|i| product(&format!("P-{i}"), 5)).collect();

    // Five columns per row leave room for two rows per statement.
    assert_num_statements(&db, 3, || async {
        products.batch_insert(rows, BulkOptions::new()).await.unwrap();
    })
    .await;
    assert_eq!(products.count(Filter::new()).await.unwrap(), 5);
}

#[tokio::test]
async fn test_batch_insert_failed_chunk_marks_every_row() {
    let (products, _db) = sqlite_model(products_schema()).await;
    let rows = vec![
        product("A", 1),
        product("B", 2),
        product("C", 3),
        product("A", 4),
        product("D", 5),
    ];

    let result = products
        .batch_insert(rows, BulkOptions::new().chunk_size(2))
        .await
        .unwrap();
    assert_eq!(result.created, 3);
    let indexes: Vec<usize> = result.errors.iter().map(|e| e.index).collect();
    assert_eq!(indexes, vec![2, 3]);
    assert_eq!(products.count(Filter::new()).await.unwrap(), 3);
}

#[tokio::test]
async fn test_batch_insert_validation_toggle() {
    let (products, _db) = sqlite_model(products_schema()).await;

    let checked = products
        .batch_insert(vec![product("X", -5), product("Y", 5)], BulkOptions::new())
        .await
        .unwrap();
    assert_eq!(checked.created, 1);
    assert_eq!(checked.errors[0].index, 0);

    let unchecked = products
        .batch_insert(vec![product("Z", -5)], BulkOptions::new().skip_validation())
        .await
        .unwrap();
    assert_eq!(unchecked.created, 1);
    assert_eq!(products.count(Filter::new().lt("price", 0)).await.unwrap(), 1);
}
