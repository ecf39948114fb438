//! Generated DDL and migration artifacts, applied to a real engine.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use tabula_db::{record, Filter, MigrationArtifact, Model, RemoteExecutor};
use tabula_test::{posts_schema, products_schema, users_schema, SqliteExecutor};

#[test]
fn test_users_create_table_sql() {
    assert_eq!(
        users_schema().generate_create_table_sql(),
        "CREATE TABLE users (\
         id INTEGER PRIMARY KEY AUTOINCREMENT, \
         email VARCHAR(254) NOT NULL UNIQUE, \
         name VARCHAR(100), \
         age INTEGER, \
         status TEXT DEFAULT 'active', \
         verified BOOLEAN, \
         created_at DATETIME DEFAULT CURRENT_TIMESTAMP, \
         updated_at DATETIME DEFAULT CURRENT_TIMESTAMP)"
    );
}

#[test]
fn test_posts_ddl_carries_relation_and_soft_delete() {
    let sql = posts_schema().generate_create_table_sql();
    assert!(sql.contains("author_id INTEGER NOT NULL"));
    assert!(sql.contains("deleted_at DATETIME"));
    assert!(sql.ends_with(
        "FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE CASCADE ON UPDATE NO ACTION)"
    ));
}

#[test]
fn test_products_index_statements() {
    assert_eq!(
        products_schema().generate_index_sql(),
        vec![
            "CREATE INDEX idx_products_category ON products(category)".to_string(),
            "CREATE INDEX idx_products_category_price ON products(category, price)".to_string(),
        ]
    );
}

#[test]
fn test_migration_artifact_for_products() {
    let at = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
    let artifact = MigrationArtifact::create_table_at(&products_schema(), at);

    assert_eq!(artifact.file_name(), "20250102030405_create_products.sql");
    assert_eq!(artifact.up.len(), 3);
    assert_eq!(
        artifact.down,
        vec![
            "DROP INDEX IF EXISTS idx_products_category_price".to_string(),
            "DROP INDEX IF EXISTS idx_products_category".to_string(),
            "DROP TABLE IF EXISTS products".to_string(),
        ]
    );
    let text = artifact.render();
    assert!(text.contains("-- Created: 2025-01-02T03:04:05+00:00\n"));
}

#[tokio::test]
async fn test_generated_ddl_applies_to_sqlite() {
    let db = Arc::new(SqliteExecutor::memory().unwrap());
    let users = Model::new(users_schema(), db.clone());
    let posts = Model::new(posts_schema(), db.clone());
    users.create_table().await.unwrap();
    posts.create_table().await.unwrap();

    let tables = db
        .execute(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name IN ('users', 'posts') ORDER BY name",
            &[],
        )
        .await
        .unwrap();
    let names: Vec<String> = tables
        .rows
        .iter()
        .map(|r| r.get_as::<String>("name").unwrap())
        .collect();
    assert_eq!(names, vec!["posts", "users"]);

    let indexes = db
        .execute(
            "SELECT name FROM sqlite_master WHERE type = 'index' AND name = 'idx_posts_author_id'",
            &[],
        )
        .await
        .unwrap();
    assert_eq!(indexes.rows.len(), 1);
}

#[tokio::test]
async fn test_drop_table_reverses_create() {
    let db = Arc::new(SqliteExecutor::memory().unwrap());
    let products = Model::new(products_schema(), db.clone());
    products.create_table().await.unwrap();
    products
        .create(record! { "sku" => "A", "name" => "Anvil", "price" => 90 })
        .await
        .unwrap();
    products.drop_table().await.unwrap();

    let err = products.count(Filter::new()).await.unwrap_err();
    assert!(err.query_error().unwrap().raw_message.contains("no such table"));

    products.create_table().await.unwrap();
    assert_eq!(products.count(Filter::new()).await.unwrap(), 0);
}
