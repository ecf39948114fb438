//! Fixture schemas and model constructors for tests.
//!
//! Three schemas cover the feature matrix:
//!
//! - [`users_schema`]: auto-increment key, unique email, range-checked age,
//!   a literal default, and managed timestamps
//! - [`posts_schema`]: a relation to `users` with cascading delete, JSON
//!   tags, and soft delete
//! - [`products_schema`]: a unique SKU, a choice-restricted category and a
//!   composite index

use std::sync::Arc;

use tabula_db::fields::{FieldDef, ReferentialAction};
use tabula_db::model::Model;
use tabula_db::schema::{CompositeIndex, Schema, SchemaOptions};

use crate::sqlite::SqliteExecutor;

/// Categories accepted by [`products_schema`].
pub const PRODUCT_CATEGORIES: [&str; 3] = ["tools", "garden", "kitchen"];

/// The `users` table.
///
/// # Panics
///
/// Panics if the declaration is rejected, which would be a bug in the
/// schema layer.
pub fn users_schema() -> Schema {
    Schema::new(
        "users",
        vec![
            FieldDef::id("id"),
            FieldDef::string("email").required().unique().max_length(254),
            FieldDef::string("name").max_length(100),
            FieldDef::number("age").min(13.0).max(120.0),
            FieldDef::string("status").default("active"),
            FieldDef::boolean("verified"),
        ],
        SchemaOptions::new().timestamps(),
    )
    .expect("users schema")
}

/// The `posts` table, soft-deleting and referencing `users`.
///
/// # Panics
///
/// Panics if the declaration is rejected.
pub fn posts_schema() -> Schema {
    Schema::new(
        "posts",
        vec![
            FieldDef::id("id"),
            FieldDef::number("author_id")
                .required()
                .references("users", "id")
                .on_delete(ReferentialAction::Cascade)
                .indexed(),
            FieldDef::string("title").required().min_length(1),
            FieldDef::text("body"),
            FieldDef::boolean("published").default(false),
            FieldDef::json("tags"),
            FieldDef::number("views").default(0),
        ],
        SchemaOptions::new().timestamps().soft_delete(),
    )
    .expect("posts schema")
}

/// The `products` table.
///
/// # Panics
///
/// Panics if the declaration is rejected.
pub fn products_schema() -> Schema {
    Schema::new(
        "products",
        vec![
            FieldDef::id("id"),
            FieldDef::string("sku").required().unique(),
            FieldDef::string("name").required(),
            FieldDef::number("price").required().min(0.0),
            FieldDef::number("quantity").default(0),
            FieldDef::string("category")
                .enum_values(PRODUCT_CATEGORIES)
                .indexed(),
        ],
        SchemaOptions::new().index(CompositeIndex::new(["category", "price"])),
    )
    .expect("products schema")
}

/// Opens a fresh in-memory database and returns a model over it with its
/// table created.
///
/// # Panics
///
/// Panics if SQLite cannot be opened or the table cannot be created.
pub async fn sqlite_model(schema: Schema) -> (Model, Arc<SqliteExecutor>) {
    let db = Arc::new(SqliteExecutor::memory().expect("in-memory SQLite"));
    let model = model_on(&db, schema).await;
    (model, db)
}

/// Builds a model over an existing database and creates its table.
///
/// # Panics
///
/// Panics if the table cannot be created.
pub async fn model_on(db: &Arc<SqliteExecutor>, schema: Schema) -> Model {
    let model = Model::new(schema, db.clone());
    model.create_table().await.expect("create table");
    db.reset_statement_count();
    model
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_schemas_build() {
        assert!(users_schema().has_field("created_at"));
        assert!(posts_schema().soft_delete());
        assert_eq!(products_schema().indexes().len(), 2);
    }

    #[tokio::test]
    async fn test_models_share_one_database() {
        let db = Arc::new(SqliteExecutor::memory().unwrap());
        let users = model_on(&db, users_schema()).await;
        let posts = model_on(&db, posts_schema()).await;
        assert_eq!(users.count(Default::default()).await.unwrap(), 0);
        assert_eq!(posts.count(Default::default()).await.unwrap(), 0);
        assert_eq!(db.statement_count(), 2);
    }
}
