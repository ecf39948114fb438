//! Migration artifacts.
//!
//! A [`MigrationArtifact`] pairs the statements that create a schema's table
//! and indexes with the statements that drop them, and renders them as the
//! text of a migration file. Writing the file is left to the caller.

use chrono::{DateTime, Utc};
use tabula_core::TabulaResult;
use tracing::info;

use crate::model::Model;
use crate::schema::Schema;

/// The up/down SQL of one migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationArtifact {
    /// The migration name, e.g. `create_users`.
    pub name: String,
    /// The table the migration creates.
    pub table: String,
    /// Statements applying the migration, in order.
    pub up: Vec<String>,
    /// Statements reverting the migration, in order.
    pub down: Vec<String>,
    /// When the artifact was generated.
    pub created_at: DateTime<Utc>,
}

impl MigrationArtifact {
    /// Generates the artifact creating `schema`'s table, stamped now.
    pub fn create_table(schema: &Schema) -> Self {
        Self::create_table_at(schema, Utc::now())
    }

    /// Generates the artifact creating `schema`'s table, stamped `at`.
    pub fn create_table_at(schema: &Schema, at: DateTime<Utc>) -> Self {
        let mut up = vec![schema.generate_create_table_sql()];
        up.extend(schema.generate_index_sql());

        let mut down: Vec<String> = schema
            .indexes()
            .iter()
            .rev()
            .map(|index| format!("DROP INDEX IF EXISTS {}", index.name))
            .collect();
        down.push(schema.generate_drop_table_sql());

        Self {
            name: format!("create_{}", schema.table()),
            table: schema.table().to_string(),
            up,
            down,
            created_at: at,
        }
    }

    /// The file name: `<YYYYMMDDHHMMSS>_<name>.sql`.
    pub fn file_name(&self) -> String {
        format!("{}_{}.sql", self.created_at.format("%Y%m%d%H%M%S"), self.name)
    }

    /// Renders the migration file.
    pub fn render(&self) -> String {
        let mut out = format!(
            "-- Migration: {}\n-- Created: {}\n\n-- Up\n",
            self.name,
            self.created_at.to_rfc3339()
        );
        for statement in &self.up {
            out.push_str(statement);
            out.push_str(";\n");
        }
        out.push_str("\n-- Down\n");
        for statement in &self.down {
            out.push_str(statement);
            out.push_str(";\n");
        }
        out
    }
}

impl Model {
    /// Runs the up statements of this model's create-table migration.
    pub async fn create_table(&self) -> TabulaResult<()> {
        let artifact = MigrationArtifact::create_table(self.schema());
        for statement in artifact.up {
            self.execute(statement, Vec::new()).await?;
        }
        info!(table = self.table(), "table created");
        Ok(())
    }

    /// Runs the down statements of this model's create-table migration.
    pub async fn drop_table(&self) -> TabulaResult<()> {
        let artifact = MigrationArtifact::create_table(self.schema());
        for statement in artifact.down {
            self.execute(statement, Vec::new()).await?;
        }
        info!(table = self.table(), "table dropped");
        Ok(())
    }
}
