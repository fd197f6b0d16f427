//! Parameterized `INSERT ... ON CONFLICT DO UPDATE` generation and execution.

use rocket_db_pools::sqlx::{self, PgConnection, types::Json};
use serde_json::Value;

use crate::import::normalize::{CellValue, NormalizedRow};
use crate::import::table_spec::{ColumnKind, TableSpec};

/// Build the upsert statement for `spec`.
///
/// Placeholders are numbered in column order and cast to the column's SQL
/// type. Every column except the conflict target is reassigned from
/// `EXCLUDED`; a table whose only column is the key falls back to
/// `DO NOTHING`.
pub fn build_upsert_statement(spec: &TableSpec) -> String {
    let columns = spec.column_names().collect::<Vec<_>>().join(", ");
    let placeholders = spec
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, column)| format!("${}::{}", idx + 1, column.sql_type))
        .collect::<Vec<_>>()
        .join(", ");
    let update_set = spec
        .update_columns()
        .map(|column| format!("{name} = EXCLUDED.{name}", name = column.name))
        .collect::<Vec<_>>()
        .join(", ");

    let action = if update_set.is_empty() {
        "DO NOTHING".to_string()
    } else {
        format!("DO UPDATE SET {update_set}")
    };

    format!(
        "INSERT INTO {table} ({columns}) VALUES ({placeholders}) ON CONFLICT ({target}) {action}",
        table = spec.table(),
        target = spec.conflict_target(),
    )
}

/// Statement to move an identity sequence past the largest imported key.
pub fn build_sequence_sync_statement(spec: &TableSpec) -> Option<String> {
    spec.identity_column().map(|column| {
        format!(
            "SELECT setval(pg_get_serial_sequence('{table}', '{column}'), COALESCE(MAX({column}), 0) + 1, false) FROM {table}",
            table = spec.table(),
        )
    })
}

/// Applies normalized rows to one table, reusing a single statement text.
pub struct UpsertExecutor<'s> {
    spec: &'s TableSpec,
    statement: String,
}

impl<'s> UpsertExecutor<'s> {
    pub fn new(spec: &'s TableSpec) -> Self {
        Self {
            spec,
            statement: build_upsert_statement(spec),
        }
    }

    pub fn statement(&self) -> &str {
        &self.statement
    }

    /// Execute the upsert for one row on the caller's connection.
    ///
    /// Prepared statements are cached per connection with the parameter types
    /// of their first execution, so NULLs carry the column's own type.
    pub async fn execute(
        &self,
        conn: &mut PgConnection,
        row: &NormalizedRow,
    ) -> Result<u64, sqlx::Error> {
        debug_assert_eq!(row.values.len(), self.spec.columns().len());

        let mut query = sqlx::query(&self.statement);
        for (column, value) in self.spec.columns().iter().zip(&row.values) {
            query = match value {
                CellValue::Null => match column.kind {
                    ColumnKind::Json => query.bind(None::<Json<Value>>),
                    ColumnKind::Boolean => query.bind(None::<bool>),
                    ColumnKind::Text => query.bind(None::<String>),
                },
                CellValue::Text(text) => query.bind(text.as_str()),
                CellValue::Bool(flag) => query.bind(*flag),
                CellValue::Json(json) => query.bind(Json(json)),
            };
        }

        let result = query.execute(conn).await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::table_spec::{ColumnSpec, TableRegistry};

    #[test]
    fn builds_demo_code_upsert() {
        let registry = TableRegistry::standard().unwrap();
        let spec = registry.get("demo_codes").unwrap();
        assert_eq!(
            build_upsert_statement(spec),
            "INSERT INTO demo_codes (topic_id, demo_code) VALUES ($1::integer, $2::text) \
             ON CONFLICT (topic_id) DO UPDATE SET demo_code = EXCLUDED.demo_code"
        );
    }

    #[test]
    fn binding_order_matches_column_order() {
        let registry = TableRegistry::standard().unwrap();
        let spec = registry.get("questions").unwrap();
        let statement = build_upsert_statement(spec);
        assert!(statement.starts_with(
            "INSERT INTO questions (id, subject_id, topic_id, text, options, correct_answer, explanation, difficulty, is_demo) \
             VALUES ($1::integer, $2::integer, $3::integer, $4::text, $5::jsonb, $6::text, $7::text, $8::text, $9::boolean)"
        ));
        assert!(statement.contains("ON CONFLICT (id) DO UPDATE SET subject_id = EXCLUDED.subject_id"));
        assert!(!statement.contains("id = EXCLUDED.id,"));
        assert!(statement.ends_with("is_demo = EXCLUDED.is_demo"));
    }

    #[test]
    fn conflict_target_is_never_reassigned() {
        let registry = TableRegistry::standard().unwrap();
        let spec = registry.get("users").unwrap();
        let statement = build_upsert_statement(spec);
        let (_, update) = statement.split_once("DO UPDATE SET ").unwrap();
        let assigned: Vec<_> = update
            .split(", ")
            .map(|part| part.split(" = ").next().unwrap())
            .collect();
        assert_eq!(assigned, vec!["id", "name", "password_hash", "role"]);
    }

    #[test]
    fn key_only_table_does_nothing_on_conflict() {
        let spec =
            TableSpec::new("tags", vec![ColumnSpec::text("tag", "text")], "tag").unwrap();
        assert_eq!(
            build_upsert_statement(&spec),
            "INSERT INTO tags (tag) VALUES ($1::text) ON CONFLICT (tag) DO NOTHING"
        );
    }

    #[test]
    fn sequence_sync_only_for_identity_tables() {
        let registry = TableRegistry::standard().unwrap();
        assert!(build_sequence_sync_statement(registry.get("users").unwrap()).is_none());
        assert_eq!(
            build_sequence_sync_statement(registry.get("exams").unwrap()).unwrap(),
            "SELECT setval(pg_get_serial_sequence('exams', 'id'), COALESCE(MAX(id), 0) + 1, false) FROM exams"
        );
    }
}
