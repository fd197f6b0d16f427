//! Static description of every table the bulk importer may write to.
//!
//! A [`TableRegistry`] is built once during ignition and handed to the
//! importer through Rocket state, so tests can substitute their own specs.

use std::collections::BTreeMap;
use thiserror::Error;

/// How raw cell text is turned into a bound value for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Passed through unchanged; Postgres casts it to the column type.
    Text,
    /// Parsed as JSON before binding.
    Json,
    /// Mapped onto `true`/`false` through the truthy token set.
    Boolean,
}

/// A single importable column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    /// Postgres type used to cast the bound parameter (`integer`, `text`, ...).
    pub sql_type: &'static str,
    pub kind: ColumnKind,
}

impl ColumnSpec {
    pub const fn text(name: &'static str, sql_type: &'static str) -> Self {
        Self {
            name,
            sql_type,
            kind: ColumnKind::Text,
        }
    }

    pub const fn json(name: &'static str) -> Self {
        Self {
            name,
            sql_type: "jsonb",
            kind: ColumnKind::Json,
        }
    }

    pub const fn boolean(name: &'static str) -> Self {
        Self {
            name,
            sql_type: "boolean",
            kind: ColumnKind::Boolean,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableSpecError {
    #[error("table '{0}' must declare at least one column")]
    NoColumns(String),
    #[error("'{0}' is not a valid SQL identifier")]
    InvalidIdentifier(String),
    #[error("column '{column}' is declared twice on table '{table}'")]
    DuplicateColumn { table: String, column: String },
    #[error("conflict target '{target}' is not a column of table '{table}'")]
    UnknownConflictTarget { table: String, target: String },
    #[error("identity column '{column}' is not a column of table '{table}'")]
    UnknownIdentityColumn { table: String, column: String },
}

/// Importable shape of one destination table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    table: &'static str,
    columns: Vec<ColumnSpec>,
    conflict_target: &'static str,
    identity_column: Option<&'static str>,
}

impl TableSpec {
    /// Validate and build a table spec.
    ///
    /// Table and column names are spliced into generated SQL, so only plain
    /// lower-case identifiers are accepted.
    pub fn new(
        table: &'static str,
        columns: Vec<ColumnSpec>,
        conflict_target: &'static str,
    ) -> Result<Self, TableSpecError> {
        ensure_identifier(table)?;
        if columns.is_empty() {
            return Err(TableSpecError::NoColumns(table.to_string()));
        }

        for (idx, column) in columns.iter().enumerate() {
            ensure_identifier(column.name)?;
            ensure_identifier(column.sql_type)?;
            if columns[..idx].iter().any(|prev| prev.name == column.name) {
                return Err(TableSpecError::DuplicateColumn {
                    table: table.to_string(),
                    column: column.name.to_string(),
                });
            }
        }

        if !columns.iter().any(|column| column.name == conflict_target) {
            return Err(TableSpecError::UnknownConflictTarget {
                table: table.to_string(),
                target: conflict_target.to_string(),
            });
        }

        Ok(Self {
            table,
            columns,
            conflict_target,
            identity_column: None,
        })
    }

    /// Mark a generated-identity column whose sequence must follow imported keys.
    pub fn with_identity(mut self, column: &'static str) -> Result<Self, TableSpecError> {
        if !self.columns.iter().any(|c| c.name == column) {
            return Err(TableSpecError::UnknownIdentityColumn {
                table: self.table.to_string(),
                column: column.to_string(),
            });
        }
        self.identity_column = Some(column);
        Ok(self)
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|column| column.name)
    }

    pub fn conflict_target(&self) -> &'static str {
        self.conflict_target
    }

    pub fn identity_column(&self) -> Option<&'static str> {
        self.identity_column
    }

    /// Columns reassigned when an incoming row hits an existing key.
    pub fn update_columns(&self) -> impl Iterator<Item = &ColumnSpec> + '_ {
        self.columns
            .iter()
            .filter(move |column| column.name != self.conflict_target)
    }

    /// Required column names absent from `headers`, in spec order.
    pub fn missing_columns<S: AsRef<str>>(&self, headers: &[S]) -> Vec<String> {
        self.column_names()
            .filter(|name| !headers.iter().any(|header| header.as_ref() == *name))
            .map(str::to_string)
            .collect()
    }
}

fn ensure_identifier(value: &str) -> Result<(), TableSpecError> {
    let mut chars = value.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_lowercase() || first == '_' => chars
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'),
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(TableSpecError::InvalidIdentifier(value.to_string()))
    }
}

/// Immutable lookup from table name to [`TableSpec`].
#[derive(Debug, Clone, Default)]
pub struct TableRegistry {
    specs: BTreeMap<&'static str, TableSpec>,
}

impl TableRegistry {
    pub fn from_specs(specs: impl IntoIterator<Item = TableSpec>) -> Self {
        Self {
            specs: specs.into_iter().map(|spec| (spec.table(), spec)).collect(),
        }
    }

    /// Registry of the tables exposed through the admin upload form.
    pub fn standard() -> Result<Self, TableSpecError> {
        use ColumnSpec as C;

        let specs = vec![
            TableSpec::new(
                "subjects",
                vec![
                    C::text("subject_id", "integer"),
                    C::text("name", "text"),
                    C::text("description", "text"),
                ],
                "subject_id",
            )?
            .with_identity("subject_id")?,
            TableSpec::new(
                "topics",
                vec![
                    C::text("topic_id", "integer"),
                    C::text("subject_id", "integer"),
                    C::text("name", "text"),
                    C::text("description", "text"),
                ],
                "topic_id",
            )?
            .with_identity("topic_id")?,
            TableSpec::new(
                "atomic_topics",
                vec![
                    C::text("atomic_topic_id", "integer"),
                    C::text("topic_id", "integer"),
                    C::text("name", "text"),
                    C::text("description", "text"),
                ],
                "atomic_topic_id",
            )?
            .with_identity("atomic_topic_id")?,
            TableSpec::new(
                "questions",
                vec![
                    C::text("id", "integer"),
                    C::text("subject_id", "integer"),
                    C::text("topic_id", "integer"),
                    C::text("text", "text"),
                    C::json("options"),
                    C::text("correct_answer", "text"),
                    C::text("explanation", "text"),
                    C::text("difficulty", "text"),
                    C::boolean("is_demo"),
                ],
                "id",
            )?
            .with_identity("id")?,
            TableSpec::new(
                "exams",
                vec![
                    C::text("id", "integer"),
                    C::text("title", "text"),
                    C::text("category", "text"),
                    C::text("price", "integer"),
                    C::text("validity_days", "integer"),
                    C::text("description", "text"),
                ],
                "id",
            )?
            .with_identity("id")?,
            TableSpec::new(
                "users",
                vec![
                    C::text("id", "uuid"),
                    C::text("name", "text"),
                    C::text("email", "text"),
                    C::text("password_hash", "text"),
                    C::text("role", "text"),
                ],
                "email",
            )?,
            TableSpec::new(
                "demo_codes",
                vec![C::text("topic_id", "integer"), C::text("demo_code", "text")],
                "topic_id",
            )?,
        ];

        Ok(Self::from_specs(specs))
    }

    pub fn get(&self, table: &str) -> Option<&TableSpec> {
        self.specs.get(table)
    }

    pub fn table_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.specs.keys().copied()
    }
}
