//! Orchestrates one CSV upload from raw bytes to a committed transaction.
//!
//! The flow is strictly sequential:
//! 1. Resolve the table spec and validate the header row
//! 2. Decode every data row (parse failures abort before the database is touched)
//! 3. Open a transaction and upsert row by row in file order
//! 4. Roll back on the first failing row, otherwise resync identity sequences and commit

use rocket_db_pools::sqlx::{self, PgPool, Postgres, Transaction};
use thiserror::Error;

use crate::import::normalize::normalize_row;
use crate::import::parser::{CsvDocument, ParseError, ParsedRow};
use crate::import::stats::ImportSummary;
use crate::import::table_spec::{TableRegistry, TableSpec};
use crate::import::upsert::{UpsertExecutor, build_sequence_sync_statement};
use crate::import::workbook::WorkbookError;

/// Failures of a bulk import. Only `Database` leaves the outcome unknown to the caller.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("table '{0}' is not importable")]
    UnknownTable(String),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("CSV is missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error("row {row_number} failed: {message}")]
    RowFailed { row_number: usize, message: String },
    #[error(transparent)]
    Workbook(#[from] WorkbookError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Runs CSV imports against a fixed table registry.
pub struct CsvImporter<'a> {
    pool: &'a PgPool,
    registry: &'a TableRegistry,
}

impl<'a> CsvImporter<'a> {
    pub fn new(pool: &'a PgPool, registry: &'a TableRegistry) -> Self {
        Self { pool, registry }
    }

    /// Import `bytes` into `table_name`, all or nothing.
    pub async fn import(&self, table_name: &str, bytes: &[u8]) -> Result<ImportSummary, ImportError> {
        let spec = self
            .registry
            .get(table_name)
            .ok_or_else(|| ImportError::UnknownTable(table_name.to_string()))?;

        let document = CsvDocument::parse(bytes)?;
        let missing = spec.missing_columns(document.headers());
        if !missing.is_empty() {
            log::info!(
                "csv import into {}: rejected, missing columns {:?}",
                spec.table(),
                missing
            );
            return Err(ImportError::MissingColumns(missing));
        }

        let rows = document.rows().collect::<Result<Vec<_>, _>>()?;
        log::debug!(
            "csv import into {}: decoded {} rows",
            spec.table(),
            rows.len()
        );

        let mut tx = self.pool.begin().await?;
        if let Err(err) = apply_rows(&mut tx, spec, &rows).await {
            if let Err(rollback_err) = tx.rollback().await {
                log::warn!(
                    "csv import into {}: rollback failed: {}",
                    spec.table(),
                    rollback_err
                );
            }
            return Err(err);
        }
        tx.commit().await?;

        log::info!(
            "csv import into {}: committed {} rows",
            spec.table(),
            rows.len()
        );

        Ok(ImportSummary {
            inserted_count: rows.len(),
        })
    }
}

async fn apply_rows(
    tx: &mut Transaction<'_, Postgres>,
    spec: &TableSpec,
    rows: &[ParsedRow],
) -> Result<(), ImportError> {
    let executor = UpsertExecutor::new(spec);

    for row in rows {
        let normalized = normalize_row(spec, row).map_err(|err| {
            log::warn!("csv import into {}: {}", spec.table(), err);
            ImportError::RowFailed {
                row_number: row.row_number,
                message: err.to_string(),
            }
        })?;

        executor
            .execute(&mut **tx, &normalized)
            .await
            .map_err(|err| {
                log::warn!(
                    "csv import into {}: row {} rejected: {}",
                    spec.table(),
                    row.row_number,
                    err
                );
                ImportError::RowFailed {
                    row_number: row.row_number,
                    message: storage_message(&err),
                }
            })?;
    }

    if let Some(statement) = build_sequence_sync_statement(spec) {
        sqlx::query(&statement).execute(&mut **tx).await?;
    }

    Ok(())
}

/// Message reported to the uploader for a failed statement.
fn storage_message(err: &sqlx::Error) -> String {
    match err {
        sqlx::Error::Database(db_err) => db_err.message().to_string(),
        other => other.to_string(),
    }
}
