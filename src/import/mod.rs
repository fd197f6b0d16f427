//! Bulk data import.
//!
//! CSV uploads flow through four stages:
//! - [`parser`]: decode the upload into header-keyed rows
//! - [`normalize`]: turn raw cells into typed values per [`table_spec`]
//! - [`upsert`]: generate and run `INSERT ... ON CONFLICT` per row
//! - [`coordinator`]: wrap the whole file in one transaction
//!
//! [`workbook`] handles spreadsheet uploads of practice questions.

pub mod coordinator;
pub mod normalize;
pub mod parser;
pub mod stats;
pub mod table_spec;
pub mod upsert;
pub mod workbook;

pub use coordinator::{CsvImporter, ImportError};
pub use stats::{ImportSummary, WorkbookImportSummary};
pub use table_spec::{ColumnKind, ColumnSpec, TableRegistry, TableSpec, TableSpecError};
pub use workbook::import_question_workbook;
