//! Result payloads for bulk imports.

use rocket_okapi::okapi::schemars::{self, JsonSchema};
use serde::{Deserialize, Serialize};

/// Outcome of a committed CSV import.
///
/// `inserted_count` counts processed rows, so a key repeated in the file is
/// counted once per occurrence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub inserted_count: usize,
}

/// Outcome of a committed spreadsheet question import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkbookImportSummary {
    pub inserted_count: usize,
    /// 1-based data rows left out because a required cell was blank or invalid.
    pub skipped_rows: Vec<usize>,
}

impl WorkbookImportSummary {
    pub fn record_insert(&mut self) {
        self.inserted_count += 1;
    }

    pub fn record_skip(&mut self, row_number: usize) {
        self.skipped_rows.push(row_number);
    }
}
