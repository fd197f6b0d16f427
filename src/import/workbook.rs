//! Spreadsheet import of practice questions.
//!
//! The first worksheet is read with its first row as headers. Header names
//! are matched loosely (`Option A`, `option_a` and `OptionA` are the same
//! column). Rows missing a required cell are skipped and reported; every
//! other row is inserted inside a single transaction.

use std::collections::HashMap;
use std::io::Cursor;

use calamine::{Data, Reader, open_workbook_auto_from_rs};
use rocket_db_pools::sqlx::{self, PgPool, types::Json};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::import::coordinator::ImportError;
use crate::import::normalize::parse_truthy;
use crate::import::parser::ParsedRow;
use crate::import::stats::WorkbookImportSummary;

const OPTION_COLUMNS: [(&str, &str); 4] = [
    ("optiona", "a"),
    ("optionb", "b"),
    ("optionc", "c"),
    ("optiond", "d"),
];

#[derive(Debug, Error)]
pub enum WorkbookError {
    #[error("unreadable workbook: {0}")]
    Read(#[from] calamine::Error),
    #[error("workbook has no worksheets")]
    NoSheets,
}

/// A question row that passed the completeness checks.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionDraft {
    pub row_number: usize,
    pub subject_id: i32,
    pub topic_id: i32,
    pub text: String,
    pub options: Value,
    pub correct_answer: String,
    pub explanation: Option<String>,
    pub difficulty: Option<String>,
    pub is_demo: bool,
}

fn header_key(header: &str) -> String {
    header
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string().trim().to_string(),
    }
}

/// Read the first worksheet into rows keyed by normalized header.
pub fn read_first_sheet(bytes: &[u8]) -> Result<Vec<ParsedRow>, WorkbookError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(WorkbookError::NoSheets)??;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header_row) => header_row.iter().map(|cell| header_key(&cell_text(cell))).collect(),
        None => return Ok(Vec::new()),
    };

    let parsed = rows
        .enumerate()
        .map(|(idx, cells)| {
            let values: HashMap<String, String> = headers
                .iter()
                .zip(cells.iter())
                .filter(|(header, _)| !header.is_empty())
                .map(|(header, cell)| (header.clone(), cell_text(cell)))
                .collect();
            ParsedRow::new(idx + 1, values)
        })
        .collect();

    Ok(parsed)
}

fn non_empty<'r>(row: &'r ParsedRow, key: &str) -> Option<&'r str> {
    row.get(key).map(str::trim).filter(|value| !value.is_empty())
}

fn parse_id(raw: &str) -> Option<i32> {
    raw.parse::<i32>()
        .ok()
        .or_else(|| raw.parse::<f64>().ok().filter(|v| v.fract() == 0.0).map(|v| v as i32))
}

/// Build a question from a sheet row, or `None` when the row must be skipped.
pub fn question_from_row(row: &ParsedRow) -> Option<QuestionDraft> {
    let subject_id = non_empty(row, "subjectid").and_then(parse_id)?;
    let topic_id = non_empty(row, "topicid").and_then(parse_id)?;
    let text = non_empty(row, "question").or_else(|| non_empty(row, "text"))?;
    let correct_answer = non_empty(row, "correctanswer")?;

    let options: Map<String, Value> = OPTION_COLUMNS
        .iter()
        .filter_map(|(column, key)| {
            non_empty(row, column).map(|value| (key.to_string(), Value::String(value.to_string())))
        })
        .collect();
    if options.is_empty() {
        return None;
    }

    let is_demo = non_empty(row, "isdemo")
        .or_else(|| non_empty(row, "isdemoquestion"))
        .is_some_and(parse_truthy);

    Some(QuestionDraft {
        row_number: row.row_number,
        subject_id,
        topic_id,
        text: text.to_string(),
        options: Value::Object(options),
        correct_answer: correct_answer.to_string(),
        explanation: non_empty(row, "explanation").map(str::to_string),
        difficulty: non_empty(row, "difficulty").map(str::to_string),
        is_demo,
    })
}

/// Insert every complete question row from the workbook, all or nothing.
pub async fn import_question_workbook(
    pool: &PgPool,
    bytes: &[u8],
) -> Result<WorkbookImportSummary, ImportError> {
    let rows = read_first_sheet(bytes)?;
    let mut summary = WorkbookImportSummary::default();
    let mut drafts = Vec::with_capacity(rows.len());

    for row in &rows {
        match question_from_row(row) {
            Some(draft) => drafts.push(draft),
            None => summary.record_skip(row.row_number),
        }
    }

    let mut tx = pool.begin().await?;
    for draft in &drafts {
        let result = sqlx::query(
            r#"INSERT INTO questions
               (subject_id, topic_id, text, options, correct_answer, explanation, difficulty, is_demo)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"#,
        )
        .bind(draft.subject_id)
        .bind(draft.topic_id)
        .bind(&draft.text)
        .bind(Json(&draft.options))
        .bind(&draft.correct_answer)
        .bind(draft.explanation.as_deref())
        .bind(draft.difficulty.as_deref())
        .bind(draft.is_demo)
        .execute(&mut *tx)
        .await;

        if let Err(err) = result {
            log::warn!(
                "workbook import: row {} rejected: {}",
                draft.row_number,
                err
            );
            if let Err(rollback_err) = tx.rollback().await {
                log::warn!("workbook import: rollback failed: {}", rollback_err);
            }
            let message = match &err {
                sqlx::Error::Database(db_err) => db_err.message().to_string(),
                other => other.to_string(),
            };
            return Err(ImportError::RowFailed {
                row_number: draft.row_number,
                message,
            });
        }
        summary.record_insert();
    }
    tx.commit().await?;

    log::info!(
        "workbook import: inserted {} questions, skipped {} rows",
        summary.inserted_count,
        summary.skipped_rows.len()
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(number: usize, cells: &[(&str, &str)]) -> ParsedRow {
        ParsedRow::new(
            number,
            cells
                .iter()
                .map(|(k, v)| (header_key(k), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn header_keys_ignore_case_and_separators() {
        assert_eq!(header_key("Option A"), "optiona");
        assert_eq!(header_key("option_a"), "optiona");
        assert_eq!(header_key("TopicId"), "topicid");
        assert_eq!(header_key(" Is-Demo "), "isdemo");
    }

    #[test]
    fn builds_question_from_complete_row() {
        let draft = question_from_row(&row(
            2,
            &[
                ("SubjectId", "1"),
                ("TopicId", "4.0"),
                ("Question", "What is 2 + 2?"),
                ("OptionA", "3"),
                ("OptionB", "4"),
                ("OptionC", ""),
                ("CorrectAnswer", "b"),
                ("Explanation", "Basic arithmetic"),
                ("IsDemo", "Yes"),
            ],
        ))
        .expect("complete row");

        assert_eq!(draft.row_number, 2);
        assert_eq!(draft.subject_id, 1);
        assert_eq!(draft.topic_id, 4);
        assert_eq!(draft.options, json!({"a": "3", "b": "4"}));
        assert_eq!(draft.correct_answer, "b");
        assert_eq!(draft.explanation.as_deref(), Some("Basic arithmetic"));
        assert_eq!(draft.difficulty, None);
        assert!(draft.is_demo);
    }

    #[test]
    fn skips_rows_missing_required_cells() {
        let base = [
            ("SubjectId", "1"),
            ("TopicId", "2"),
            ("Question", "Q"),
            ("OptionA", "x"),
            ("CorrectAnswer", "a"),
        ];
        assert!(question_from_row(&row(1, &base)).is_some());

        for missing in ["SubjectId", "TopicId", "Question", "OptionA", "CorrectAnswer"] {
            let cells: Vec<_> = base.iter().copied().filter(|(k, _)| *k != missing).collect();
            assert!(
                question_from_row(&row(1, &cells)).is_none(),
                "row without {missing} should be skipped"
            );
        }
    }

    #[test]
    fn non_numeric_ids_are_skipped() {
        let cells = [
            ("SubjectId", "maths"),
            ("TopicId", "2"),
            ("Question", "Q"),
            ("OptionA", "x"),
            ("CorrectAnswer", "a"),
        ];
        assert!(question_from_row(&row(1, &cells)).is_none());
    }

    #[test]
    fn garbage_bytes_are_not_a_workbook() {
        assert!(matches!(
            read_first_sheet(b"definitely not a spreadsheet"),
            Err(WorkbookError::Read(_))
        ));
    }
}
