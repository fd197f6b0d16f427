//! Conversion of raw CSV cells into typed values ready for binding.

use serde_json::Value;
use thiserror::Error;

use crate::import::parser::ParsedRow;
use crate::import::table_spec::{ColumnKind, ColumnSpec, TableSpec};

/// Tokens (after trimming and lower-casing) that read as `true`.
pub const TRUTHY_TOKENS: [&str; 4] = ["true", "1", "yes", "y"];

/// Value bound to one placeholder of the upsert statement.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Text(String),
    Bool(bool),
    Json(Value),
}

#[derive(Debug, Error)]
#[error("invalid JSON in {column} column at row {row_number}: {source}")]
pub struct FormatError {
    pub row_number: usize,
    pub column: String,
    #[source]
    pub source: serde_json::Error,
}

/// A row whose values line up one-to-one with its table's columns.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    pub row_number: usize,
    pub values: Vec<CellValue>,
}

/// Read a boolean cell. Unrecognised tokens are `false`, never an error.
pub fn parse_truthy(raw: &str) -> bool {
    let token = raw.trim().to_lowercase();
    TRUTHY_TOKENS.contains(&token.as_str())
}

/// Normalize a single cell for `column`.
pub fn normalize_value(
    column: &ColumnSpec,
    raw: Option<&str>,
    row_number: usize,
) -> Result<CellValue, FormatError> {
    if column.kind == ColumnKind::Boolean {
        return Ok(CellValue::Bool(raw.is_some_and(parse_truthy)));
    }

    let raw = match raw {
        Some(value) if !value.is_empty() => value,
        _ => return Ok(CellValue::Null),
    };

    match column.kind {
        ColumnKind::Json => serde_json::from_str(raw)
            .map(CellValue::Json)
            .map_err(|source| FormatError {
                row_number,
                column: column.name.to_string(),
                source,
            }),
        ColumnKind::Text | ColumnKind::Boolean => Ok(CellValue::Text(raw.to_string())),
    }
}

/// Project a parsed row onto the spec's column order.
pub fn normalize_row(spec: &TableSpec, row: &ParsedRow) -> Result<NormalizedRow, FormatError> {
    let values = spec
        .columns()
        .iter()
        .map(|column| normalize_value(column, row.get(column.name), row.row_number))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(NormalizedRow {
        row_number: row.row_number,
        values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    const FLAG: ColumnSpec = ColumnSpec::boolean("is_demo");
    const OPTIONS: ColumnSpec = ColumnSpec::json("options");
    const NAME: ColumnSpec = ColumnSpec::text("name", "text");

    #[test]
    fn truthy_tokens_normalize_to_true() {
        for token in ["true", "1", "YES", "y", " True ", "Y"] {
            assert_eq!(
                normalize_value(&FLAG, Some(token), 1).unwrap(),
                CellValue::Bool(true),
                "token {token:?}"
            );
        }
    }

    #[test]
    fn everything_else_normalizes_to_false() {
        for token in ["false", "", "no", "maybe", "tru", "0"] {
            assert_eq!(
                normalize_value(&FLAG, Some(token), 1).unwrap(),
                CellValue::Bool(false),
                "token {token:?}"
            );
        }
        assert_eq!(
            normalize_value(&FLAG, None, 1).unwrap(),
            CellValue::Bool(false)
        );
    }

    #[test]
    fn json_column_parses_structured_value() {
        let value = normalize_value(&OPTIONS, Some(r#"{"a":"X","b":"Y","c":"Z"}"#), 4).unwrap();
        assert_eq!(value, CellValue::Json(json!({"a": "X", "b": "Y", "c": "Z"})));
    }

    #[test]
    fn invalid_json_names_column_and_row() {
        let err = normalize_value(&OPTIONS, Some("not json"), 3).unwrap_err();
        assert_eq!(err.row_number, 3);
        assert_eq!(err.column, "options");
        assert!(err.to_string().starts_with("invalid JSON in options column at row 3"));
    }

    #[test]
    fn empty_and_missing_cells_become_null() {
        assert_eq!(normalize_value(&NAME, Some(""), 1).unwrap(), CellValue::Null);
        assert_eq!(normalize_value(&NAME, None, 1).unwrap(), CellValue::Null);
        assert_eq!(normalize_value(&OPTIONS, Some(""), 1).unwrap(), CellValue::Null);
    }

    #[test]
    fn text_is_passed_through_unmodified() {
        assert_eq!(
            normalize_value(&NAME, Some("  Algebra "), 1).unwrap(),
            CellValue::Text("  Algebra ".into())
        );
    }

    #[test]
    fn row_values_follow_spec_order() {
        let spec = TableSpec::new(
            "questions",
            vec![
                ColumnSpec::text("id", "integer"),
                ColumnSpec::json("options"),
                ColumnSpec::boolean("is_demo"),
                ColumnSpec::text("explanation", "text"),
            ],
            "id",
        )
        .unwrap();

        let values: HashMap<String, String> = [
            ("explanation", "because"),
            ("is_demo", "yes"),
            ("id", "12"),
            ("options", "[1,2]"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let row = ParsedRow::new(5, values);

        let normalized = normalize_row(&spec, &row).unwrap();
        assert_eq!(normalized.row_number, 5);
        assert_eq!(
            normalized.values,
            vec![
                CellValue::Text("12".into()),
                CellValue::Json(json!([1, 2])),
                CellValue::Bool(true),
                CellValue::Text("because".into()),
            ]
        );
    }
}
