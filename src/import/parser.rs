//! CSV decoding for bulk uploads.
//!
//! Headers are read eagerly; data rows are produced lazily in file order and
//! keyed by the trimmed header names.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

const UTF8_BOM: char = '\u{feff}';

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// One data row keyed by header name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRow {
    /// 1-based position among the data rows (header excluded).
    pub row_number: usize,
    values: HashMap<String, String>,
}

impl ParsedRow {
    pub fn new(row_number: usize, values: HashMap<String, String>) -> Self {
        Self { row_number, values }
    }

    /// Raw cell for `column`, or `None` when the row was too short.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.values.get(column).map(String::as_str)
    }
}

/// A CSV upload with its header row already consumed.
pub struct CsvDocument<'a> {
    headers: Arc<[String]>,
    reader: csv::Reader<&'a [u8]>,
}

impl<'a> CsvDocument<'a> {
    pub fn parse(bytes: &'a [u8]) -> Result<Self, ParseError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_reader(bytes);

        let headers: Arc<[String]> = reader
            .headers()?
            .iter()
            .enumerate()
            .map(|(idx, header)| {
                let header = if idx == 0 {
                    header.trim_start_matches(UTF8_BOM)
                } else {
                    header
                };
                header.trim().to_string()
            })
            .collect();

        Ok(Self { headers, reader })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Consume the document, yielding data rows in file order.
    pub fn rows(self) -> ParsedRows<'a> {
        ParsedRows {
            headers: self.headers,
            records: self.reader.into_records(),
            row_number: 0,
        }
    }
}

/// Lazy, single-pass iterator over the data rows of a [`CsvDocument`].
pub struct ParsedRows<'a> {
    headers: Arc<[String]>,
    records: csv::StringRecordsIntoIter<&'a [u8]>,
    row_number: usize,
}

impl Iterator for ParsedRows<'_> {
    type Item = Result<ParsedRow, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.records.next()? {
            Ok(record) => record,
            Err(err) => return Some(Err(ParseError::from(err))),
        };
        self.row_number += 1;

        // Fields beyond the header count are dropped; missing trailing fields
        // simply have no entry.
        let values = self
            .headers
            .iter()
            .zip(record.iter())
            .map(|(header, value)| (header.clone(), value.to_string()))
            .collect();

        Some(Ok(ParsedRow::new(self.row_number, values)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect_rows(input: &[u8]) -> (Vec<String>, Vec<ParsedRow>) {
        let document = CsvDocument::parse(input).expect("parse headers");
        let headers = document.headers().to_vec();
        let rows = document
            .rows()
            .collect::<Result<Vec<_>, _>>()
            .expect("parse rows");
        (headers, rows)
    }

    #[test]
    fn trims_headers_and_keeps_values_verbatim() {
        let (headers, rows) = collect_rows(b" topic_id , demo_code \n1, ABCD \n2,EFGH\n");
        assert_eq!(headers, vec!["topic_id", "demo_code"]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].row_number, 1);
        assert_eq!(rows[0].get("topic_id"), Some("1"));
        assert_eq!(rows[0].get("demo_code"), Some(" ABCD "));
        assert_eq!(rows[1].row_number, 2);
        assert_eq!(rows[1].get("demo_code"), Some("EFGH"));
    }

    #[test]
    fn short_rows_leave_trailing_columns_absent() {
        let (_, rows) = collect_rows(b"a,b,c\n1,2\n");
        assert_eq!(rows[0].get("a"), Some("1"));
        assert_eq!(rows[0].get("b"), Some("2"));
        assert_eq!(rows[0].get("c"), None);
    }

    #[test]
    fn extra_fields_are_dropped() {
        let (_, rows) = collect_rows(b"a,b\n1,2,3,4\n");
        assert_eq!(rows[0].get("a"), Some("1"));
        assert_eq!(rows[0].get("b"), Some("2"));
        assert_eq!(rows[0].get("3"), None);
    }

    #[test]
    fn quoted_fields_keep_commas_and_json() {
        let (_, rows) =
            collect_rows(b"id,options\n7,\"{\"\"a\"\":\"\"X\"\",\"\"b\"\":\"\"Y\"\"}\"\n");
        assert_eq!(rows[0].get("options"), Some(r#"{"a":"X","b":"Y"}"#));
    }

    #[test]
    fn strips_byte_order_mark_from_first_header() {
        let (headers, _) = collect_rows("\u{feff}subject_id,name\n1,Maths\n".as_bytes());
        assert_eq!(headers, vec!["subject_id", "name"]);
    }

    #[test]
    fn empty_input_has_no_headers_or_rows() {
        let (headers, rows) = collect_rows(b"");
        assert!(headers.is_empty());
        assert!(rows.is_empty());
    }

    #[test]
    fn invalid_utf8_in_a_row_is_a_parse_error() {
        let document = CsvDocument::parse(b"a,b\n1,\xff\xfe\n").expect("headers decode");
        let result: Result<Vec<_>, _> = document.rows().collect();
        assert!(matches!(result, Err(ParseError::Csv(_))));
    }

    #[test]
    fn invalid_utf8_in_header_fails_immediately() {
        assert!(CsvDocument::parse(b"\xff\xfe,b\n1,2\n").is_err());
    }
}
