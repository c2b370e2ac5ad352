//! File loading with automatic per-column type inference.
//!
//! [`load_table`] turns a `.csv`, `.xlsx`, or `.xls` file into a
//! [`Table`](crate::table::Table); any other extension fails with
//! [`UnsupportedFormat`](PipelineError::UnsupportedFormat). No content
//! validation happens here — malformed values are tolerated and surface
//! later as cleaning or anomaly findings.
//!
//! CSV parsing is RFC 4180 compliant (quoted fields, escaped quotes,
//! embedded newlines, CRLF, BOM). Inference priority per column is
//! Numeric → Boolean → Text; a column that fits neither numeric nor
//! boolean keeps its raw strings untouched, mixed content included, so
//! the cleaner can decide what to do with it.
//!
//! The null-marker list is finite and case-sensitive. Variants it does
//! not cover (`"Null"`, `"NONE"`, …) survive as text on purpose: the
//! anomaly detector's sentinel check is what hunts those down.
//!
//! # Example
//!
//! ```
//! use datalens::loader::CsvReader;
//! use datalens::table::DataType;
//!
//! let csv = "name,value,active\nAlice,1.5,true\nBob,2.3,false\n";
//! let table = CsvReader::new().parse_str(csv).unwrap();
//! assert_eq!(table.row_count(), 2);
//! assert_eq!(table.column(1).unwrap().dtype(), DataType::Numeric);
//! assert_eq!(table.column(2).unwrap().dtype(), DataType::Boolean);
//! ```

use crate::error::PipelineError;
use crate::table::{Cell, Column, DataType, Table};
use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;

/// Standard null-value markers recognized while parsing.
const NULL_MARKERS: &[&str] = &[
    "", "NA", "N/A", "na", "n/a", "null", "NULL", "None", "none", ".", "NaN", "nan", "NAN",
    "#N/A", "#NA",
];

/// Loads a table from a file path, dispatching on the extension.
///
/// `.csv` files go through [`CsvReader`]; `.xlsx`/`.xls` are read with
/// the first worksheet's contents. Anything else is rejected.
pub fn load_table(path: &Path) -> Result<Table, PipelineError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match extension.as_str() {
        "csv" => CsvReader::new().parse_path(path),
        "xlsx" | "xls" => read_spreadsheet(path),
        other => Err(PipelineError::UnsupportedFormat {
            extension: other.to_string(),
        }),
    }
}

// ── CSV ───────────────────────────────────────────────────────────────

/// CSV reader configuration and entry point.
///
/// ```
/// use datalens::loader::CsvReader;
///
/// let table = CsvReader::new().parse_str("a,b\n1,2\n3,4\n").unwrap();
/// assert_eq!(table.shape(), (2, 2));
/// ```
#[derive(Debug, Clone)]
pub struct CsvReader {
    delimiter: u8,
    has_header: bool,
    null_markers: Vec<String>,
}

impl CsvReader {
    /// Creates a reader with default settings (comma delimiter, header
    /// row, standard null markers).
    pub fn new() -> Self {
        Self {
            delimiter: b',',
            has_header: true,
            null_markers: NULL_MARKERS.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    /// Sets the field delimiter (default: comma).
    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Sets whether the first record is a header (default: true).
    pub fn has_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    /// Replaces the null-marker list.
    pub fn null_markers(mut self, markers: Vec<String>) -> Self {
        self.null_markers = markers;
        self
    }

    /// Parses CSV text into a table.
    pub fn parse_str(&self, input: &str) -> Result<Table, PipelineError> {
        let input = input.strip_prefix('\u{feff}').unwrap_or(input);
        let records = self.split_records(input);
        if records.is_empty() {
            return Ok(Table::new());
        }

        let (names, data): (Vec<String>, &[Vec<String>]) = if self.has_header {
            (records[0].clone(), &records[1..])
        } else {
            let width = records[0].len();
            ((0..width).map(|i| format!("col_{i}")).collect(), &records[..])
        };
        if data.is_empty() {
            return Ok(Table::new());
        }

        let width = names.len();
        let mut raw_columns: Vec<Vec<String>> = vec![Vec::with_capacity(data.len()); width];
        for (record_idx, record) in data.iter().enumerate() {
            // A blank line inside a multi-column file is structural
            // noise, not a one-field record.
            if width > 1 && record.len() == 1 && record[0].is_empty() {
                continue;
            }
            if record.len() != width {
                let line = record_idx + if self.has_header { 2 } else { 1 };
                return Err(PipelineError::Parse {
                    line,
                    message: format!("expected {width} fields, got {}", record.len()),
                });
            }
            for (col, field) in record.iter().enumerate() {
                raw_columns[col].push(field.clone());
            }
        }

        let mut table = Table::new();
        for (name, raw) in names.into_iter().zip(raw_columns.iter()) {
            table
                .add_column(name, self.build_column(raw))
                .expect("columns built from uniform records share one length");
        }
        Ok(table)
    }

    /// Parses a CSV file from disk.
    pub fn parse_path(&self, path: &Path) -> Result<Table, PipelineError> {
        let content = std::fs::read_to_string(path)?;
        self.parse_str(&content)
    }

    // ── Record splitting ─────────────────────────────────────────

    /// Splits CSV text into records of raw string fields, honoring
    /// quoting. Leading and trailing fully-empty records are dropped.
    fn split_records(&self, input: &str) -> Vec<Vec<String>> {
        let delimiter = self.delimiter as char;
        let mut records: Vec<Vec<String>> = Vec::new();
        let mut fields: Vec<String> = Vec::new();
        let mut buf = String::new();
        let mut in_quotes = false;
        let mut chars = input.chars().peekable();

        while let Some(c) = chars.next() {
            if in_quotes {
                if c == '"' {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        buf.push('"');
                    } else {
                        in_quotes = false;
                    }
                } else {
                    buf.push(c);
                }
                continue;
            }
            if c == '"' && buf.is_empty() {
                in_quotes = true;
            } else if c == delimiter {
                fields.push(std::mem::take(&mut buf));
            } else if c == '\n' {
                finish_record(&mut records, &mut fields, &mut buf);
            } else if c == '\r' {
                // CRLF is handled by the '\n' branch; a bare '\r' is an
                // old-Mac line break.
                if chars.peek() != Some(&'\n') {
                    finish_record(&mut records, &mut fields, &mut buf);
                }
            } else {
                buf.push(c);
            }
        }
        if !buf.is_empty() || !fields.is_empty() {
            fields.push(buf);
            records.push(fields);
        }
        while records
            .last()
            .is_some_and(|r| r.iter().all(|f| f.is_empty()))
        {
            records.pop();
        }
        records
    }

    fn is_null_marker(&self, value: &str) -> bool {
        self.null_markers.iter().any(|m| m == value)
    }

    // ── Column construction ──────────────────────────────────────

    /// Infers the column type and builds typed cells.
    ///
    /// Inference looks at trimmed values; text cells are stored raw so
    /// that whitespace normalization remains the cleaner's job. An
    /// all-null column is declared Text (its imputation placeholder is
    /// textual).
    fn build_column(&self, raw: &[String]) -> Column {
        let trimmed: Vec<&str> = raw.iter().map(|s| s.trim()).collect();
        let null_flags: Vec<bool> = trimmed.iter().map(|s| self.is_null_marker(s)).collect();
        let non_null: Vec<&str> = trimmed
            .iter()
            .zip(null_flags.iter())
            .filter(|(_, &is_null)| !is_null)
            .map(|(&v, _)| v)
            .collect();

        if non_null.is_empty() {
            return Column::new(DataType::Text, vec![Cell::Null; raw.len()]);
        }

        if non_null.iter().all(|s| s.parse::<f64>().is_ok()) {
            let cells = trimmed
                .iter()
                .zip(null_flags.iter())
                .map(|(&v, &is_null)| {
                    if is_null {
                        Cell::Null
                    } else {
                        Cell::Number(v.parse::<f64>().unwrap_or(0.0))
                    }
                })
                .collect();
            return Column::new(DataType::Numeric, cells);
        }

        if non_null.iter().all(|s| is_boolean_str(s)) {
            let cells = trimmed
                .iter()
                .zip(null_flags.iter())
                .map(|(&v, &is_null)| {
                    if is_null {
                        Cell::Null
                    } else {
                        Cell::Bool(parse_boolean_str(v))
                    }
                })
                .collect();
            return Column::new(DataType::Boolean, cells);
        }

        let cells = raw
            .iter()
            .zip(null_flags.iter())
            .map(|(v, &is_null)| {
                if is_null {
                    Cell::Null
                } else {
                    Cell::Text(v.clone())
                }
            })
            .collect();
        Column::new(DataType::Text, cells)
    }
}

impl Default for CsvReader {
    fn default() -> Self {
        Self::new()
    }
}

fn finish_record(records: &mut Vec<Vec<String>>, fields: &mut Vec<String>, buf: &mut String) {
    fields.push(std::mem::take(buf));
    let record = std::mem::take(fields);
    // Skip blank lines before any data has been seen.
    if records.is_empty() && record.iter().all(|f| f.is_empty()) {
        return;
    }
    records.push(record);
}

/// Checks if a string is a recognized boolean word.
fn is_boolean_str(s: &str) -> bool {
    matches!(
        s.to_lowercase().as_str(),
        "true" | "false" | "yes" | "no" | "t" | "f" | "y" | "n"
    )
}

/// Parses a recognized boolean word.
fn parse_boolean_str(s: &str) -> bool {
    matches!(s.to_lowercase().as_str(), "true" | "yes" | "t" | "y")
}

// ── Spreadsheets ──────────────────────────────────────────────────────

/// Reads the first worksheet of an `.xlsx`/`.xls` workbook.
///
/// Spreadsheet cells arrive already typed; the declared column type is
/// the uniform non-null cell type, or Text for mixed columns.
fn read_spreadsheet(path: &Path) -> Result<Table, PipelineError> {
    let mut workbook =
        open_workbook_auto(path).map_err(|e| PipelineError::Spreadsheet(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| PipelineError::Spreadsheet("workbook has no sheets".into()))?
        .map_err(|e| PipelineError::Spreadsheet(e.to_string()))?;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(Table::new());
    };
    let names: Vec<String> = header
        .iter()
        .enumerate()
        .map(|(i, cell)| {
            let label = match cell {
                Data::String(s) => s.trim().to_string(),
                Data::Empty => String::new(),
                other => other.to_string(),
            };
            if label.is_empty() {
                format!("col_{i}")
            } else {
                label
            }
        })
        .collect();

    let data_rows: Vec<&[Data]> = rows.collect();
    if data_rows.is_empty() {
        return Ok(Table::new());
    }

    let mut table = Table::new();
    for (col_idx, name) in names.iter().enumerate() {
        let cells: Vec<Cell> = data_rows
            .iter()
            .map(|row| convert_spreadsheet_cell(row.get(col_idx).unwrap_or(&Data::Empty)))
            .collect();
        let dtype = infer_cell_dtype(&cells);
        table
            .add_column(name.clone(), Column::new(dtype, cells))
            .expect("spreadsheet columns share one length");
    }
    Ok(table)
}

fn convert_spreadsheet_cell(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Null,
        Data::Float(v) => Cell::Number(*v),
        Data::Int(v) => Cell::Number(*v as f64),
        Data::Bool(b) => Cell::Bool(*b),
        Data::String(s) => {
            let trimmed = s.trim();
            if NULL_MARKERS.contains(&trimmed) {
                Cell::Null
            } else {
                Cell::Text(s.clone())
            }
        }
        Data::DateTime(dt) => dt.as_datetime().map_or(Cell::Null, Cell::DateTime),
        Data::DateTimeIso(s) => s
            .parse::<chrono::NaiveDateTime>()
            .map_or_else(|_| Cell::Text(s.clone()), Cell::DateTime),
        Data::DurationIso(s) => Cell::Text(s.clone()),
    }
}

/// Declared type for a column of already-typed cells: the uniform
/// non-null variant, or Text when cells disagree or all are null.
fn infer_cell_dtype(cells: &[Cell]) -> DataType {
    let mut dtype: Option<DataType> = None;
    for cell in cells {
        let cell_type = match cell {
            Cell::Null => continue,
            Cell::Number(_) => DataType::Numeric,
            Cell::Bool(_) => DataType::Boolean,
            Cell::DateTime(_) => DataType::Temporal,
            Cell::Text(_) => DataType::Text,
        };
        match dtype {
            None => dtype = Some(cell_type),
            Some(t) if t == cell_type => {}
            Some(_) => return DataType::Text,
        }
    }
    dtype.unwrap_or(DataType::Text)
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── Extension dispatch ───────────────────────────────────────

    #[test]
    fn unsupported_extension_rejected() {
        let err = load_table(Path::new("data.parquet")).unwrap_err();
        assert_eq!(
            err,
            PipelineError::UnsupportedFormat {
                extension: "parquet".into()
            }
        );
    }

    #[test]
    fn missing_extension_rejected() {
        assert!(matches!(
            load_table(Path::new("data")),
            Err(PipelineError::UnsupportedFormat { .. })
        ));
    }

    // ── Basic parsing ────────────────────────────────────────────

    #[test]
    fn parse_simple_csv() {
        let table = CsvReader::new().parse_str("a,b,c\n1,2,3\n4,5,6\n").unwrap();
        assert_eq!(table.shape(), (2, 3));
        assert_eq!(table.column_names(), &["a", "b", "c"]);
    }

    #[test]
    fn parse_numeric_column() {
        let table = CsvReader::new()
            .parse_str("x\n1.5\n-4.2\n2.3e10\n")
            .unwrap();
        let x = table.column_by_name("x").unwrap();
        assert_eq!(x.dtype(), DataType::Numeric);
        assert_eq!(x.numeric_values(), vec![1.5, -4.2, 2.3e10]);
    }

    #[test]
    fn parse_boolean_column() {
        let table = CsvReader::new()
            .parse_str("flag\ntrue\nFalse\nyes\nno\n")
            .unwrap();
        let flag = table.column_by_name("flag").unwrap();
        assert_eq!(flag.dtype(), DataType::Boolean);
        assert_eq!(
            flag.cells(),
            &[
                Cell::Bool(true),
                Cell::Bool(false),
                Cell::Bool(true),
                Cell::Bool(false)
            ]
        );
    }

    #[test]
    fn mixed_column_stays_text_with_raw_strings() {
        let table = CsvReader::new().parse_str("x\n1\n2\nthree\n").unwrap();
        let x = table.column_by_name("x").unwrap();
        assert_eq!(x.dtype(), DataType::Text);
        // Numeric-looking values are kept as raw text; coercion is the
        // cleaner's job.
        assert_eq!(x.cell(0), &Cell::Text("1".into()));
        assert_eq!(x.cell(2), &Cell::Text("three".into()));
    }

    #[test]
    fn text_cells_preserve_whitespace() {
        let table = CsvReader::new()
            .parse_str("name\n  Alice  \nBob\nCara\nDee\n")
            .unwrap();
        let name = table.column_by_name("name").unwrap();
        assert_eq!(name.cell(0), &Cell::Text("  Alice  ".into()));
    }

    #[test]
    fn numeric_inference_tolerates_padding() {
        let table = CsvReader::new().parse_str("x\n  1.5  \n 2.5\n").unwrap();
        let x = table.column_by_name("x").unwrap();
        assert_eq!(x.dtype(), DataType::Numeric);
        assert_eq!(x.numeric_values(), vec![1.5, 2.5]);
    }

    // ── Null handling ────────────────────────────────────────────

    #[test]
    fn null_markers_recognized() {
        let table = CsvReader::new()
            .parse_str("x\n1.0\nNA\n3.0\n\n5.0\nnull\n")
            .unwrap();
        let x = table.column_by_name("x").unwrap();
        assert_eq!(x.dtype(), DataType::Numeric);
        assert_eq!(x.null_count(), 3);
    }

    #[test]
    fn case_variant_sentinel_survives_as_text() {
        // "Null" is not on the marker list; it must reach the anomaly
        // detector as text.
        let table = CsvReader::new().parse_str("x\nfoo\nNull\nbar\n").unwrap();
        let x = table.column_by_name("x").unwrap();
        assert_eq!(x.null_count(), 0);
        assert_eq!(x.cell(1), &Cell::Text("Null".into()));
    }

    #[test]
    fn all_null_column_is_text() {
        let table = CsvReader::new().parse_str("x\nNA\n\nnull\n").unwrap();
        let x = table.column_by_name("x").unwrap();
        assert_eq!(x.dtype(), DataType::Text);
        assert_eq!(x.null_count(), 3);
    }

    #[test]
    fn custom_null_markers() {
        let table = CsvReader::new()
            .null_markers(vec!["-999".to_string()])
            .parse_str("x\n1.0\n-999\n3.0\n")
            .unwrap();
        assert_eq!(table.column_by_name("x").unwrap().null_count(), 1);
    }

    // ── Quoting and line endings ─────────────────────────────────

    #[test]
    fn quoted_fields_with_delimiters_and_escapes() {
        let csv = "name,desc\nAlice,\"hello, world\"\nBob,\"she said \"\"hi\"\"\"\n";
        let table = CsvReader::new().parse_str(csv).unwrap();
        let desc = table.column_by_name("desc").unwrap();
        assert_eq!(desc.cell(0), &Cell::Text("hello, world".into()));
        assert_eq!(desc.cell(1), &Cell::Text("she said \"hi\"".into()));
    }

    #[test]
    fn quoted_embedded_newline() {
        let csv = "name,note\nAlice,\"line1\nline2\"\nBob,simple\n";
        let table = CsvReader::new().parse_str(csv).unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(
            table.column_by_name("note").unwrap().cell(0),
            &Cell::Text("line1\nline2".into())
        );
    }

    #[test]
    fn crlf_line_endings() {
        let table = CsvReader::new().parse_str("a,b\r\n1,2\r\n3,4\r\n").unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(
            table.column_by_name("a").unwrap().numeric_values(),
            vec![1.0, 3.0]
        );
    }

    #[test]
    fn no_trailing_newline() {
        let table = CsvReader::new().parse_str("x\n1\n2\n3").unwrap();
        assert_eq!(table.row_count(), 3);
    }

    #[test]
    fn bom_stripped() {
        let table = CsvReader::new().parse_str("\u{feff}x,y\n1,2\n").unwrap();
        assert_eq!(table.column_names(), &["x", "y"]);
    }

    // ── Structure edge cases ─────────────────────────────────────

    #[test]
    fn empty_input() {
        let table = CsvReader::new().parse_str("").unwrap();
        assert_eq!(table.shape(), (0, 0));
    }

    #[test]
    fn header_only() {
        let table = CsvReader::new().parse_str("a,b,c\n").unwrap();
        assert_eq!(table.shape(), (0, 0));
    }

    #[test]
    fn blank_line_in_multi_column_file_skipped() {
        let table = CsvReader::new().parse_str("x,y\n1,2\n\n3,4\n").unwrap();
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn field_count_mismatch_is_parse_error() {
        let err = CsvReader::new().parse_str("a,b\n1,2\n3\n").unwrap_err();
        assert_eq!(
            err,
            PipelineError::Parse {
                line: 3,
                message: "expected 2 fields, got 1".into()
            }
        );
    }

    #[test]
    fn without_header() {
        let table = CsvReader::new()
            .has_header(false)
            .parse_str("1,2\n3,4\n")
            .unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column_names(), &["col_0", "col_1"]);
    }

    #[test]
    fn alternate_delimiters() {
        let tab = CsvReader::new()
            .delimiter(b'\t')
            .parse_str("a\tb\n1\t2\n")
            .unwrap();
        assert_eq!(tab.shape(), (1, 2));
        let semi = CsvReader::new()
            .delimiter(b';')
            .parse_str("a;b\n1;2\n")
            .unwrap();
        assert_eq!(semi.shape(), (1, 2));
    }

    // ── Spreadsheet cell conversion ──────────────────────────────

    #[test]
    fn spreadsheet_cells_convert_to_typed_cells() {
        assert_eq!(convert_spreadsheet_cell(&Data::Empty), Cell::Null);
        assert_eq!(convert_spreadsheet_cell(&Data::Float(2.5)), Cell::Number(2.5));
        assert_eq!(convert_spreadsheet_cell(&Data::Int(3)), Cell::Number(3.0));
        assert_eq!(convert_spreadsheet_cell(&Data::Bool(true)), Cell::Bool(true));
        assert_eq!(
            convert_spreadsheet_cell(&Data::String("N/A".into())),
            Cell::Null
        );
        assert_eq!(
            convert_spreadsheet_cell(&Data::String("ok".into())),
            Cell::Text("ok".into())
        );
    }

    #[test]
    fn uniform_cells_infer_their_type() {
        assert_eq!(
            infer_cell_dtype(&[Cell::Number(1.0), Cell::Null, Cell::Number(2.0)]),
            DataType::Numeric
        );
        assert_eq!(
            infer_cell_dtype(&[Cell::Bool(true), Cell::Bool(false)]),
            DataType::Boolean
        );
        assert_eq!(
            infer_cell_dtype(&[Cell::Number(1.0), Cell::Text("x".into())]),
            DataType::Text
        );
        assert_eq!(infer_cell_dtype(&[Cell::Null, Cell::Null]), DataType::Text);
    }
}
