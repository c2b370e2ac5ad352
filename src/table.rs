//! Cell-typed, column-major Table for tabular data.
//!
//! A [`Table`] stores named columns in insertion order. Each column
//! carries a declared [`DataType`] and a dense vector of [`Cell`]s.
//! Cells are typed individually, so a column may hold mixed content —
//! a column declared [`Numeric`](DataType::Numeric) can still contain a
//! stray text cell. This mirrors how messy real-world tables behave and
//! is what lets the anomaly detector find placeholder strings hiding in
//! otherwise numeric columns.
//!
//! # Example
//!
//! ```
//! use datalens::table::{Cell, Column, DataType, Table};
//!
//! let mut table = Table::new();
//! table.add_column(
//!     "temperature".to_string(),
//!     Column::new(DataType::Numeric, vec![
//!         Cell::Number(20.5),
//!         Cell::Number(21.3),
//!         Cell::Null,
//!     ]),
//! ).unwrap();
//! assert_eq!(table.row_count(), 3);
//! assert_eq!(table.column(0).unwrap().null_count(), 1);
//! ```

use crate::error::PipelineError;
use chrono::NaiveDateTime;
use std::fmt::Write as _;

// ── Cell ──────────────────────────────────────────────────────────────

/// A single typed value.
///
/// `Null` marks a missing value; the other variants carry data. A text
/// cell keeps its string exactly as read (the cleaner owns whitespace
/// normalization).
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Number(f64),
    Bool(bool),
    Text(String),
    DateTime(NaiveDateTime),
}

impl Cell {
    /// Returns `true` for [`Cell::Null`].
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the numeric value, or `None` for any other variant.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the text content, or `None` for any other variant.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Renders the cell for display, CSV output, and frequency counting.
    ///
    /// Null renders as the empty string; numbers use Rust's shortest
    /// round-trip formatting (`50000.0` renders as `50000`).
    pub fn display_string(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Number(v) => format!("{v}"),
            Self::Bool(b) => b.to_string(),
            Self::Text(s) => s.clone(),
            Self::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

// ── DataType ──────────────────────────────────────────────────────────

/// Declared type of a column, inferred at load time and updated by the
/// cleaner's numeric coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    /// Numeric values stored as `f64`.
    Numeric,
    /// True/false values.
    Boolean,
    /// Date-time values (spreadsheet input only; CSV never infers this).
    Temporal,
    /// Free-form or mixed content.
    Text,
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Numeric => write!(f, "Numeric"),
            Self::Boolean => write!(f, "Boolean"),
            Self::Temporal => write!(f, "Temporal"),
            Self::Text => write!(f, "Text"),
        }
    }
}

// ── Column ────────────────────────────────────────────────────────────

/// A declared data type plus a dense vector of cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    dtype: DataType,
    cells: Vec<Cell>,
}

impl Column {
    /// Creates a column from a declared type and its cells.
    pub fn new(dtype: DataType, cells: Vec<Cell>) -> Self {
        Self { dtype, cells }
    }

    /// Returns the declared data type.
    #[inline]
    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    /// Re-declares the column type (used by the cleaner after coercion).
    pub fn set_dtype(&mut self, dtype: DataType) {
        self.dtype = dtype;
    }

    /// Returns the number of rows.
    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns `true` if the column has no rows.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Returns the cell at `idx`.
    pub fn cell(&self, idx: usize) -> &Cell {
        &self.cells[idx]
    }

    /// Returns the cells as a slice.
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Returns the cells mutably (cleaner use).
    pub fn cells_mut(&mut self) -> &mut Vec<Cell> {
        &mut self.cells
    }

    /// Counts null cells.
    pub fn null_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_null()).count()
    }

    /// Returns `(row index, value)` for every cell holding a number.
    pub fn numeric_cells(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.as_number().map(|v| (i, v)))
    }

    /// Collects the finite numeric values in row order.
    pub fn numeric_values(&self) -> Vec<f64> {
        self.numeric_cells()
            .map(|(_, v)| v)
            .filter(|v| v.is_finite())
            .collect()
    }
}

// ── Table ─────────────────────────────────────────────────────────────

/// Ordered, named columns of equal length.
///
/// Column order is insertion order and is preserved end-to-end through
/// the pipeline. Adding a column whose length differs from the current
/// row count fails with
/// [`DimensionMismatch`](PipelineError::DimensionMismatch).
#[derive(Debug, Clone, Default)]
pub struct Table {
    names: Vec<String>,
    columns: Vec<Column>,
    row_count: usize,
}

impl Table {
    /// Creates an empty table with no columns or rows.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a named column.
    pub fn add_column(&mut self, name: String, column: Column) -> Result<(), PipelineError> {
        let len = column.len();
        if self.columns.is_empty() {
            self.row_count = len;
        } else if len != self.row_count {
            return Err(PipelineError::DimensionMismatch {
                expected: self.row_count,
                actual: len,
            });
        }
        self.names.push(name);
        self.columns.push(column);
        Ok(())
    }

    /// Returns the number of rows.
    #[inline]
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Returns the number of columns.
    #[inline]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Returns `true` if the table has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Returns `(rows, columns)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.row_count, self.columns.len())
    }

    /// Returns column names in insertion order.
    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    /// Returns the column at `index`.
    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Returns the column at `index` mutably.
    pub fn column_mut(&mut self, index: usize) -> Option<&mut Column> {
        self.columns.get_mut(index)
    }

    /// Returns the column with the given name.
    pub fn column_by_name(&self, name: &str) -> Option<&Column> {
        self.column_index(name).map(|i| &self.columns[i])
    }

    /// Returns the index of the named column.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Iterates over `(name, column)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.names
            .iter()
            .map(|s| s.as_str())
            .zip(self.columns.iter())
    }

    /// Returns `(name, declared type)` per column.
    pub fn schema(&self) -> Vec<(&str, DataType)> {
        self.names
            .iter()
            .zip(self.columns.iter())
            .map(|(name, col)| (name.as_str(), col.dtype()))
            .collect()
    }

    /// Indices of columns whose declared type is numeric.
    pub fn numeric_column_indices(&self) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.dtype() == DataType::Numeric)
            .map(|(i, _)| i)
            .collect()
    }

    /// Returns `true` if every cell in row `row` is null.
    pub fn row_is_null(&self, row: usize) -> bool {
        self.columns.iter().all(|c| c.cell(row).is_null())
    }

    /// Builds a new table containing the rows where `keep[row]` is true.
    ///
    /// Row order is preserved. `keep` must cover every row.
    pub fn filter_rows(&self, keep: &[bool]) -> Table {
        debug_assert_eq!(keep.len(), self.row_count);
        let mut out = Table::new();
        for (name, col) in self.iter() {
            let cells: Vec<Cell> = col
                .cells()
                .iter()
                .zip(keep.iter())
                .filter(|(_, &k)| k)
                .map(|(c, _)| c.clone())
                .collect();
            out.add_column(name.to_string(), Column::new(col.dtype(), cells))
                .expect("filtered columns share one length");
        }
        out
    }

    /// Produces a hash key for a row, used for duplicate detection.
    ///
    /// Numbers are keyed by their bit pattern so that exact duplicates
    /// match without going through float formatting.
    pub fn row_key(&self, row: usize) -> String {
        let mut key = String::new();
        for (i, col) in self.columns.iter().enumerate() {
            if i > 0 {
                key.push('\x1f');
            }
            match col.cell(row) {
                Cell::Null => key.push_str("\x00"),
                Cell::Number(v) => {
                    let _ = write!(key, "n{}", v.to_bits());
                }
                Cell::Bool(b) => key.push(if *b { 'T' } else { 'F' }),
                Cell::Text(s) => {
                    let _ = write!(key, "s{s}");
                }
                Cell::DateTime(dt) => {
                    let _ = write!(key, "d{dt}");
                }
            }
        }
        key
    }
}

// ── Tests ─────────────────────────────────────────────────────────────
