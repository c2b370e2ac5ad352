//! Data cleaning: normalization, coercion, deduplication, imputation.
//!
//! [`clean_table`] applies the cleaning steps in a fixed order and
//! produces a [`CleaningReport`] alongside two tables:
//!
//! 1. Rows where every cell is null are dropped (order preserved).
//! 2. Text cells lose leading/trailing whitespace.
//! 3. Text-declared columns where at least one cell parses as a number
//!    are coerced to numeric; cells that fail to parse become null.
//!    A mostly-text column with one numeric-looking value gets upgraded
//!    too — accepted behavior, not a defect.
//! 4. Shape, per-column missing counts, duplicate count, and declared
//!    types are recorded (post-coercion, before deduplication and
//!    imputation).
//! 5. Exact duplicate rows are removed, keeping the first occurrence.
//! 6. Nulls are imputed: numeric columns with their median, other
//!    columns with their most frequent value, or `"Unknown"` when the
//!    column is entirely null. No null cell survives.
//! 7. The cleaned table is persisted as a CSV artifact when a path is
//!    given; re-running overwrites the same path.
//!
//! The [`CleanOutcome`] keeps the pre-dedup *normalized* table next to
//! the cleaned one: the anomaly detector reads it so duplicate groups
//! and original row positions remain observable.
//!
//! Any failure here is fatal for the pipeline run; there is no partial
//! report.
//!
//! # Example
//!
//! ```
//! use datalens::cleaner::clean_table;
//! use datalens::loader::CsvReader;
//!
//! let csv = "age,salary\n25,50000\n25,50000\n30,60000\n";
//! let table = CsvReader::new().parse_str(csv).unwrap();
//! let outcome = clean_table(table, None).unwrap();
//!
//! assert_eq!(outcome.report.duplicates, 1);
//! assert_eq!(outcome.report.rows_removed, 1);
//! assert_eq!(outcome.cleaned.row_count(), 2);
//! ```

use crate::error::PipelineError;
use crate::statistics;
use crate::table::{Cell, DataType, Table};
use log::{debug, info};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

// ── Report ────────────────────────────────────────────────────────────

/// Record of one cleaning run, produced once and read-only thereafter.
#[derive(Debug, Clone, Serialize)]
pub struct CleaningReport {
    /// Shape after dropping all-null rows, before deduplication.
    pub original_shape: (usize, usize),
    /// Per-column null counts, post-coercion and pre-imputation.
    pub missing_values: BTreeMap<String, usize>,
    /// Rows that repeat an earlier row, counted before deduplication.
    pub duplicates: usize,
    /// Declared column types after coercion.
    pub data_types: BTreeMap<String, String>,
    /// Shape of the cleaned table.
    pub cleaned_shape: (usize, usize),
    /// `original_shape.0 - cleaned_shape.0`.
    pub rows_removed: usize,
    /// Where the cleaned artifact was written, when it was.
    pub cleaned_file_path: Option<String>,
}

/// Output of the cleaning stage.
#[derive(Debug, Clone)]
pub struct CleanOutcome {
    /// Deduplicated, fully imputed table.
    pub cleaned: Table,
    /// Normalized table before deduplication and imputation: empty rows
    /// dropped, text trimmed, numeric-looking columns coerced.
    pub normalized: Table,
    pub report: CleaningReport,
}

// ── Cleaning ──────────────────────────────────────────────────────────

/// Runs the cleaning steps on `table`, optionally persisting the
/// cleaned artifact to `artifact_path`.
pub fn clean_table(
    table: Table,
    artifact_path: Option<&Path>,
) -> Result<CleanOutcome, PipelineError> {
    let keep: Vec<bool> = (0..table.row_count())
        .map(|row| !table.row_is_null(row))
        .collect();
    let mut normalized = table.filter_rows(&keep);
    debug!(
        "dropped {} all-null rows",
        keep.iter().filter(|&&k| !k).count()
    );

    trim_text_cells(&mut normalized);
    coerce_numeric_columns(&mut normalized);

    // Bookkeeping happens before deduplication and imputation.
    let original_shape = normalized.shape();
    let missing_values: BTreeMap<String, usize> = normalized
        .iter()
        .map(|(name, col)| (name.to_string(), col.null_count()))
        .collect();
    let data_types: BTreeMap<String, String> = normalized
        .iter()
        .map(|(name, col)| (name.to_string(), col.dtype().to_string()))
        .collect();
    let (first_occurrence, duplicates) = first_occurrence_mask(&normalized);

    let mut cleaned = normalized.filter_rows(&first_occurrence);
    let rows_removed = original_shape.0 - cleaned.row_count();

    impute(&mut cleaned);

    let cleaned_file_path = match artifact_path {
        Some(path) => {
            write_csv(&cleaned, path)?;
            Some(path.display().to_string())
        }
        None => None,
    };

    let report = CleaningReport {
        original_shape,
        missing_values,
        duplicates,
        data_types,
        cleaned_shape: cleaned.shape(),
        rows_removed,
        cleaned_file_path,
    };
    info!(
        "cleaning done: {}x{} -> {}x{}, {} duplicate rows removed",
        original_shape.0,
        original_shape.1,
        report.cleaned_shape.0,
        report.cleaned_shape.1,
        rows_removed
    );

    Ok(CleanOutcome {
        cleaned,
        normalized,
        report,
    })
}

/// Derives the sibling artifact path: `cleaned_<file name>` next to the
/// input file.
pub fn artifact_path_for(input: &Path) -> PathBuf {
    let name = input
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("dataset");
    input.with_file_name(format!("cleaned_{name}"))
}

// ── Steps ─────────────────────────────────────────────────────────────

/// Strips leading/trailing whitespace from text cells; other cell
/// kinds are untouched.
fn trim_text_cells(table: &mut Table) {
    for idx in 0..table.column_count() {
        let Some(col) = table.column_mut(idx) else {
            continue;
        };
        for cell in col.cells_mut() {
            if let Cell::Text(s) = cell {
                let trimmed = s.trim().to_string();
                if trimmed.len() != s.len() {
                    *s = trimmed;
                }
            }
        }
    }
}

/// Upgrades text-declared columns to numeric when at least one cell
/// parses as a number; cells that fail to parse become null.
fn coerce_numeric_columns(table: &mut Table) {
    for idx in 0..table.column_count() {
        let Some(col) = table.column_mut(idx) else {
            continue;
        };
        if col.dtype() != DataType::Text {
            continue;
        }

        let parsed: Vec<Option<f64>> = col
            .cells()
            .iter()
            .map(|cell| match cell {
                Cell::Number(v) => Some(*v),
                Cell::Text(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            })
            .collect();
        if !parsed.iter().any(|p| p.is_some()) {
            continue;
        }

        for (cell, value) in col.cells_mut().iter_mut().zip(parsed.into_iter()) {
            *cell = match value {
                Some(v) => Cell::Number(v),
                None => Cell::Null,
            };
        }
        col.set_dtype(DataType::Numeric);
    }
}

/// Keep-first mask plus the number of rows repeating an earlier row.
fn first_occurrence_mask(table: &Table) -> (Vec<bool>, usize) {
    let mut seen = HashSet::with_capacity(table.row_count());
    let mut keep = Vec::with_capacity(table.row_count());
    let mut repeats = 0usize;
    for row in 0..table.row_count() {
        if seen.insert(table.row_key(row)) {
            keep.push(true);
        } else {
            keep.push(false);
            repeats += 1;
        }
    }
    (keep, repeats)
}

/// Fills every null cell: median for numeric columns, modal value
/// otherwise, `"Unknown"` when a column has no values at all.
fn impute(table: &mut Table) {
    for idx in 0..table.column_count() {
        let Some(col) = table.column_mut(idx) else {
            continue;
        };
        if col.null_count() == 0 {
            continue;
        }

        let fill = match col.dtype() {
            DataType::Numeric => {
                let values = col.numeric_values();
                statistics::quantile(&values, 0.5).map(Cell::Number)
            }
            _ => most_frequent_cell(col.cells()),
        }
        .unwrap_or_else(|| Cell::Text("Unknown".to_string()));

        for cell in col.cells_mut() {
            if cell.is_null() {
                *cell = fill.clone();
            }
        }
    }
}

/// Most frequent non-null cell; ties keep the first-seen value.
fn most_frequent_cell(cells: &[Cell]) -> Option<Cell> {
    let mut counts: Vec<(String, usize, &Cell)> = Vec::new();
    for cell in cells {
        if cell.is_null() {
            continue;
        }
        let key = cell.display_string();
        match counts.iter_mut().find(|(k, _, _)| *k == key) {
            Some(entry) => entry.1 += 1,
            None => counts.push((key, 1, cell)),
        }
    }
    let mut best: Option<(usize, &Cell)> = None;
    for (_, count, cell) in &counts {
        // Strictly greater, so ties keep the first-seen value.
        if best.is_none_or(|(c, _)| *count > c) {
            best = Some((*count, *cell));
        }
    }
    best.map(|(_, cell)| cell.clone())
}

// ── Artifact ──────────────────────────────────────────────────────────

/// Writes the table as CSV. Null cells render as empty fields.
fn write_csv(table: &Table, path: &Path) -> Result<(), PipelineError> {
    let mut out = String::new();
    let header: Vec<String> = table
        .column_names()
        .iter()
        .map(|n| escape_csv_field(n))
        .collect();
    out.push_str(&header.join(","));
    out.push('\n');

    for row in 0..table.row_count() {
        let fields: Vec<String> = table
            .iter()
            .map(|(_, col)| escape_csv_field(&col.cell(row).display_string()))
            .collect();
        out.push_str(&fields.join(","));
        out.push('\n');
    }

    std::fs::write(path, out)?;
    Ok(())
}

fn escape_csv_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────
