//! Descriptive statistics, correlation, and categorical summaries.
//!
//! [`summarize`] computes the statistics report for a cleaned table. It
//! has no side effects and never fails on typed input — an empty table
//! yields empty summaries, not an error.
//!
//! Conventions are pinned: standard deviation is the sample standard
//! deviation (Bessel's correction), quantiles interpolate linearly
//! between order statistics, correlation is Pearson's r. Entries that
//! are undefined (zero variance, too little data) are reported as
//! `None`, which serializes to JSON `null` instead of `NaN`.
//!
//! The numeric helpers ([`mean`], [`sample_std`], [`quantile`],
//! [`pearson`]) are shared with the cleaner's imputation and the
//! anomaly detector's fences.
//!
//! # Example
//!
//! ```
//! use datalens::loader::CsvReader;
//! use datalens::statistics::summarize;
//!
//! let csv = "x,label\n1,A\n2,B\n3,A\n4,A\n";
//! let table = CsvReader::new().parse_str(csv).unwrap();
//! let report = summarize(&table);
//!
//! assert_eq!(report.shape, (4, 2));
//! assert_eq!(report.numeric_summary["x"].count, 4);
//! assert_eq!(report.categorical_summary["label"].unique_values, 2);
//! ```

use crate::table::{DataType, Table};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

// ── Numeric helpers ───────────────────────────────────────────────────

/// Arithmetic mean. `None` for empty input.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation with Bessel's correction. `None` for
/// fewer than two values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    Some((ss / (n - 1) as f64).sqrt())
}

/// Quantile `q` in `[0, 1]` via linear interpolation between order
/// statistics. `None` for empty input.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let h = (sorted.len() - 1) as f64 * q.clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (h - lo as f64))
}

/// Pearson correlation coefficient, clamped to `[-1, 1]`. `None` when
/// either side has zero variance or fewer than two paired values.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len();
    if n < 2 || y.len() != n {
        return None;
    }
    let mx = mean(x)?;
    let my = mean(y)?;
    let mut cov = 0.0;
    let mut vx = 0.0;
    let mut vy = 0.0;
    for (&a, &b) in x.iter().zip(y.iter()) {
        let dx = a - mx;
        let dy = b - my;
        cov += dx * dy;
        vx += dx * dx;
        vy += dy * dy;
    }
    if vx == 0.0 || vy == 0.0 {
        return None;
    }
    Some((cov / (vx.sqrt() * vy.sqrt())).clamp(-1.0, 1.0))
}

// ── Report types ──────────────────────────────────────────────────────

/// Descriptive statistics for one numeric column, over its non-null
/// values. Undefined entries (empty column, single value for `std`)
/// are `None`.
#[derive(Debug, Clone, Serialize)]
pub struct NumericSummary {
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub q1: Option<f64>,
    pub median: Option<f64>,
    pub q3: Option<f64>,
    pub max: Option<f64>,
}

/// Frequency summary for one non-numeric column.
#[derive(Debug, Clone, Serialize)]
pub struct CategoricalSummary {
    /// Number of distinct non-null values.
    pub unique_values: usize,
    /// Top five `(value, count)` pairs by descending frequency; ties
    /// keep first-seen order.
    pub top_values: Vec<(String, usize)>,
}

/// Pearson correlation matrix over the numeric columns.
///
/// Symmetric, with 1.0 on the diagonal for any column with nonzero
/// variance; zero-variance entries are `None`.
#[derive(Debug, Clone, Serialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

/// Output of the statistics stage.
#[derive(Debug, Clone, Serialize)]
pub struct StatisticsReport {
    pub shape: (usize, usize),
    pub columns: Vec<String>,
    pub numeric_summary: BTreeMap<String, NumericSummary>,
    /// Present only when the table has at least two numeric columns.
    pub correlations: Option<CorrelationMatrix>,
    pub categorical_summary: BTreeMap<String, CategoricalSummary>,
}

// ── Summarizer ────────────────────────────────────────────────────────

/// Computes the statistics report for a table.
pub fn summarize(table: &Table) -> StatisticsReport {
    let mut numeric_summary = BTreeMap::new();
    let mut categorical_summary = BTreeMap::new();

    for (name, col) in table.iter() {
        if col.dtype() == DataType::Numeric {
            let values = col.numeric_values();
            numeric_summary.insert(name.to_string(), describe(&values));
        } else {
            categorical_summary.insert(name.to_string(), describe_categorical(col));
        }
    }

    StatisticsReport {
        shape: table.shape(),
        columns: table.column_names().to_vec(),
        numeric_summary,
        correlations: correlation_matrix(table),
        categorical_summary,
    }
}

/// Descriptive statistics over a column's non-null numeric values.
fn describe(values: &[f64]) -> NumericSummary {
    NumericSummary {
        count: values.len(),
        mean: mean(values),
        std: sample_std(values),
        min: values
            .iter()
            .copied()
            .min_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal)),
        q1: quantile(values, 0.25),
        median: quantile(values, 0.5),
        q3: quantile(values, 0.75),
        max: values
            .iter()
            .copied()
            .max_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal)),
    }
}

fn describe_categorical(col: &crate::table::Column) -> CategoricalSummary {
    // Frequency plus first-seen position so ties stay in encounter order.
    let mut freq: HashMap<String, (usize, usize)> = HashMap::new();
    for (pos, cell) in col.cells().iter().enumerate() {
        if cell.is_null() {
            continue;
        }
        let entry = freq.entry(cell.display_string()).or_insert((0, pos));
        entry.0 += 1;
    }

    let unique_values = freq.len();
    let mut ranked: Vec<(String, usize, usize)> = freq
        .into_iter()
        .map(|(value, (count, first_seen))| (value, count, first_seen))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

    CategoricalSummary {
        unique_values,
        top_values: ranked
            .into_iter()
            .take(5)
            .map(|(value, count, _)| (value, count))
            .collect(),
    }
}

/// Pairwise Pearson correlation over numeric columns; `None` unless at
/// least two numeric columns exist.
fn correlation_matrix(table: &Table) -> Option<CorrelationMatrix> {
    let numeric = table.numeric_column_indices();
    if numeric.len() < 2 {
        return None;
    }

    let names: Vec<String> = numeric
        .iter()
        .map(|&i| table.column_names()[i].clone())
        .collect();
    let n = numeric.len();
    let mut values = vec![vec![None; n]; n];

    for a in 0..n {
        for b in a..n {
            let r = column_pearson(table, numeric[a], numeric[b]);
            values[a][b] = r;
            values[b][a] = r;
        }
    }

    Some(CorrelationMatrix {
        columns: names,
        values,
    })
}

/// Pearson r between two columns over rows where both hold numbers.
fn column_pearson(table: &Table, a: usize, b: usize) -> Option<f64> {
    let col_a = table.column(a)?;
    let col_b = table.column(b)?;
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for row in 0..table.row_count() {
        if let (Some(x), Some(y)) = (col_a.cell(row).as_number(), col_b.cell(row).as_number()) {
            if x.is_finite() && y.is_finite() {
                xs.push(x);
                ys.push(y);
            }
        }
    }
    pearson(&xs, &ys)
}

// ── Tests ─────────────────────────────────────────────────────────────
