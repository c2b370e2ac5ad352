//! Anomaly and data-quality detection.
//!
//! [`detect_anomalies`] runs seven independent checks over a table and
//! merges their findings into an [`AnomalyReport`]:
//!
//! 1. Missing-value census (columns with at least one null)
//! 2. Duplicate census (every member of a duplicate group)
//! 3. Sentinel-string detection (`"nan"`, `"null"`, `""`, `"none"`,
//!    trimmed and case-folded, in any column regardless of its declared
//!    type)
//! 4. Univariate outliers per numeric column (Tukey fences at 1.5·IQR)
//! 5. Domain rules keyed on column presence (`age` bounds, experience
//!    exceeding age, promotion years in the future, negative values)
//! 6. Multivariate outliers via a seeded isolation forest when at least
//!    two numeric columns exist (nulls read as zero in a private copy)
//! 7. A fixed completion summary for display
//!
//! No check short-circuits another: a failing check contributes nothing
//! and is reported through the returned error list, while its siblings
//! still run. This is the opposite of the cleaner, which aborts whole.
//!
//! The detector is given the cleaner's *normalized* table (pre-dedup,
//! pre-imputation), so duplicate groups are still visible, nulls are
//! still countable, and every reported row index refers to a position
//! in that table. Nothing here mutates the input.
//!
//! # Example
//!
//! ```
//! use datalens::anomaly::detect_anomalies;
//! use datalens::loader::CsvReader;
//!
//! let csv = "age,salary\n25,50000\n25,50000\n30,-10\n";
//! let table = CsvReader::new().parse_str(csv).unwrap();
//! let (report, errors) = detect_anomalies(&table);
//!
//! assert_eq!(report.duplicates, 2);
//! assert_eq!(report.domain_anomalies["negative_salary"], vec![2]);
//! assert!(errors.is_empty());
//! ```

use crate::error::PipelineError;
use crate::isolation_forest::{fit_predict, ForestOptions};
use crate::statistics::quantile;
use crate::table::{Cell, Table};
use chrono::Datelike;
use log::warn;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Placeholder strings that indicate an invalid value, compared against
/// trimmed, case-folded cell text.
const SENTINEL_STRINGS: &[&str] = &["nan", "null", "", "none"];

/// Tukey fence multiplier for the IQR rule.
const IQR_FENCE: f64 = 1.5;

/// Maximum sample values reported per outlier column.
const MAX_OUTLIER_SAMPLES: usize = 10;

/// Completion marker for display; consumers should not parse it.
const SUMMARY_TEXT: &str = "Anomaly detection completed.";

// ── Report ────────────────────────────────────────────────────────────

/// IQR findings for one numeric column.
#[derive(Debug, Clone, Serialize)]
pub struct OutlierSummary {
    pub count: usize,
    /// Share of all rows, as a percentage rounded to 2 decimals.
    pub percentage: f64,
    /// Up to ten outlying values, in row order.
    pub values: Vec<f64>,
}

/// Merged findings of all checks.
#[derive(Debug, Clone, Serialize)]
pub struct AnomalyReport {
    /// Numeric columns with IQR outliers; clean columns omitted.
    pub outliers: BTreeMap<String, OutlierSummary>,
    /// Sentinel cell texts per column; clean columns omitted.
    pub invalid_values: BTreeMap<String, Vec<String>>,
    /// Null counts per column; zero-count columns omitted.
    pub missing_values: BTreeMap<String, usize>,
    /// Rule name to offending row indices.
    pub domain_anomalies: BTreeMap<String, Vec<usize>>,
    /// Number of rows belonging to any duplicate group.
    pub duplicates: usize,
    /// Indices of all rows in any duplicate group, ascending.
    pub rows_with_duplicates: Vec<usize>,
    /// Rows the isolation forest flagged.
    pub anomaly_indices: Vec<usize>,
    pub summary: String,
}

// ── Detector ──────────────────────────────────────────────────────────

/// Runs the full battery against `table`.
///
/// Returns the report and the list of check failures; a failed check
/// leaves its section empty without affecting the others.
pub fn detect_anomalies(table: &Table) -> (AnomalyReport, Vec<String>) {
    detect_anomalies_at(table, chrono::Local::now().year())
}

/// Same battery with an explicit "current year" for the promotion rule.
pub fn detect_anomalies_at(table: &Table, current_year: i32) -> (AnomalyReport, Vec<String>) {
    let mut errors = Vec::new();

    let missing_values = missing_census(table);
    let (duplicates, rows_with_duplicates) = duplicate_census(table);
    let invalid_values = sentinel_census(table);
    let outliers = iqr_outliers(table);
    let domain_anomalies = domain_rules(table, current_year);
    let anomaly_indices = match multivariate_outliers(table) {
        Ok(indices) => indices,
        Err(e) => {
            warn!("multivariate outlier check failed: {e}");
            errors.push(format!("multivariate outlier detection error: {e}"));
            Vec::new()
        }
    };

    let report = AnomalyReport {
        outliers,
        invalid_values,
        missing_values,
        domain_anomalies,
        duplicates,
        rows_with_duplicates,
        anomaly_indices,
        summary: SUMMARY_TEXT.to_string(),
    };
    (report, errors)
}

// ── Checks ────────────────────────────────────────────────────────────

/// Null counts per column, zero-count columns omitted.
fn missing_census(table: &Table) -> BTreeMap<String, usize> {
    table
        .iter()
        .filter_map(|(name, col)| {
            let nulls = col.null_count();
            (nulls > 0).then(|| (name.to_string(), nulls))
        })
        .collect()
}

/// Every row that shares its content with another row, first
/// occurrences included.
fn duplicate_census(table: &Table) -> (usize, Vec<usize>) {
    let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
    for row in 0..table.row_count() {
        groups.entry(table.row_key(row)).or_default().push(row);
    }
    let mut members: Vec<usize> = groups
        .into_values()
        .filter(|g| g.len() > 1)
        .flatten()
        .collect();
    members.sort_unstable();
    (members.len(), members)
}

/// Cells holding sentinel text, in any column whatever its declared
/// type. Only cells that actually hold a string can match.
fn sentinel_census(table: &Table) -> BTreeMap<String, Vec<String>> {
    let mut findings = BTreeMap::new();
    for (name, col) in table.iter() {
        let hits: Vec<String> = col
            .cells()
            .iter()
            .filter_map(|cell| match cell {
                Cell::Text(s) if SENTINEL_STRINGS.contains(&s.trim().to_lowercase().as_str()) => {
                    Some(s.clone())
                }
                _ => None,
            })
            .collect();
        if !hits.is_empty() {
            findings.insert(name.to_string(), hits);
        }
    }
    findings
}

/// Tukey-fence outliers per numeric column.
fn iqr_outliers(table: &Table) -> BTreeMap<String, OutlierSummary> {
    let total_rows = table.row_count();
    let mut findings = BTreeMap::new();

    for (name, col) in table.iter() {
        if col.dtype() != crate::table::DataType::Numeric {
            continue;
        }
        let valid: Vec<(usize, f64)> = col
            .numeric_cells()
            .filter(|(_, v)| v.is_finite())
            .collect();
        if valid.is_empty() {
            continue;
        }
        let hits = fence_outliers(&valid, IQR_FENCE);
        if hits.is_empty() {
            continue;
        }

        let count = hits.len();
        let percentage = round2(count as f64 / total_rows as f64 * 100.0);
        findings.insert(
            name.to_string(),
            OutlierSummary {
                count,
                percentage,
                values: hits
                    .into_iter()
                    .take(MAX_OUTLIER_SAMPLES)
                    .map(|(_, v)| v)
                    .collect(),
            },
        );
    }
    findings
}

/// Values outside `[Q1 - k·IQR, Q3 + k·IQR]`, in row order.
fn fence_outliers(valid: &[(usize, f64)], k: f64) -> Vec<(usize, f64)> {
    let values: Vec<f64> = valid.iter().map(|&(_, v)| v).collect();
    let (Some(q1), Some(q3)) = (quantile(&values, 0.25), quantile(&values, 0.75)) else {
        return Vec::new();
    };
    let iqr = q3 - q1;
    let lower = q1 - k * iqr;
    let upper = q3 + k * iqr;
    valid
        .iter()
        .copied()
        .filter(|&(_, v)| v < lower || v > upper)
        .collect()
}

/// Fixed, column-name-keyed heuristics; each rule applies only when its
/// columns are present, and only number-holding cells participate.
fn domain_rules(table: &Table, current_year: i32) -> BTreeMap<String, Vec<usize>> {
    let mut rules = BTreeMap::new();

    let age = table.column_by_name("age");
    if let Some(age_col) = age {
        let hits: Vec<usize> = age_col
            .numeric_cells()
            .filter(|&(_, v)| v < 18.0 || v > 70.0)
            .map(|(i, _)| i)
            .collect();
        rules.insert("invalid_age".to_string(), hits);
    }

    if let (Some(age_col), Some(exp_col)) = (age, table.column_by_name("years_experience")) {
        let hits: Vec<usize> = (0..table.row_count())
            .filter(|&row| {
                matches!(
                    (age_col.cell(row).as_number(), exp_col.cell(row).as_number()),
                    (Some(a), Some(e)) if e > a
                )
            })
            .collect();
        rules.insert("exp_gt_age".to_string(), hits);
    }

    if let Some(promo_col) = table.column_by_name("last_promotion_year") {
        let hits: Vec<usize> = promo_col
            .numeric_cells()
            .filter(|&(_, v)| v > f64::from(current_year))
            .map(|(i, _)| i)
            .collect();
        rules.insert("future_year".to_string(), hits);
    }

    for &idx in &table.numeric_column_indices() {
        let Some(col) = table.column(idx) else {
            continue;
        };
        let hits: Vec<usize> = col
            .numeric_cells()
            .filter(|&(_, v)| v < 0.0)
            .map(|(i, _)| i)
            .collect();
        if !hits.is_empty() {
            rules.insert(format!("negative_{}", table.column_names()[idx]), hits);
        }
    }

    rules
}

/// Isolation forest over the numeric columns; nulls and non-numeric
/// cells read as zero in a private matrix. Skipped (empty result)
/// unless at least two numeric columns exist.
fn multivariate_outliers(table: &Table) -> Result<Vec<usize>, PipelineError> {
    let numeric = table.numeric_column_indices();
    if numeric.len() < 2 {
        return Ok(Vec::new());
    }

    let matrix: Vec<Vec<f64>> = (0..table.row_count())
        .map(|row| {
            numeric
                .iter()
                .map(|&c| {
                    table
                        .column(c)
                        .and_then(|col| col.cell(row).as_number())
                        .filter(|v| v.is_finite())
                        .unwrap_or(0.0)
                })
                .collect()
        })
        .collect();

    let outcome = fit_predict(&matrix, &ForestOptions::default())?;
    Ok(outcome.anomaly_indices())
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::CsvReader;
    use crate::table::{Column, DataType};

    fn parse(csv: &str) -> Table {
        CsvReader::new().parse_str(csv).unwrap()
    }

    // ── Missing census ───────────────────────────────────────────

    #[test]
    fn missing_census_omits_complete_columns() {
        let (report, _) = detect_anomalies(&parse("a,b\n1,x\nNA,y\n3,z\n"));
        assert_eq!(report.missing_values.len(), 1);
        assert_eq!(report.missing_values["a"], 1);
    }

    // ── Duplicate census ─────────────────────────────────────────

    #[test]
    fn duplicate_census_keeps_all_group_members() {
        let (report, _) = detect_anomalies(&parse("a,b\n1,x\n1,x\n2,y\n1,x\n"));
        assert_eq!(report.duplicates, 3);
        assert_eq!(report.rows_with_duplicates, vec![0, 1, 3]);
    }

    #[test]
    fn distinct_rows_report_no_duplicates() {
        let (report, _) = detect_anomalies(&parse("a\n1\n2\n3\n"));
        assert_eq!(report.duplicates, 0);
        assert!(report.rows_with_duplicates.is_empty());
    }

    // ── Sentinel strings ─────────────────────────────────────────

    #[test]
    fn sentinel_case_variants_flagged() {
        // "Null" and "NONE" dodge the loader's marker list but not the
        // case-folding here.
        let (report, _) = detect_anomalies(&parse("x,y\n1,ok\n2,Null\n3,NONE\n"));
        assert_eq!(
            report.invalid_values["y"],
            vec!["Null".to_string(), "NONE".to_string()]
        );
    }

    #[test]
    fn sentinel_found_in_numeric_declared_column() {
        let mut table = Table::new();
        table
            .add_column(
                "salary".into(),
                Column::new(
                    DataType::Numeric,
                    vec![
                        Cell::Number(50000.0),
                        Cell::Text("NULL".into()),
                        Cell::Number(60000.0),
                    ],
                ),
            )
            .unwrap();
        let (report, _) = detect_anomalies(&table);
        assert_eq!(report.invalid_values["salary"], vec!["NULL".to_string()]);
    }

    #[test]
    fn sentinel_matching_trims_whitespace() {
        let mut table = Table::new();
        table
            .add_column(
                "x".into(),
                Column::new(
                    DataType::Text,
                    vec![Cell::Text("  None ".into()), Cell::Text("fine".into())],
                ),
            )
            .unwrap();
        let (report, _) = detect_anomalies(&table);
        assert_eq!(report.invalid_values["x"], vec!["  None ".to_string()]);
    }

    #[test]
    fn ordinary_text_not_flagged() {
        let (report, _) = detect_anomalies(&parse("x\nalpha\nbeta\ngamma\n"));
        assert!(report.invalid_values.is_empty());
    }

    // ── IQR outliers ─────────────────────────────────────────────

    #[test]
    fn iqr_flags_extreme_value_with_samples() {
        let csv = "x\n1\n2\n3\n4\n5\n6\n7\n8\n9\n10\n100\n";
        let (report, _) = detect_anomalies(&parse(csv));
        let x = &report.outliers["x"];
        assert_eq!(x.count, 1);
        assert_eq!(x.values, vec![100.0]);
        assert_eq!(x.percentage, 9.09);
    }

    #[test]
    fn clean_columns_omitted_from_outliers() {
        let (report, _) = detect_anomalies(&parse("x\n1\n2\n3\n4\n5\n"));
        assert!(report.outliers.is_empty());
    }

    #[test]
    fn widening_fences_cannot_flag_more() {
        let valid: Vec<(usize, f64)> = [1.0, 2.0, 3.0, 4.0, 5.0, 30.0, 80.0, 200.0]
            .iter()
            .copied()
            .enumerate()
            .collect();
        let mut last = usize::MAX;
        for k in [1.0, 1.5, 2.0, 3.0, 5.0] {
            let flagged = fence_outliers(&valid, k).len();
            assert!(flagged <= last, "k={k} flagged {flagged} > {last}");
            last = flagged;
        }
    }

    #[test]
    fn outlier_samples_capped_at_ten() {
        let mut csv = String::from("x\n");
        for _ in 0..50 {
            csv.push_str("5\n");
        }
        for i in 0..12 {
            csv.push_str(&format!("{}\n", 1000 + i));
        }
        // Duplicate rows are fine here; the detector sees them all.
        let (report, _) = detect_anomalies(&parse(&csv));
        let x = &report.outliers["x"];
        assert_eq!(x.count, 12);
        assert_eq!(x.values.len(), 10);
        assert_eq!(x.values[0], 1000.0);
    }

    // ── Domain rules ─────────────────────────────────────────────

    #[test]
    fn age_bounds_rule() {
        let (report, _) = detect_anomalies(&parse("age\n17\n25\n71\n40\n"));
        assert_eq!(report.domain_anomalies["invalid_age"], vec![0, 2]);
    }

    #[test]
    fn experience_exceeding_age_rule() {
        let (report, _) =
            detect_anomalies(&parse("age,years_experience\n30,35\n40,10\n25,25\n"));
        assert_eq!(report.domain_anomalies["exp_gt_age"], vec![0]);
    }

    #[test]
    fn future_promotion_year_rule() {
        let table = parse("last_promotion_year\n2019\n2031\n2020\n");
        let (report, _) = detect_anomalies_at(&table, 2026);
        assert_eq!(report.domain_anomalies["future_year"], vec![1]);
    }

    #[test]
    fn negative_values_keyed_per_column() {
        let (report, _) = detect_anomalies(&parse("salary,bonus\n100,5\n-10,2\n50,-1\n"));
        assert_eq!(report.domain_anomalies["negative_salary"], vec![1]);
        assert_eq!(report.domain_anomalies["negative_bonus"], vec![2]);
    }

    #[test]
    fn rules_absent_without_their_columns() {
        let (report, _) = detect_anomalies(&parse("salary\n100\n200\n"));
        assert!(!report.domain_anomalies.contains_key("invalid_age"));
        assert!(!report.domain_anomalies.contains_key("exp_gt_age"));
        assert!(!report.domain_anomalies.contains_key("future_year"));
        // No negatives either, so no negative_ key.
        assert!(report.domain_anomalies.is_empty());
    }

    // ── Multivariate ─────────────────────────────────────────────

    #[test]
    fn multivariate_skipped_below_two_numeric_columns() {
        let (report, errors) = detect_anomalies(&parse("x,label\n1,a\n2,b\n3,c\n"));
        assert!(report.anomaly_indices.is_empty());
        assert!(errors.is_empty());
    }

    #[test]
    fn multivariate_flags_far_point() {
        let mut csv = String::from("x,y\n");
        for i in 0..40 {
            csv.push_str(&format!("{},{}\n", 5 + i % 3, 7 + i % 4));
        }
        csv.push_str("500,500\n");
        let (report, errors) = detect_anomalies(&parse(&csv));
        assert!(errors.is_empty());
        assert!(report.anomaly_indices.contains(&40));
    }

    #[test]
    fn multivariate_failure_recorded_not_fatal() {
        // One row with two numeric columns: the forest needs two points.
        let (report, errors) = detect_anomalies(&parse("x,y\n1,2\n"));
        assert!(report.anomaly_indices.is_empty());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("multivariate"));
        // Sibling checks still produced their sections.
        assert_eq!(report.summary, "Anomaly detection completed.");
    }

    // ── Summary ──────────────────────────────────────────────────

    #[test]
    fn summary_is_fixed_text() {
        let (a, _) = detect_anomalies(&parse("x\n1\n2\n"));
        let (b, _) = detect_anomalies(&parse("y\n9\n8\n7\n"));
        assert_eq!(a.summary, b.summary);
    }

    #[test]
    fn report_serializes_to_json() {
        let (report, _) = detect_anomalies(&parse("age\n17\n25\n"));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["domain_anomalies"]["invalid_age"][0], 0);
        assert_eq!(json["duplicates"], 0);
    }
}
