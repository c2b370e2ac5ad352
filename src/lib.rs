//! # datalens
//!
//! Sequential analysis pipeline for tabular datasets: load a CSV or
//! Excel file, clean it, compute descriptive statistics, detect
//! anomalies, and prepare chart plans, an insight context, and
//! illustrative SQL.
//!
//! The pipeline runs strictly forward — Loader → Cleaner → Statistics →
//! Anomaly Detector — with collaborator seams (chart rendering, text
//! generation) kept outside the core. Loading and cleaning failures are
//! fatal for a run; anomaly sub-checks and collaborators fail softly
//! into a caller-visible error list.
//!
//! ## Modules
//!
//! - [`table`] — cell-typed, column-major tabular model (Table, Column, Cell, DataType)
//! - [`loader`] — CSV/Excel input with per-column type inference
//! - [`cleaner`] — normalization, numeric coercion, deduplication, imputation
//! - [`statistics`] — descriptive statistics, Pearson correlation, categorical summaries
//! - [`anomaly`] — missing/duplicate/sentinel/IQR/domain/multivariate checks
//! - [`isolation_forest`] — seeded isolation-forest ensemble
//! - [`charts`] — deterministic chart plan and renderer seam
//! - [`insight`] — insight context, text-generation seam, templated fallback
//! - [`sql`] — CREATE TABLE / sample INSERT emitter
//! - [`pipeline`] — the ordered stage runner
//! - [`error`] — error types
//!
//! ## Quick Start
//!
//! ```
//! use datalens::loader::CsvReader;
//! use datalens::pipeline::{Analyzer, RunStatus};
//!
//! let csv = "age,salary\n25,50000\n25,50000\n30,61000\n";
//! let table = CsvReader::new().parse_str(csv).unwrap();
//! let run = Analyzer::new("demo").analyze_table(table);
//!
//! assert_eq!(run.status, RunStatus::Completed);
//! assert_eq!(run.cleaning.unwrap().duplicates, 1);
//! assert_eq!(run.statistics.unwrap().shape, (2, 2));
//! ```

pub mod anomaly;
pub mod charts;
pub mod cleaner;
pub mod error;
pub mod insight;
pub mod isolation_forest;
pub mod loader;
pub mod pipeline;
pub mod sql;
pub mod statistics;
pub mod table;

pub use error::PipelineError;
pub use pipeline::{AnalysisRun, Analyzer, RunStatus};
pub use table::{Cell, Column, DataType, Table};
