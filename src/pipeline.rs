//! The sequential analysis pipeline.
//!
//! One [`Analyzer`] run flows strictly forward: load → clean →
//! summarize → detect anomalies → (collaborators: charts, insights) →
//! SQL. Each stage completes before the next starts; a run owns its
//! tables and reports and shares nothing with concurrent runs.
//!
//! Failure handling has two tiers:
//!
//! - **Fatal**: loading or cleaning errors mark the run
//!   [`Failed`](RunStatus::Failed) with a descriptive message and skip
//!   every downstream stage — no partial reports are published.
//! - **Recoverable**: anomaly sub-check failures, chart rendering
//!   failures, and non-quota text-generation failures are appended to
//!   the caller-visible error list while the run still completes.
//!
//! Quota or availability failures from the text-generation capability
//! are a recognized class of their own: the deterministic templated
//! summary is substituted and no error is recorded.
//!
//! # Example
//!
//! ```
//! use datalens::loader::CsvReader;
//! use datalens::pipeline::{Analyzer, RunStatus};
//!
//! let csv = "age,salary\n25,50000\n25,50000\n200,-10\n";
//! let table = CsvReader::new().parse_str(csv).unwrap();
//! let run = Analyzer::new("demo").analyze_table(table);
//!
//! assert_eq!(run.status, RunStatus::Completed);
//! let anomalies = run.anomalies.unwrap();
//! assert_eq!(anomalies.duplicates, 2);
//! assert_eq!(anomalies.domain_anomalies["negative_salary"], vec![2]);
//! ```

use crate::anomaly::{detect_anomalies, AnomalyReport};
use crate::charts::{ChartDescriptor, ChartRenderer};
use crate::cleaner::{artifact_path_for, clean_table, CleaningReport};
use crate::insight::{build_context, templated_summary, TextGenerator};
use crate::loader::load_table;
use crate::sql::sql_script;
use crate::statistics::{summarize, StatisticsReport};
use crate::table::Table;
use log::{info, warn};
use serde::Serialize;
use std::path::Path;

// ── Run output ────────────────────────────────────────────────────────

/// Terminal status of one analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Failed,
}

/// Everything one run produced. Serializes to JSON-representable
/// scalars, mappings, and sequences only; the cleaned table itself is
/// for in-process callers and stays out of the serialized form.
#[derive(Debug, Serialize)]
pub struct AnalysisRun {
    pub status: RunStatus,
    pub cleaning: Option<CleaningReport>,
    pub statistics: Option<StatisticsReport>,
    pub anomalies: Option<AnomalyReport>,
    pub charts: Vec<ChartDescriptor>,
    pub insights: Option<String>,
    pub sql: Option<String>,
    /// Recoverable failures, in the order they occurred.
    pub errors: Vec<String>,
    #[serde(skip)]
    pub cleaned: Option<Table>,
}

// ── Analyzer ──────────────────────────────────────────────────────────

/// Configured entry point for analysis runs.
///
/// Collaborators are optional: without a renderer no charts are
/// produced, and without a text generator the templated summary is
/// used directly.
pub struct Analyzer<'a> {
    dataset_id: String,
    renderer: Option<&'a dyn ChartRenderer>,
    generator: Option<&'a dyn TextGenerator>,
}

impl<'a> Analyzer<'a> {
    /// Creates an analyzer for a dataset identifier.
    pub fn new(dataset_id: impl Into<String>) -> Self {
        Self {
            dataset_id: dataset_id.into(),
            renderer: None,
            generator: None,
        }
    }

    /// Attaches a chart renderer.
    pub fn with_renderer(mut self, renderer: &'a dyn ChartRenderer) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Attaches a text-generation capability.
    pub fn with_generator(mut self, generator: &'a dyn TextGenerator) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Runs the pipeline on a file. The cleaned artifact is written
    /// next to the input as `cleaned_<file name>`.
    pub fn analyze_path(&self, path: &Path) -> AnalysisRun {
        info!("analyzing {}", path.display());
        let table = match load_table(path) {
            Ok(table) => table,
            Err(e) => return failed(format!("data loading error: {e}")),
        };
        let artifact = artifact_path_for(path);
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("dataset.csv")
            .to_string();
        self.run(table, Some(&artifact), &file_name)
    }

    /// Runs the pipeline on an in-memory table; no artifact is written.
    pub fn analyze_table(&self, table: Table) -> AnalysisRun {
        let file_name = format!("{}.csv", self.dataset_id);
        self.run(table, None, &file_name)
    }

    fn run(&self, table: Table, artifact: Option<&Path>, file_name: &str) -> AnalysisRun {
        let outcome = match clean_table(table, artifact) {
            Ok(outcome) => outcome,
            Err(e) => return failed(format!("data cleaning error: {e}")),
        };
        let mut errors = Vec::new();

        let statistics = summarize(&outcome.cleaned);
        let (anomalies, check_errors) = detect_anomalies(&outcome.normalized);
        errors.extend(check_errors);

        let charts = match self.renderer {
            Some(renderer) => match renderer.render(&outcome.cleaned, &self.dataset_id) {
                Ok(descriptors) => descriptors,
                Err(e) => {
                    warn!("chart rendering failed: {e}");
                    errors.push(format!("visualization error: {e}"));
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let context = build_context(&outcome.report, &statistics, &anomalies);
        let insights = match self.generator {
            Some(generator) => match generator.generate(&context) {
                Ok(text) => Some(text),
                Err(e) if e.is_fallback() => {
                    info!("text generation unavailable ({e}), using templated summary");
                    Some(templated_summary(&statistics, &anomalies))
                }
                Err(e) => {
                    errors.push(format!("insights generation error: {e}"));
                    None
                }
            },
            None => Some(templated_summary(&statistics, &anomalies)),
        };

        let sql = sql_script(&outcome.cleaned, file_name);

        AnalysisRun {
            status: RunStatus::Completed,
            cleaning: Some(outcome.report),
            statistics: Some(statistics),
            anomalies: Some(anomalies),
            charts,
            insights,
            sql: Some(sql),
            errors,
            cleaned: Some(outcome.cleaned),
        }
    }
}

/// A fatal run: descriptive message, no partial reports.
fn failed(message: String) -> AnalysisRun {
    warn!("{message}");
    AnalysisRun {
        status: RunStatus::Failed,
        cleaning: None,
        statistics: None,
        anomalies: None,
        charts: Vec::new(),
        insights: None,
        sql: None,
        errors: vec![message],
        cleaned: None,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::{ChartDescriptor, ChartKind};
    use crate::error::PipelineError;
    use crate::insight::GenerationError;
    use crate::loader::CsvReader;

    fn parse(csv: &str) -> Table {
        CsvReader::new().parse_str(csv).unwrap()
    }

    struct FixedGenerator(Result<String, GenerationError>);

    impl TextGenerator for FixedGenerator {
        fn generate(&self, _context: &str) -> Result<String, GenerationError> {
            self.0.clone()
        }
    }

    struct OneChartRenderer;

    impl ChartRenderer for OneChartRenderer {
        fn render(
            &self,
            _table: &Table,
            dataset_id: &str,
        ) -> Result<Vec<ChartDescriptor>, PipelineError> {
            Ok(vec![ChartDescriptor {
                kind: ChartKind::Histogram,
                columns: vec!["x".into()],
                filename: format!("hist_{dataset_id}_x.png"),
            }])
        }
    }

    struct BrokenRenderer;

    impl ChartRenderer for BrokenRenderer {
        fn render(
            &self,
            _table: &Table,
            _dataset_id: &str,
        ) -> Result<Vec<ChartDescriptor>, PipelineError> {
            Err(PipelineError::Io("disk full".into()))
        }
    }

    // ── Status tiers ─────────────────────────────────────────────

    #[test]
    fn completed_run_publishes_all_reports() {
        let run = Analyzer::new("t").analyze_table(parse("x,y\n1,2\n3,4\n5,6\n"));
        assert_eq!(run.status, RunStatus::Completed);
        assert!(run.cleaning.is_some());
        assert!(run.statistics.is_some());
        assert!(run.anomalies.is_some());
        assert!(run.sql.is_some());
        assert!(run.insights.is_some());
        assert!(run.errors.is_empty());
    }

    #[test]
    fn load_failure_publishes_nothing() {
        let run = Analyzer::new("t").analyze_path(Path::new("data.pdf"));
        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.cleaning.is_none());
        assert!(run.statistics.is_none());
        assert!(run.anomalies.is_none());
        assert!(run.sql.is_none());
        assert_eq!(run.errors.len(), 1);
        assert!(run.errors[0].contains("unsupported file format"));
    }

    #[test]
    fn recoverable_check_error_keeps_run_completed() {
        // Two numeric columns, one row: the multivariate check fails.
        let run = Analyzer::new("t").analyze_table(parse("x,y\n1,2\n"));
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.errors.len(), 1);
        assert!(run.errors[0].contains("multivariate"));
        assert!(run.anomalies.is_some());
    }

    // ── Collaborators ────────────────────────────────────────────

    #[test]
    fn renderer_descriptors_attached_to_run() {
        let renderer = OneChartRenderer;
        let run = Analyzer::new("sales")
            .with_renderer(&renderer)
            .analyze_table(parse("x\n1\n2\n"));
        assert_eq!(run.charts.len(), 1);
        assert_eq!(run.charts[0].filename, "hist_sales_x.png");
    }

    #[test]
    fn renderer_failure_is_recoverable() {
        let renderer = BrokenRenderer;
        let run = Analyzer::new("t")
            .with_renderer(&renderer)
            .analyze_table(parse("x\n1\n2\n"));
        assert_eq!(run.status, RunStatus::Completed);
        assert!(run.charts.is_empty());
        assert!(run.errors.iter().any(|e| e.contains("visualization")));
    }

    #[test]
    fn generator_text_used_when_available() {
        let generator = FixedGenerator(Ok("great data".into()));
        let run = Analyzer::new("t")
            .with_generator(&generator)
            .analyze_table(parse("x\n1\n2\n"));
        assert_eq!(run.insights.as_deref(), Some("great data"));
    }

    #[test]
    fn quota_error_falls_back_to_template_without_error() {
        let generator =
            FixedGenerator(Err(GenerationError::QuotaExhausted("402".into())));
        let run = Analyzer::new("t")
            .with_generator(&generator)
            .analyze_table(parse("x\n1\n2\n"));
        assert_eq!(run.status, RunStatus::Completed);
        let insights = run.insights.unwrap();
        assert!(insights.contains("Data Analysis Insights"));
        assert!(run.errors.is_empty());
    }

    #[test]
    fn other_generation_error_recorded() {
        let generator = FixedGenerator(Err(GenerationError::Other("boom".into())));
        let run = Analyzer::new("t")
            .with_generator(&generator)
            .analyze_table(parse("x\n1\n2\n"));
        assert_eq!(run.status, RunStatus::Completed);
        assert!(run.insights.is_none());
        assert!(run
            .errors
            .iter()
            .any(|e| e.contains("insights generation error")));
    }

    #[test]
    fn no_generator_means_templated_summary() {
        let run = Analyzer::new("t").analyze_table(parse("x\n1\n2\n"));
        assert!(run.insights.unwrap().contains("Data Analysis Insights"));
    }

    // ── Serialization boundary ───────────────────────────────────

    #[test]
    fn run_serializes_without_the_table() {
        let run = Analyzer::new("t").analyze_table(parse("x,y\n1,2\n3,4\n5,6\n"));
        let json = serde_json::to_value(&run).unwrap();
        assert_eq!(json["status"], "completed");
        assert!(json.get("cleaned").is_none());
        assert!(json["sql"].as_str().unwrap().contains("CREATE TABLE"));
        assert_eq!(json["cleaning"]["rows_removed"], 0);
    }
}
