//! Insight context building and the text-generation seam.
//!
//! Natural-language insight generation is delegated to an external
//! capability behind [`TextGenerator`]. The core only prepares the
//! plain-text context block ([`build_context`]) and owns the
//! deterministic fallback ([`templated_summary`]) used when the
//! capability reports a quota or availability failure — those are a
//! recognized error class, not a pipeline failure.

use crate::anomaly::AnomalyReport;
use crate::cleaner::CleaningReport;
use crate::statistics::StatisticsReport;
use std::fmt::Write as _;
use thiserror::Error;

// ── Capability seam ───────────────────────────────────────────────────

/// Failure classes of the external text-generation capability.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    /// Account or quota exhausted; fall back to the templated summary.
    #[error("generation quota exhausted: {0}")]
    QuotaExhausted(String),
    /// Service unreachable or not found; fall back likewise.
    #[error("generation service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Anything else; recorded as a run error.
    #[error("generation failed: {0}")]
    Other(String),
}

impl GenerationError {
    /// Whether the pipeline should substitute the templated summary
    /// instead of recording a failure.
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::QuotaExhausted(_) | Self::ServiceUnavailable(_))
    }
}

/// External text-generation capability: takes a plain-text context
/// block, returns plain text. Treated as fallible by the pipeline.
pub trait TextGenerator {
    fn generate(&self, context: &str) -> Result<String, GenerationError>;
}

// ── Context block ─────────────────────────────────────────────────────

/// Renders the three reports into the plain-text context handed to the
/// text-generation capability.
pub fn build_context(
    cleaning: &CleaningReport,
    statistics: &StatisticsReport,
    anomalies: &AnomalyReport,
) -> String {
    let mut out = String::new();
    out.push_str("Dataset Analysis Summary:\n\n");

    out.push_str("1. Data Cleaning:\n");
    let _ = writeln!(
        out,
        "- Original shape: ({}, {})",
        cleaning.original_shape.0, cleaning.original_shape.1
    );
    let _ = writeln!(
        out,
        "- Cleaned shape: ({}, {})",
        cleaning.cleaned_shape.0, cleaning.cleaned_shape.1
    );
    let _ = writeln!(out, "- Rows removed: {}", cleaning.rows_removed);
    let _ = writeln!(out, "- Duplicates found: {}", cleaning.duplicates);

    out.push_str("\n2. Dataset Overview:\n");
    let _ = writeln!(out, "- Total rows: {}", statistics.shape.0);
    let _ = writeln!(out, "- Total columns: {}", statistics.shape.1);
    let _ = writeln!(out, "- Columns: {}", statistics.columns.join(", "));

    out.push_str("\n3. Numeric Summary:\n");
    if statistics.numeric_summary.is_empty() {
        out.push_str("No numeric columns\n");
    } else {
        for (name, summary) in &statistics.numeric_summary {
            let _ = writeln!(
                out,
                "- {name}: count={}, mean={}, std={}, min={}, max={}",
                summary.count,
                fmt_stat(summary.mean),
                fmt_stat(summary.std),
                fmt_stat(summary.min),
                fmt_stat(summary.max),
            );
        }
    }

    out.push_str("\n4. Categorical Summary:\n");
    if statistics.categorical_summary.is_empty() {
        out.push_str("No categorical columns\n");
    } else {
        for (name, summary) in &statistics.categorical_summary {
            let _ = writeln!(out, "- {name}: {} unique values", summary.unique_values);
        }
    }

    out.push_str("\n5. Anomalies Detected:\n");
    let _ = writeln!(out, "{}", anomalies.summary);
    let outlier_columns: Vec<&str> = anomalies.outliers.keys().map(String::as_str).collect();
    let _ = writeln!(out, "Outliers by column: [{}]", outlier_columns.join(", "));

    out.push_str(
        "\nBased on this analysis, provide:\n\
         1. Key insights about the data\n\
         2. Notable patterns or trends\n\
         3. Data quality observations\n\
         4. Recommendations for further analysis\n\
         5. Potential business implications\n\n\
         Keep the response concise but informative.\n",
    );
    out
}

fn fmt_stat(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.2}"),
        None => "n/a".to_string(),
    }
}

// ── Deterministic fallback ────────────────────────────────────────────

/// Markdown summary derived only from the reports; identical reports
/// always produce identical text.
pub fn templated_summary(statistics: &StatisticsReport, anomalies: &AnomalyReport) -> String {
    let lines = [
        "### Data Analysis Insights (Fallback Mode)".to_string(),
        String::new(),
        "**1. Key Insights**".to_string(),
        format!(
            "- The dataset contains {} rows and {} columns.",
            statistics.shape.0, statistics.shape.1
        ),
        format!(
            "- There are {} numeric variables and {} categorical variables.",
            statistics.numeric_summary.len(),
            statistics.categorical_summary.len()
        ),
        String::new(),
        "**2. Patterns & Trends**".to_string(),
        "- Distribution analysis shows varying ranges across numeric features.".to_string(),
        "- Correlation analysis suggests potential relationships between variables."
            .to_string(),
        String::new(),
        "**3. Data Quality**".to_string(),
        "- Data cleaning handled missing values and duplicate rows.".to_string(),
        format!(
            "- {} column(s) show univariate outliers; {} row(s) belong to duplicate groups.",
            anomalies.outliers.len(),
            anomalies.duplicates
        ),
        String::new(),
        "**4. Recommendations**".to_string(),
        "- Consider collecting more data points for robust analysis.".to_string(),
        "- Further investigate the identified outliers.".to_string(),
        String::new(),
        "**5. Business Implications**".to_string(),
        "- These findings can support data-driven decision making.".to_string(),
        "- Monitor key metrics for changes over time.".to_string(),
    ];
    lines.join("\n")
}

// ── Tests ─────────────────────────────────────────────────────────────
