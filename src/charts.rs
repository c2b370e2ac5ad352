//! Chart planning and the rendering seam.
//!
//! The core decides *which* charts a dataset warrants ([`chart_plan`]);
//! producing image files is an external concern behind
//! [`ChartRenderer`]. The plan is deterministic:
//!
//! - a histogram for each of the first three numeric columns
//! - a correlation heatmap when at least two numeric columns exist
//! - a bar chart of top values for the first non-numeric column
//! - a scatter plot of the first two numeric columns

use crate::error::PipelineError;
use crate::table::{DataType, Table};
use serde::Serialize;

/// Standard chart types the pipeline knows how to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Histogram,
    Correlation,
    BarChart,
    Scatter,
}

/// A chart the plan asks for: which kind over which columns.
///
/// Column-independent charts (the correlation heatmap) carry an empty
/// column list.
#[derive(Debug, Clone, Serialize)]
pub struct ChartRequest {
    pub kind: ChartKind,
    pub columns: Vec<String>,
}

/// A chart a renderer produced, with the file it wrote.
#[derive(Debug, Clone, Serialize)]
pub struct ChartDescriptor {
    pub kind: ChartKind,
    pub columns: Vec<String>,
    pub filename: String,
}

/// External chart renderer: consumes the cleaned table and a dataset
/// identifier, returns descriptors for the files it wrote. A failing
/// renderer is recoverable at the pipeline level.
pub trait ChartRenderer {
    fn render(&self, table: &Table, dataset_id: &str)
        -> Result<Vec<ChartDescriptor>, PipelineError>;
}

/// Builds the deterministic chart plan for a table.
pub fn chart_plan(table: &Table) -> Vec<ChartRequest> {
    let mut plan = Vec::new();

    let numeric: Vec<&str> = table
        .iter()
        .filter(|(_, col)| col.dtype() == DataType::Numeric)
        .map(|(name, _)| name)
        .collect();
    let non_numeric: Vec<&str> = table
        .iter()
        .filter(|(_, col)| col.dtype() != DataType::Numeric)
        .map(|(name, _)| name)
        .collect();

    for name in numeric.iter().take(3) {
        plan.push(ChartRequest {
            kind: ChartKind::Histogram,
            columns: vec![(*name).to_string()],
        });
    }

    if numeric.len() >= 2 {
        plan.push(ChartRequest {
            kind: ChartKind::Correlation,
            columns: Vec::new(),
        });
    }

    if let Some(first) = non_numeric.first() {
        plan.push(ChartRequest {
            kind: ChartKind::BarChart,
            columns: vec![(*first).to_string()],
        });
    }

    if numeric.len() >= 2 {
        plan.push(ChartRequest {
            kind: ChartKind::Scatter,
            columns: vec![numeric[0].to_string(), numeric[1].to_string()],
        });
    }

    plan
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::CsvReader;

    fn parse(csv: &str) -> Table {
        CsvReader::new().parse_str(csv).unwrap()
    }

    #[test]
    fn full_plan_for_mixed_table() {
        let table = parse("a,b,c,d,label\n1,2,3,4,x\n5,6,7,8,y\n");
        let plan = chart_plan(&table);
        let kinds: Vec<ChartKind> = plan.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ChartKind::Histogram,
                ChartKind::Histogram,
                ChartKind::Histogram,
                ChartKind::Correlation,
                ChartKind::BarChart,
                ChartKind::Scatter,
            ]
        );
        // Histograms cover only the first three numeric columns.
        assert_eq!(plan[0].columns, vec!["a"]);
        assert_eq!(plan[2].columns, vec!["c"]);
        assert_eq!(plan[5].columns, vec!["a", "b"]);
    }

    #[test]
    fn single_numeric_column_gets_histogram_only() {
        let plan = chart_plan(&parse("x\n1\n2\n"));
        let kinds: Vec<ChartKind> = plan.iter().map(|r| r.kind).collect();
        assert_eq!(kinds, vec![ChartKind::Histogram]);
    }

    #[test]
    fn text_only_table_gets_bar_chart_only() {
        let plan = chart_plan(&parse("label\nfoo\nbar\nbaz\nfoo\nzap\n"));
        let kinds: Vec<ChartKind> = plan.iter().map(|r| r.kind).collect();
        assert_eq!(kinds, vec![ChartKind::BarChart]);
    }

    #[test]
    fn empty_table_plans_nothing() {
        assert!(chart_plan(&Table::new()).is_empty());
    }

    #[test]
    fn kinds_serialize_in_snake_case() {
        let json = serde_json::to_value(ChartKind::BarChart).unwrap();
        assert_eq!(json, "bar_chart");
    }
}
