//! Illustrative SQL generation for a cleaned table.
//!
//! [`sql_script`] emits a PostgreSQL `CREATE TABLE` statement plus
//! sample `INSERT`s for the first five rows. The script is illustrative
//! output for the caller — nothing here executes it.
//!
//! Type mapping: numeric columns whose values are all integral become
//! `INTEGER`, other numeric columns `DECIMAL`, booleans `BOOLEAN`,
//! date-times `TIMESTAMP`, everything else `TEXT`.

use crate::table::{Cell, Column, DataType, Table};

/// Rows included as sample INSERT statements.
const SAMPLE_ROWS: usize = 5;

/// Emits the schema and sample-data script for `table`, naming the SQL
/// table after `file_name` (extension stripped, spaces underscored,
/// lowercased).
pub fn sql_script(table: &Table, file_name: &str) -> String {
    let table_name = table_name_from(file_name);
    let mut out = format!("-- SQL Schema and Data for {file_name}\n\n");

    out.push_str(&format!("CREATE TABLE IF NOT EXISTS {table_name} (\n"));
    out.push_str("    id SERIAL PRIMARY KEY");
    for (name, col) in table.iter() {
        out.push_str(",\n");
        out.push_str(&format!(
            "    {} {}",
            sanitize_identifier(name),
            column_sql_type(col)
        ));
    }
    out.push_str("\n);\n");

    out.push_str("\n-- Sample INSERT statements (first 5 rows)\n");
    let column_list: Vec<String> = table
        .column_names()
        .iter()
        .map(|n| sanitize_identifier(n))
        .collect();
    let column_list = column_list.join(", ");
    for row in 0..table.row_count().min(SAMPLE_ROWS) {
        let values: Vec<String> = table
            .iter()
            .map(|(_, col)| sql_literal(col.cell(row)))
            .collect();
        out.push_str(&format!(
            "INSERT INTO {table_name} ({column_list}) VALUES ({});\n",
            values.join(", ")
        ));
    }
    out
}

/// Table name derived from a file name.
fn table_name_from(file_name: &str) -> String {
    let stem = std::path::Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);
    sanitize_identifier(stem)
}

/// Lowercases and underscores an identifier.
fn sanitize_identifier(name: &str) -> String {
    name.replace(' ', "_").to_lowercase()
}

/// PostgreSQL column type for a table column.
fn column_sql_type(col: &Column) -> &'static str {
    match col.dtype() {
        DataType::Numeric => {
            let all_integral = col
                .numeric_cells()
                .all(|(_, v)| v.is_finite() && v.fract() == 0.0);
            if all_integral {
                "INTEGER"
            } else {
                "DECIMAL"
            }
        }
        DataType::Boolean => "BOOLEAN",
        DataType::Temporal => "TIMESTAMP",
        DataType::Text => "TEXT",
    }
}

/// Renders a cell as a SQL literal; single quotes are doubled.
fn sql_literal(cell: &Cell) -> String {
    match cell {
        Cell::Null => "NULL".to_string(),
        Cell::Number(v) => format!("{v}"),
        Cell::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Cell::Text(s) => format!("'{}'", s.replace('\'', "''")),
        Cell::DateTime(dt) => format!("'{}'", dt.format("%Y-%m-%d %H:%M:%S")),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────
