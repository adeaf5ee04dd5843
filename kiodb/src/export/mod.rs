//! Markdown export of a table, built solely on the engine's public
//! row and column accessors.

use serde_json::Value;

use crate::error::Result;
use crate::table::Table;

/// Render the schema and the first `row_limit` records as two markdown
/// tables, cells padded to the widest entry of each column.
pub fn render_markdown(table: &Table, row_limit: usize) -> String {
    let schema_rows: Vec<Vec<String>> = table
        .columns()
        .iter()
        .map(|column| {
            vec![
                column.name.clone(),
                column.column_type.name().to_string(),
                cell(&column.default),
                column.unique.to_string(),
            ]
        })
        .collect();
    let schema_table = markdown_table(&["Name", "Type", "Default", "Unique"], &schema_rows);

    let titles = table.column_names();
    let title_refs: Vec<&str> = titles.iter().map(|s| s.as_str()).collect();
    let data_rows: Vec<Vec<String>> = table
        .get_all()
        .iter()
        .take(row_limit)
        .map(|record| record.values().map(cell).collect())
        .collect();
    let data_table = markdown_table(&title_refs, &data_rows);

    format!("{schema_table}\n{data_table}")
}

/// Write the rendered tables to `<path>.md`.
pub fn export_markdown(table: &Table, path: &str, row_limit: usize) -> Result<()> {
    let rendered = render_markdown(table, row_limit);
    std::fs::write(format!("{path}.md"), rendered)?;
    Ok(())
}

fn cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn markdown_table(titles: &[&str], rows: &[Vec<String>]) -> String {
    // Width of each column is its widest cell, title included.
    let widths: Vec<usize> = titles
        .iter()
        .enumerate()
        .map(|(i, title)| {
            rows.iter()
                .map(|row| row.get(i).map(String::len).unwrap_or(0))
                .chain(std::iter::once(title.len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    out.push_str(&render_row(
        &titles.iter().map(|t| t.to_string()).collect::<Vec<_>>(),
        &widths,
    ));
    out.push_str(&render_row(
        &widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>(),
        &widths,
    ));
    for row in rows {
        out.push_str(&render_row(row, &widths));
    }
    out
}

fn render_row(cells: &[String], widths: &[usize]) -> String {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:<width$}"))
        .collect();
    format!("| {} |\n", padded.join(" | "))
}
