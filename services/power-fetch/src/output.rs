//! Result rendering.

use clap::ValueEnum;
use power_s3::ResultTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Aligned plain-text columns
    Table,
    /// JSON array of row objects
    Json,
    /// CSV with a header line
    Csv,
}

pub fn render(table: &ResultTable, format: OutputFormat) -> anyhow::Result<String> {
    Ok(match format {
        OutputFormat::Table => render_table(table),
        OutputFormat::Json => serde_json::to_string_pretty(table)?,
        OutputFormat::Csv => table.to_csv(),
    })
}

fn render_table(table: &ResultTable) -> String {
    let header: Vec<String> = table.column_names().iter().map(|s| s.to_string()).collect();

    let mut cells: Vec<Vec<String>> = Vec::with_capacity(table.len());
    for row in table.rows() {
        let mut line = vec![
            row.time().format("%Y-%m-%d %H:%M").to_string(),
            format!("{:.4}", row.lat()),
            format!("{:.4}", row.lon()),
        ];
        for (_, value) in row.values() {
            line.push(if value.is_nan() {
                "NaN".to_string()
            } else {
                format!("{:.2}", value)
            });
        }
        cells.push(line);
    }

    let widths: Vec<usize> = (0..header.len())
        .map(|i| {
            cells
                .iter()
                .map(|line| line[i].len())
                .chain(std::iter::once(header[i].len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let format_line = |line: &[String]| {
        line.iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:>width$}", cell, width = width))
            .collect::<Vec<_>>()
            .join("  ")
    };

    let mut out = format_line(&header);
    out.push('\n');
    for line in &cells {
        out.push_str(&format_line(line));
        out.push('\n');
    }
    out.push_str(&format!("({} rows)\n", table.len()));
    out
}
