//! Plain-text table rendering for tool output.
//!
//! The agent consumes tool results as text, so previews are rendered as
//! aligned columns rather than a serialized structure.

use polars::prelude::*;

/// Render up to `limit` rows of `df` as an aligned plain-text table:
/// a header line, columns padded to their widest cell, two-space separator.
pub fn preview(df: &DataFrame, limit: usize) -> String {
    let n = df.height().min(limit);
    let columns = df.get_columns();

    let mut cells: Vec<Vec<String>> = Vec::with_capacity(columns.len());
    for series in columns {
        let mut col = Vec::with_capacity(n + 1);
        col.push(series.name().to_string());
        for i in 0..n {
            let value = series
                .get(i)
                .map(|v| fmt_cell(&v))
                .unwrap_or_else(|_| "null".to_string());
            col.push(value);
        }
        cells.push(col);
    }

    let widths: Vec<usize> = cells
        .iter()
        .map(|col| col.iter().map(|c| c.len()).max().unwrap_or(0))
        .collect();

    let mut lines = Vec::with_capacity(n + 1);
    for row in 0..=n {
        let line = cells
            .iter()
            .zip(&widths)
            .map(|(col, width)| format!("{:<width$}", col[row]))
            .collect::<Vec<_>>()
            .join("  ");
        lines.push(line.trim_end().to_string());
    }
    lines.join("\n")
}

/// Render a single cell: strings unquoted, null as `null`, everything else
/// via the polars display impl.
fn fmt_cell(value: &AnyValue) -> String {
    match value {
        AnyValue::Null => "null".to_string(),
        AnyValue::String(s) => s.to_string(),
        AnyValue::StringOwned(s) => s.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_alignment() {
        let df = df!(
            "region" => &["north", "s"],
            "amount" => &[10i64, 2000],
        )
        .unwrap();

        let text = preview(&df, 5);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "region  amount");
        assert_eq!(lines[1], "north   10");
        assert_eq!(lines[2], "s       2000");
    }

    #[test]
    fn test_preview_limit() {
        let df = df!("x" => &[1i64, 2, 3, 4, 5, 6, 7]).unwrap();
        let text = preview(&df, 5);
        // Header + 5 rows
        assert_eq!(text.lines().count(), 6);
    }

    #[test]
    fn test_null_rendering() {
        let df = df!("x" => &[Some(1i64), None]).unwrap();
        let text = preview(&df, 5);
        assert!(text.lines().nth(2).unwrap().starts_with("null"));
    }
}
