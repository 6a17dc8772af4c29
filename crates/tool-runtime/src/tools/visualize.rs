//! Visualization tool: renders the current query result as a chart or a
//! table export.

use std::path::PathBuf;

use async_trait::async_trait;
use polars::prelude::*;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use tablechat_datastore::preview;

use crate::chart::{render_chart, ChartSpec};
use crate::context::{ProgressEvent, RunContext};
use crate::tool::{required_str, Tool, ToolCall, ToolDefinition, ToolError, ToolResult};

/// Optional transform applied to the current result before a table export.
#[derive(Debug, Default, Deserialize)]
struct TableSpec {
    columns: Option<Vec<String>>,
    sort_by: Option<String>,
    #[serde(default)]
    descending: bool,
    limit: Option<usize>,
}

/// Turns the context's current result into an output artifact: a chart
/// spec rendered to a self-contained HTML file, or a (optionally
/// transformed) CSV export.
///
/// Operates on a clone of the current result, so the recorded result is
/// never mutated. All domain failures come back as error text.
pub struct VisualizeTool;

#[async_trait]
impl Tool for VisualizeTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "visualize".to_string(),
            description: "Create a visualization from the last query_data result. \
Produces either a chart (HTML) or a table export (CSV)."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "title": {
                        "type": "string",
                        "description": "Title of the visualization. Also used (sanitized) as the output filename."
                    },
                    "result_type": {
                        "type": "string",
                        "enum": ["figure", "table"],
                        "description": "Either 'figure' (chart) or 'table' (CSV export)."
                    },
                    "description": {
                        "type": "string",
                        "description": "Description of what this visualization shows."
                    },
                    "spec": {
                        "type": "object",
                        "description": "For figures (required): {chart: bar|line|scatter|pie, x: column, y: column or [columns]}. \
For tables (optional): {columns?: [names], sort_by?: column, descending?: bool, limit?: rows}."
                    }
                },
                "required": ["title", "result_type", "description"]
            }),
        }
    }

    async fn execute(&self, call: &ToolCall, ctx: &RunContext) -> Result<ToolResult, ToolError> {
        let title = required_str(&call.input, "title")?.to_string();
        let result_type = required_str(&call.input, "result_type")?.to_string();
        required_str(&call.input, "description")?;

        let Some(df) = ctx.current_result().await else {
            return Ok(ToolResult::error(
                call.id.clone(),
                "Error: No data available. Call query_data first.",
            ));
        };

        ctx.progress().notify(ProgressEvent::ToolCall {
            tool_name: "visualize".to_string(),
            tool_call_id: call.id.clone(),
            args: call.input.clone(),
        });

        let slug = sanitize_title(&title);
        let slug = if slug.is_empty() { "untitled".to_string() } else { slug };
        debug!(%title, %slug, %result_type, "creating visualization");

        let content = match result_type.as_str() {
            "figure" => create_figure(ctx, &call.input, df, &title, &slug),
            "table" => create_table(ctx, &call.input, df, &title, &slug),
            other => Err(format!(
                "Error: Unknown result_type '{}'. Use 'figure' or 'table'.",
                other
            )),
        };

        let result = match content {
            Ok(summary) => ToolResult::ok(call.id.clone(), summary),
            Err(message) => ToolResult::error(call.id.clone(), message),
        };

        ctx.progress().notify(ProgressEvent::ToolResult {
            tool_name: "visualize".to_string(),
            tool_call_id: call.id.clone(),
            result: result.content.clone(),
        });
        Ok(result)
    }
}

fn create_figure(
    ctx: &RunContext,
    input: &serde_json::Value,
    df: DataFrame,
    title: &str,
    slug: &str,
) -> Result<String, String> {
    let spec_value = input
        .get("spec")
        .ok_or_else(|| "Error: Figures require a 'spec' object (chart, x, y).".to_string())?;
    let spec = ChartSpec::from_value(spec_value).map_err(|e| format!("Error: {}", e))?;

    let (html, traces) =
        render_chart(&df, &spec, title).map_err(|e| format!("Error: {}", e))?;

    let path = output_path(ctx, slug, "html")?;
    std::fs::write(&path, html)
        .map_err(|e| format!("Error: Failed to write figure file: {}", e))?;

    Ok(format!(
        "Figure created: {}\nSaved to: {}\nType: {}\nTraces: {}",
        title,
        path.display(),
        spec.kind.as_str(),
        traces,
    ))
}

fn create_table(
    ctx: &RunContext,
    input: &serde_json::Value,
    df: DataFrame,
    title: &str,
    slug: &str,
) -> Result<String, String> {
    let spec: TableSpec = match input.get("spec") {
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|e| format!("Error: Invalid table spec: {}", e))?,
        None => TableSpec::default(),
    };

    let mut result = df;
    if let Some(columns) = &spec.columns {
        result = result
            .select(columns.iter().map(|s| s.as_str()))
            .map_err(|e| format!("Error: {}", e))?;
    }
    if let Some(sort_by) = &spec.sort_by {
        result = result
            .sort(
                [sort_by.as_str()],
                SortMultipleOptions::default().with_order_descending(spec.descending),
            )
            .map_err(|e| format!("Error: {}", e))?;
    }
    if let Some(limit) = spec.limit {
        result = result.head(Some(limit));
    }

    let path = output_path(ctx, slug, "csv")?;
    let mut file = std::fs::File::create(&path)
        .map_err(|e| format!("Error: Failed to create table file: {}", e))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut result)
        .map_err(|e| format!("Error: Failed to write table file: {}", e))?;

    Ok(format!(
        "Table created: {}\nSaved to: {}\nShape: {} rows x {} columns\nPreview:\n{}",
        title,
        path.display(),
        result.height(),
        result.width(),
        preview(&result, 10),
    ))
}

fn output_path(ctx: &RunContext, slug: &str, extension: &str) -> Result<PathBuf, String> {
    std::fs::create_dir_all(ctx.output_dir())
        .map_err(|e| format!("Error: Failed to create output directory: {}", e))?;
    Ok(ctx.output_dir().join(format!("{}.{}", slug, extension)))
}

/// Filesystem-safe slug: drop everything outside word chars, whitespace
/// and hyphens, trim, map whitespace to underscores, lowercase.
///
/// Idempotent; distinct titles differing only in case or punctuation may
/// collapse to the same filename.
pub fn sanitize_title(title: &str) -> String {
    let kept: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-' || c.is_whitespace())
        .collect();
    kept.trim()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect::<String>()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ProgressSender;
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;
    use tablechat_datastore::DatasetStore;
    use tokio::sync::mpsc;

    fn test_ctx(dir: &Path) -> RunContext {
        fs::write(
            dir.join("sales.csv"),
            "region,amount\nnorth,10\nsouth,20\neast,5\n",
        )
        .unwrap();
        let store = Arc::new(DatasetStore::load(dir).unwrap());
        let (tx, _rx) = mpsc::unbounded_channel();
        RunContext::new(store, dir.join("output"), ProgressSender::new(tx))
    }

    fn call(input: serde_json::Value) -> ToolCall {
        ToolCall {
            id: "call_2".to_string(),
            name: "visualize".to_string(),
            input,
        }
    }

    async fn seed_result(ctx: &RunContext) {
        let df = df!(
            "region" => &["north", "south", "east"],
            "amount" => &[10i64, 20, 5],
        )
        .unwrap();
        ctx.set_current_result(df).await;
    }

    #[test]
    fn test_sanitize_title() {
        assert_eq!(sanitize_title("Sales by Region!"), "sales_by_region");
        assert_eq!(sanitize_title("  Top 5: Products?  "), "top_5_products");
        // Idempotent
        assert_eq!(sanitize_title("sales_by_region"), "sales_by_region");
        // Case/punctuation collisions collapse (documented)
        assert_eq!(sanitize_title("Sales, by region"), sanitize_title("sales BY region"));
    }

    #[tokio::test]
    async fn test_no_data_error() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_ctx(dir.path());

        let result = VisualizeTool
            .execute(
                &call(serde_json::json!({
                    "title": "t", "result_type": "table", "description": "d"
                })),
                &ctx,
            )
            .await
            .unwrap();
        assert!(result.is_error);
        assert_eq!(
            result.content,
            "Error: No data available. Call query_data first."
        );
    }

    #[tokio::test]
    async fn test_figure_written_to_output() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_ctx(dir.path());
        seed_result(&ctx).await;

        let result = VisualizeTool
            .execute(
                &call(serde_json::json!({
                    "title": "Sales by Region",
                    "result_type": "figure",
                    "description": "bar chart of sales",
                    "spec": {"chart": "bar", "x": "region", "y": "amount"}
                })),
                &ctx,
            )
            .await
            .unwrap();

        assert!(!result.is_error, "{}", result.content);
        assert!(result.content.starts_with("Figure created: Sales by Region"));
        assert!(result.content.contains("Traces: 1"));

        let path = dir.path().join("output/sales_by_region.html");
        assert!(path.is_file());
        let html = fs::read_to_string(path).unwrap();
        assert!(html.contains("<svg"));
    }

    #[tokio::test]
    async fn test_table_with_transform() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_ctx(dir.path());
        seed_result(&ctx).await;

        let result = VisualizeTool
            .execute(
                &call(serde_json::json!({
                    "title": "Top Regions",
                    "result_type": "table",
                    "description": "sorted by amount",
                    "spec": {"sort_by": "amount", "descending": true, "limit": 2}
                })),
                &ctx,
            )
            .await
            .unwrap();

        assert!(!result.is_error, "{}", result.content);
        assert!(result.content.contains("Shape: 2 rows x 2 columns"));

        let csv = fs::read_to_string(dir.path().join("output/top_regions.csv")).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "region,amount");
        assert_eq!(lines[1], "south,20");
    }

    #[tokio::test]
    async fn test_table_without_spec_exports_current_result() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_ctx(dir.path());
        seed_result(&ctx).await;

        let result = VisualizeTool
            .execute(
                &call(serde_json::json!({
                    "title": "raw", "result_type": "table", "description": "d"
                })),
                &ctx,
            )
            .await
            .unwrap();
        assert!(!result.is_error);
        assert!(result.content.contains("Shape: 3 rows x 2 columns"));
    }

    #[tokio::test]
    async fn test_unknown_result_type() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_ctx(dir.path());
        seed_result(&ctx).await;

        let result = VisualizeTool
            .execute(
                &call(serde_json::json!({
                    "title": "t", "result_type": "hologram", "description": "d"
                })),
                &ctx,
            )
            .await
            .unwrap();
        assert!(result.is_error);
        assert_eq!(
            result.content,
            "Error: Unknown result_type 'hologram'. Use 'figure' or 'table'."
        );
    }

    #[tokio::test]
    async fn test_bad_chart_spec_is_text_error() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_ctx(dir.path());
        seed_result(&ctx).await;

        let result = VisualizeTool
            .execute(
                &call(serde_json::json!({
                    "title": "t",
                    "result_type": "figure",
                    "description": "d",
                    "spec": {"chart": "bar", "x": "region", "y": "no_such_column"}
                })),
                &ctx,
            )
            .await
            .unwrap();
        assert!(result.is_error);
        assert!(result.content.starts_with("Error:"));
    }

    #[tokio::test]
    async fn test_visualize_does_not_mutate_current_result() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_ctx(dir.path());
        seed_result(&ctx).await;

        VisualizeTool
            .execute(
                &call(serde_json::json!({
                    "title": "limited",
                    "result_type": "table",
                    "description": "d",
                    "spec": {"limit": 1}
                })),
                &ctx,
            )
            .await
            .unwrap();

        // The recorded result still has all rows.
        assert_eq!(ctx.current_result().await.unwrap().height(), 3);
    }
}
