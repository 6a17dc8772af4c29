//! SQL query tool: runs the agent's SQL against the loaded datasets.

use async_trait::async_trait;
use polars::prelude::*;
use polars::sql::SQLContext;
use serde_json::json;
use tracing::debug;

use tablechat_datastore::preview;

use crate::context::{ProgressEvent, RunContext};
use crate::tool::{required_str, Tool, ToolCall, ToolDefinition, ToolError, ToolResult};

/// Executes SQL against a transient in-memory session with every store
/// table registered by name, then records the result as the context's
/// "current result" for a later visualize call.
///
/// SQL failures come back as error text, never as a fault; the agent is
/// expected to read the message and retry with corrected SQL.
pub struct QueryDataTool;

#[async_trait]
impl Tool for QueryDataTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "query_data".to_string(),
            description: "Execute a SQL query against the loaded datasets. \
Table names correspond to dataset names."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "sql": {
                        "type": "string",
                        "description": "SQL query to execute. Table names correspond to dataset names."
                    },
                    "description": {
                        "type": "string",
                        "description": "Short description of what this query does."
                    }
                },
                "required": ["sql", "description"]
            }),
        }
    }

    async fn execute(&self, call: &ToolCall, ctx: &RunContext) -> Result<ToolResult, ToolError> {
        let sql = required_str(&call.input, "sql")?;
        required_str(&call.input, "description")?;

        if ctx.store().is_empty() {
            return Ok(ToolResult::error(call.id.clone(), "Error: No datasets loaded."));
        }

        ctx.progress().notify(ProgressEvent::ToolCall {
            tool_name: "query_data".to_string(),
            tool_call_id: call.id.clone(),
            args: call.input.clone(),
        });

        debug!(sql, "executing query");
        let result = match run_sql(ctx, sql) {
            Ok(df) => {
                // Record before returning so visualize always sees it.
                ctx.set_current_result(df.clone()).await;
                let summary = format!(
                    "Query executed successfully.\nResult: {} rows x {} columns\nColumns: {}\nPreview:\n{}",
                    df.height(),
                    df.width(),
                    df.get_column_names()
                        .iter()
                        .map(|s| s.to_string())
                        .collect::<Vec<_>>()
                        .join(", "),
                    preview(&df, 5),
                );
                ToolResult::ok(call.id.clone(), summary)
            }
            Err(e) => ToolResult::error(
                call.id.clone(),
                format!("Error executing SQL query: {}", e),
            ),
        };

        ctx.progress().notify(ProgressEvent::ToolResult {
            tool_name: "query_data".to_string(),
            tool_call_id: call.id.clone(),
            result: result.content.clone(),
        });
        Ok(result)
    }
}

/// Fresh SQL session per call: register every store table as a lazy frame,
/// execute, materialize.
fn run_sql(ctx: &RunContext, sql: &str) -> PolarsResult<DataFrame> {
    let mut session = SQLContext::new();
    for (name, df) in ctx.store().tables() {
        session.register(name, df.clone().lazy());
    }
    session.execute(sql)?.collect()
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

    fn test_ctx(dir: &Path) -> (RunContext, mpsc::UnboundedReceiver<ProgressEvent>) {
        fs::write(
            dir.join("sales.csv"),
            "region,amount\nnorth,10\nsouth,20\neast,5\n",
        )
        .unwrap();
        let store = Arc::new(DatasetStore::load(dir).unwrap());
        let (tx, rx) = mpsc::unbounded_channel();
        (
            RunContext::new(store, dir.to_path_buf(), ProgressSender::new(tx)),
            rx,
        )
    }

    fn call(sql: &str) -> ToolCall {
        ToolCall {
            id: "call_1".to_string(),
            name: "query_data".to_string(),
            input: json!({"sql": sql, "description": "test query"}),
        }
    }

    #[tokio::test]
    async fn test_query_success_summary_matches_shape() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, mut progress) = test_ctx(dir.path());

        let result = QueryDataTool
            .execute(&call("SELECT region, amount FROM sales ORDER BY amount DESC"), &ctx)
            .await
            .unwrap();

        assert!(!result.is_error);
        assert!(result.content.contains("Result: 3 rows x 2 columns"));
        assert!(result.content.contains("Columns: region, amount"));
        assert!(result.content.contains("south"));

        // Current result recorded before return.
        let current = ctx.current_result().await.unwrap();
        assert_eq!(current.height(), 3);

        // Call then result on the progress channel.
        assert!(matches!(progress.recv().await.unwrap(), ProgressEvent::ToolCall { .. }));
        assert!(matches!(progress.recv().await.unwrap(), ProgressEvent::ToolResult { .. }));
    }

    #[tokio::test]
    async fn test_sql_error_is_text_and_leaves_result_unset() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _progress) = test_ctx(dir.path());

        let result = QueryDataTool
            .execute(&call("SELECT nope FROM missing_table"), &ctx)
            .await
            .unwrap();

        assert!(result.is_error);
        assert!(result.content.contains("Error"));
        assert!(ctx.current_result().await.is_none());
    }

    #[tokio::test]
    async fn test_sql_error_keeps_previous_result() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _progress) = test_ctx(dir.path());

        QueryDataTool
            .execute(&call("SELECT * FROM sales"), &ctx)
            .await
            .unwrap();
        let before = ctx.current_result().await.unwrap();

        QueryDataTool
            .execute(&call("SELECT broken syntax here"), &ctx)
            .await
            .unwrap();
        let after = ctx.current_result().await.unwrap();
        assert_eq!(before.height(), after.height());
    }

    #[tokio::test]
    async fn test_missing_input_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _progress) = test_ctx(dir.path());

        let bad = ToolCall {
            id: "call_1".to_string(),
            name: "query_data".to_string(),
            input: json!({"sql": "SELECT 1"}),
        };
        let err = QueryDataTool.execute(&bad, &ctx).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }
}
