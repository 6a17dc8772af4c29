//! Per-request state shared between the agent run and its tools.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use polars::prelude::DataFrame;
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use tablechat_datastore::DatasetStore;

/// Out-of-band tool activity, forwarded to the client alongside the
/// agent's own text stream.
///
/// Ordering within one invocation is call-then-result; across tools,
/// channel arrival order is preserved.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    ToolCall {
        tool_name: String,
        tool_call_id: String,
        /// The tool's full input object (includes the human `description`).
        args: Value,
    },
    ToolResult {
        tool_name: String,
        tool_call_id: String,
        result: String,
    },
}

/// Fire-and-forget handle onto the progress channel.
///
/// The channel is unbounded so a slow client can never stall a running
/// tool; if the consumer is already gone the event is simply dropped.
#[derive(Clone)]
pub struct ProgressSender {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ProgressSender {
    pub fn new(tx: mpsc::UnboundedSender<ProgressEvent>) -> Self {
        Self { tx }
    }

    pub fn notify(&self, event: ProgressEvent) {
        if self.tx.send(event).is_err() {
            debug!("progress consumer gone, dropping event");
        }
    }
}

/// The per-request dependency bag passed to every tool call.
///
/// Owned exclusively by one agent run; dropped when the run ends, which
/// also closes the progress channel (the consumer sees end-of-stream
/// instead of needing an explicit poison pill).
pub struct RunContext {
    store: Arc<DatasetStore>,
    /// Dataset summary snapshot taken at request start.
    dataset_info: String,
    /// Set by query_data, read by visualize.
    current_result: Mutex<Option<DataFrame>>,
    output_dir: PathBuf,
    progress: ProgressSender,
}

impl RunContext {
    pub fn new(store: Arc<DatasetStore>, output_dir: PathBuf, progress: ProgressSender) -> Self {
        let dataset_info = store.describe();
        Self {
            store,
            dataset_info,
            current_result: Mutex::new(None),
            output_dir,
            progress,
        }
    }

    pub fn store(&self) -> &DatasetStore {
        &self.store
    }

    pub fn dataset_info(&self) -> &str {
        &self.dataset_info
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn progress(&self) -> &ProgressSender {
        &self.progress
    }

    /// Record the most recent query result.
    pub async fn set_current_result(&self, df: DataFrame) {
        *self.current_result.lock().await = Some(df);
    }

    /// Clone of the most recent query result, if any. Tools operate on the
    /// clone so the recorded result is never mutated under the caller.
    pub async fn current_result(&self) -> Option<DataFrame> {
        self.current_result.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;
    use std::fs;

    pub(crate) fn test_store(dir: &Path) -> Arc<DatasetStore> {
        fs::write(
            dir.join("sales.csv"),
            "region,amount\nnorth,10\nsouth,20\neast,5\n",
        )
        .unwrap();
        Arc::new(DatasetStore::load(dir).unwrap())
    }

    #[tokio::test]
    async fn test_current_result_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(dir.path());
        let (tx, _rx) = mpsc::unbounded_channel();
        let ctx = RunContext::new(store, dir.path().to_path_buf(), ProgressSender::new(tx));

        assert!(ctx.current_result().await.is_none());

        let df = df!("x" => &[1i64, 2]).unwrap();
        ctx.set_current_result(df.clone()).await;
        let read = ctx.current_result().await.unwrap();
        assert_eq!(read.height(), 2);
    }

    #[tokio::test]
    async fn test_notify_after_receiver_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(dir.path());
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let ctx = RunContext::new(store, dir.path().to_path_buf(), ProgressSender::new(tx));

        // Must not panic or block.
        ctx.progress().notify(ProgressEvent::ToolResult {
            tool_name: "query_data".into(),
            tool_call_id: "c1".into(),
            result: "ok".into(),
        });
    }
}
