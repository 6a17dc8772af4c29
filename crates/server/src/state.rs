use std::path::PathBuf;
use std::sync::Arc;

use tablechat_datastore::DatasetStore;
use tablechat_llm::Summarizer;
use tablechat_tool_runtime::AgentRunner;

/// Shared application state. Everything here is either immutable after
/// startup (store, output_dir) or stateless across requests (runner,
/// summarizer), so handlers need no locks.
pub struct AppState {
    pub store: Arc<DatasetStore>,
    pub runner: Arc<AgentRunner>,
    pub summarizer: Summarizer,
    pub output_dir: PathBuf,
}
