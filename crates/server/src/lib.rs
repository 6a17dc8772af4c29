pub mod api;
pub mod doc;
pub mod relay;
pub mod router;
pub mod sse;
pub mod state;

use std::sync::Arc;

use tracing::info;

use tablechat_core::Config;
use tablechat_datastore::DatasetStore;
use tablechat_llm::{OpenAiCompatProvider, Summarizer};
use tablechat_tool_runtime::{
    AgentRunner, ModelProvider, QueryDataTool, ToolRegistry, VisualizeTool,
};

use state::AppState;

/// Build the shared application state from config. Fails fast if the
/// dataset directory is missing or empty.
pub fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let store = Arc::new(DatasetStore::load(&config.data_path)?);
    info!("Loaded {} datasets", store.tables().len());

    let provider: Arc<dyn ModelProvider> = Arc::new(OpenAiCompatProvider::new(
        config.llm.effective_api_key().to_string(),
        config.llm.model.clone(),
        config.llm.base_url.clone(),
    ));

    let mut registry = ToolRegistry::new();
    registry.register(QueryDataTool)?;
    registry.register(VisualizeTool)?;

    let runner = Arc::new(AgentRunner::new(provider.clone(), Arc::new(registry)));
    let summarizer = Summarizer::new(provider);

    Ok(Arc::new(AppState {
        store,
        runner,
        summarizer,
        output_dir: config.output_dir.clone(),
    }))
}

/// Load datasets, assemble the router, and serve until shutdown.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let state = build_state(&config)?;
    let app = router::build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
