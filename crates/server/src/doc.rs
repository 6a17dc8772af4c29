use utoipa::OpenApi;

use crate::api;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "tablechat",
        description = "Chat with your CSV datasets: SQL queries and charts driven by an LLM agent."
    ),
    paths(
        api::root,
        api::version,
        api::data::list_datasets,
        api::chat::chat,
        api::summarize::summarize,
        api::output::get_output,
    ),
    components(schemas(
        api::MessagePayload,
        api::ChatRequest,
        api::ErrorResponse,
        api::VersionResponse,
        api::data::DatasetsResponse,
        api::summarize::SummarizeRequest,
        api::summarize::SummarizeResponse,
        tablechat_datastore::DatasetInfo,
    ))
)]
pub struct ApiDoc;
