use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::api;
use crate::doc::ApiDoc;
use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(api::root))
        .route("/api/v1/version", get(api::version))
        .route("/api/v1/data", get(api::data::list_datasets))
        .route("/api/v1/llm/chat", post(api::chat::chat))
        .route("/api/v1/llm/summarize", post(api::summarize::summarize))
        .route("/api/v1/output/{filename}", get(api::output::get_output))
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
