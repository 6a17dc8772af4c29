//! HTTP request handlers and wire schemas.

pub mod chat;
pub mod data;
pub mod output;
pub mod summarize;

use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use utoipa::ToSchema;

/// One message of the client-held conversation transcript.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct MessagePayload {
    /// `user` or `assistant`; anything else is ignored in the history.
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChatRequest {
    pub messages: Vec<MessagePayload>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VersionResponse {
    pub version: String,
}

#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Greeting"))
)]
pub async fn root() -> Json<Value> {
    Json(json!({ "message": "Hello, world!" }))
}

#[utoipa::path(
    get,
    path = "/api/v1/version",
    responses((status = 200, body = VersionResponse))
)]
pub async fn version() -> Json<VersionResponse> {
    Json(VersionResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
