use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;

use crate::api::ErrorResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct SummarizeRequest {
    /// The user message to generate a title from.
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SummarizeResponse {
    /// A short (≤5 words) conversation title.
    pub title: String,
}

/// Generate a conversation title from the first user message.
#[utoipa::path(
    post,
    path = "/api/v1/llm/summarize",
    request_body = SummarizeRequest,
    responses(
        (status = 200, body = SummarizeResponse),
        (status = 500, body = ErrorResponse)
    )
)]
pub async fn summarize(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SummarizeRequest>,
) -> Response {
    match state.summarizer.title_for(&request.message).await {
        Ok(title) => Json(SummarizeResponse { title }).into_response(),
        Err(e) => {
            error!(error = %e, "title generation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Failed to generate title".to_string(),
                }),
            )
                .into_response()
        }
    }
}
