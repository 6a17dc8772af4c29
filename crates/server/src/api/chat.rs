use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderName, StatusCode};
use axum::response::sse::{KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;

use crate::api::{ChatRequest, ErrorResponse};
use crate::relay;
use crate::state::AppState;

/// Run the data-analysis agent and stream the conversation as SSE.
///
/// Frame types: `content`, `thinking`, `tool_call`, `tool_result`,
/// `error`, and the terminal `Done`.
#[utoipa::path(
    post,
    path = "/api/v1/llm/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "SSE stream of chat frames"),
        (status = 400, body = ErrorResponse)
    )
)]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Response {
    let Some((prompt, history)) = relay::split_request(request.messages) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "messages must not be empty".to_string(),
            }),
        )
            .into_response();
    };

    let frames = relay::chat_stream(
        state.runner.clone(),
        state.store.clone(),
        state.output_dir.clone(),
        prompt,
        history,
    );
    let stream = frames.map(|frame| Ok::<_, Infallible>(frame.into_sse_event()));

    let headers = [
        (header::CACHE_CONTROL, "no-cache"),
        (HeaderName::from_static("x-accel-buffering"), "no"),
    ];
    (headers, Sse::new(stream).keep_alive(KeepAlive::default())).into_response()
}
