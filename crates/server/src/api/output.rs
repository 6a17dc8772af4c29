use std::path::Path;
use std::sync::Arc;

use axum::extract::{Path as PathParam, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::warn;

use crate::api::ErrorResponse;
use crate::state::AppState;

/// Serve a generated artifact (chart HTML, exported CSV) from the output
/// directory. Filenames that try to leave the directory are rejected
/// before the filesystem is touched.
#[utoipa::path(
    get,
    path = "/api/v1/output/{filename}",
    params(("filename" = String, Path, description = "Artifact filename")),
    responses(
        (status = 200, description = "Artifact bytes"),
        (status = 403, body = ErrorResponse),
        (status = 404, body = ErrorResponse)
    )
)]
pub async fn get_output(
    State(state): State<Arc<AppState>>,
    PathParam(filename): PathParam<String>,
) -> Response {
    if filename.contains('/')
        || filename.contains('\\')
        || Path::new(&filename)
            .components()
            .any(|c| c.as_os_str() == "..")
    {
        warn!(filename, "rejected output filename");
        return forbidden();
    }

    let root = match tokio::fs::canonicalize(&state.output_dir).await {
        Ok(root) => root,
        Err(_) => return not_found(),
    };
    let candidate = match tokio::fs::canonicalize(root.join(&filename)).await {
        Ok(path) => path,
        Err(_) => return not_found(),
    };
    if !candidate.starts_with(&root) {
        warn!(filename, "output path escaped the artifact root");
        return forbidden();
    }

    let bytes = match tokio::fs::read(&candidate).await {
        Ok(bytes) => bytes,
        Err(_) => return not_found(),
    };

    ([(header::CONTENT_TYPE, content_type(&filename))], bytes).into_response()
}

fn content_type(filename: &str) -> &'static str {
    match Path::new(filename).extension().and_then(|e| e.to_str()) {
        Some("html") => "text/html; charset=utf-8",
        Some("csv") => "text/csv",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}

fn forbidden() -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(ErrorResponse {
            error: "Invalid filename".to_string(),
        }),
    )
        .into_response()
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "File not found".to_string(),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type() {
        assert_eq!(content_type("chart.html"), "text/html; charset=utf-8");
        assert_eq!(content_type("table.csv"), "text/csv");
        assert_eq!(content_type("data.json"), "application/json");
        assert_eq!(content_type("blob.bin"), "application/octet-stream");
        assert_eq!(content_type("noext"), "application/octet-stream");
    }
}
