use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use tablechat_datastore::DatasetInfo;

use crate::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct DatasetsResponse {
    pub datasets: Vec<DatasetInfo>,
}

/// List every loaded dataset with its shape and column names.
#[utoipa::path(
    get,
    path = "/api/v1/data",
    responses((status = 200, body = DatasetsResponse))
)]
pub async fn list_datasets(State(state): State<Arc<AppState>>) -> Json<DatasetsResponse> {
    Json(DatasetsResponse {
        datasets: state.store.info().to_vec(),
    })
}
