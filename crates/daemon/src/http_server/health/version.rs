use axum::response::IntoResponse;
use axum::Json;

use common::prelude::build_info;

#[tracing::instrument]
pub async fn handler() -> impl IntoResponse {
    Json(build_info())
}
