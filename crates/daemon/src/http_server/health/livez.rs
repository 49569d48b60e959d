use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

#[tracing::instrument]
pub async fn handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({"status": "ok"})))
}
