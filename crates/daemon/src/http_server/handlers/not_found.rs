use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;

use common::prelude::ErrorEnvelope;

use crate::http_server::api::v0::error::ErrorBody;

pub async fn not_found_handler(uri: Uri, headers: HeaderMap) -> Response {
    let wants_json = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("application/json"));

    if wants_json {
        let body = ErrorBody {
            error: ErrorEnvelope {
                name: "NotFound".to_string(),
                message: "not found".to_string(),
                cause: Some(uri.path().to_string()),
            },
        };
        (StatusCode::NOT_FOUND, Json(body)).into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            [(header::CONTENT_TYPE, "text/plain")],
            "not found",
        )
            .into_response()
    }
}
