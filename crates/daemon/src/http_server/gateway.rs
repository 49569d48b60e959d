use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use common::linked_data::BlockstoreError;
use common::prelude::Cid;
use common::unixfs::UnixFsError;

use crate::ServiceState;

#[derive(Debug, Deserialize)]
pub struct GatewayQuery {
    pub format: Option<String>,
}

/// Serve `root/path` from the local network as a block container.
///
/// Only the trustless `?format=car` response is offered; the bytes are
///  verified by whoever fetches them.
#[tracing::instrument(skip(state))]
pub async fn handler(
    State(state): State<ServiceState>,
    Path((root, file_path)): Path<(String, String)>,
    Query(query): Query<GatewayQuery>,
) -> Result<Response, GatewayError> {
    if query.format.as_deref() != Some("car") {
        return Err(GatewayError::FormatRequired);
    }
    let root: Cid = root
        .parse()
        .map_err(|_| GatewayError::InvalidCid(root.clone()))?;

    let export = state.network().export_car(&root, &file_path)?;
    tracing::debug!(%root, target = %export.target, bytes = export.car.len(), "exported block container");

    let mut response = Body::from(export.car).into_response();
    if let Some(content_type) = export
        .content_type
        .as_deref()
        .and_then(|value| HeaderValue::from_str(value).ok())
    {
        response.headers_mut().insert(header::CONTENT_TYPE, content_type);
    }
    Ok(response)
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("only format=car is served")]
    FormatRequired,
    #[error("invalid content id: {0}")]
    InvalidCid(String),
    #[error(transparent)]
    Export(#[from] UnixFsError),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match &self {
            GatewayError::FormatRequired | GatewayError::InvalidCid(_) => StatusCode::BAD_REQUEST,
            GatewayError::Export(UnixFsError::NotFound(_))
            | GatewayError::Export(UnixFsError::Blockstore(BlockstoreError::NotFound(_))) => {
                StatusCode::NOT_FOUND
            }
            GatewayError::Export(UnixFsError::NotAFile(_))
            | GatewayError::Export(UnixFsError::NotADirectory(_)) => StatusCode::BAD_REQUEST,
            GatewayError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!("gateway error: {}", self);
        }
        (
            status,
            [(header::CONTENT_TYPE, "text/plain")],
            self.to_string(),
        )
            .into_response()
    }
}
