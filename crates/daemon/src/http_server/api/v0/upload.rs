use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::response::IntoResponse;
use reqwest::{Client, RequestBuilder};
use url::Url;

use common::prelude::UploadResult;
use common::tools::UploadArgs;

use super::error::ToolError;
use crate::http_server::api::client::{ApiError, ApiRequest};
use crate::ServiceState;

pub type UploadRequest = UploadArgs;
pub type UploadResponse = UploadResult;

#[tracing::instrument(skip_all)]
pub async fn handler(
    State(state): State<ServiceState>,
    payload: Result<Json<UploadRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ToolError> {
    let Json(req) = payload?;
    tracing::info!(name = %req.name, encoded = req.file.len(), "upload requested");

    let result = state.tools().upload(req).await?;
    Ok(Json(result))
}

impl ApiRequest for UploadRequest {
    type Response = UploadResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        let full_url = base_url.join("/api/v0/upload")?;
        Ok(client.post(full_url).json(&self))
    }
}
