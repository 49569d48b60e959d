use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::response::IntoResponse;
use reqwest::{Client, RequestBuilder};
use url::Url;

use common::prelude::RetrieveResult;
use common::resource;
use common::tools::RetrieveArgs;

use super::error::ToolError;
use crate::http_server::api::client::{ApiError, ApiRequest};
use crate::ServiceState;

pub type RetrieveRequest = RetrieveArgs;
pub type RetrieveResponse = RetrieveResult;

#[tracing::instrument(skip_all)]
pub async fn handler(
    State(state): State<ServiceState>,
    payload: Result<Json<RetrieveRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ToolError> {
    let Json(req) = payload?;
    tracing::info!(filepath = %resource::normalize(&req.filepath), "retrieve requested");

    let result = state.tools().retrieve(req).await?;
    Ok(Json(result))
}

impl ApiRequest for RetrieveRequest {
    type Response = RetrieveResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        let full_url = base_url.join("/api/v0/retrieve")?;
        Ok(client.post(full_url).json(&self))
    }
}
