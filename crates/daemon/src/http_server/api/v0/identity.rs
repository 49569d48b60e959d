use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use url::Url;

use common::tools::IdentityResult;

use crate::http_server::api::client::{ApiError, ApiRequest};
use crate::ServiceState;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityRequest;

pub type IdentityResponse = IdentityResult;

#[tracing::instrument(skip_all)]
pub async fn handler(State(state): State<ServiceState>) -> impl IntoResponse {
    Json(state.tools().identity())
}

impl ApiRequest for IdentityRequest {
    type Response = IdentityResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        let full_url = base_url.join("/api/v0/identity")?;
        Ok(client.get(full_url))
    }
}
