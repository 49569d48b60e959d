use reqwest::{header::HeaderMap, header::HeaderValue, Client};
use url::Url;

use common::prelude::build_info;

use super::error::ApiError;
use super::ApiRequest;
use crate::http_server::api::v0::error::ErrorBody;

#[derive(Debug, Clone)]
pub struct ApiClient {
    pub remote: Url,
    client: Client,
}

impl ApiClient {
    pub fn new(remote: &Url) -> Result<Self, ApiError> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        default_headers.insert("Accept", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .user_agent(build_info().user_agent())
            .default_headers(default_headers)
            .build()?;

        Ok(Self {
            remote: remote.clone(),
            client,
        })
    }

    pub async fn call<T: ApiRequest>(&self, request: T) -> Result<T::Response, ApiError> {
        let request_builder = request.build_request(&self.remote, &self.client)?;
        let response = request_builder.send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T::Response>().await?);
        }

        let text = response.text().await?;
        match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => Err(ApiError::Tool {
                status,
                envelope: body.error,
            }),
            Err(_) => Err(ApiError::HttpStatus(status, text)),
        }
    }

    /// Get the base URL for API requests
    pub fn base_url(&self) -> &Url {
        &self.remote
    }

    /// Get the underlying HTTP client for custom requests
    pub fn http_client(&self) -> &Client {
        &self.client
    }
}
