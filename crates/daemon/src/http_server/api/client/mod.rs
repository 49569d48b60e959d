#[allow(clippy::module_inception)]
mod client;
mod error;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use url::Url;

pub use client::ApiClient;
pub use error::ApiError;

/// A typed request against the daemon API.
///
/// Each handler module implements this for its request type so the CLI
///  and the server share one definition of the wire shape.
pub trait ApiRequest {
    type Response: DeserializeOwned;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError>;
}
