use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::codec::{self, Base64Mode};
use crate::config::Configuration;
use crate::error::PipelineError;
use crate::linked_data::car;
use crate::resource::{self, Resource};
use crate::unixfs;
use crate::version::build_info;

/// Media type trustless gateways answer `?format=car` with
pub const CAR_MEDIA_TYPE: &str = "application/vnd.ipld.car";

#[derive(Debug, Clone, Copy, Default)]
pub struct RetrieveOptions {
    /// Encode the result as self-describing base64
    pub use_multiformat_base64: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrieveResult {
    pub data: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// Fetches files from a gateway as verifiable block containers.
#[derive(Debug, Clone)]
pub struct RetrievalPipeline {
    config: Configuration,
    client: Client,
}

impl RetrievalPipeline {
    /// The user agent is fixed here, from the build information, for the
    ///  lifetime of the client.
    pub fn new(config: Configuration) -> Result<Self, PipelineError> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(ACCEPT, HeaderValue::from_static(CAR_MEDIA_TYPE));
        let client = Client::builder()
            .user_agent(build_info().user_agent())
            .default_headers(default_headers)
            .build()?;

        Ok(Self { config, client })
    }

    /// `{gateway}/ipfs/{cid}{pathname}?format=car`
    pub fn fetch_url(&self, resource: &Resource) -> String {
        format!(
            "{}{}?format=car",
            self.config.gateway_base(),
            resource.gateway_path()
        )
    }

    pub async fn retrieve(
        &self,
        filepath: &str,
        options: RetrieveOptions,
    ) -> Result<RetrieveResult, PipelineError> {
        let resource = resource::parse(filepath)?;
        let url = self.fetch_url(&resource);
        tracing::debug!(%url, "fetching block container");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Http {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        let mime_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?;

        let (_, store) = car::decode(body)?;
        tracing::debug!(blocks = store.len(), bytes = store.byte_size(), "decoded block container");

        let target = unixfs::resolve(&store, &resource.content_id, &resource.pathname)?;
        let chunks = unixfs::cat(&store, &target)?;
        let mode = Base64Mode::from_flag(options.use_multiformat_base64);
        let data = codec::stream_to_text(futures::stream::iter(chunks), mode).await?;

        tracing::info!(%resource, %target, "retrieved file");
        Ok(RetrieveResult { data, mime_type })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;
    use url::Url;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::crypto::Ed25519Signer;
    use crate::unixfs::{DirectoryEncoder, LinkCollector, NamedBlob};

    fn pipeline(gateway: &str) -> RetrievalPipeline {
        let identity = Arc::new(Ed25519Signer::generate().unwrap());
        let config = Configuration::new(identity, Url::parse(gateway).unwrap());
        RetrievalPipeline::new(config).unwrap()
    }

    /// A directory holding `hello.txt` and a multi-chunk `big.bin`.
    fn fixture() -> (crate::linked_data::Cid, Bytes, Vec<u8>) {
        let big: Vec<u8> = (0..10_000u32).map(|i| (i % 256) as u8).collect();
        let dag = DirectoryEncoder::new(1024, 4)
            .encode(
                vec![
                    NamedBlob::new("hello.txt", Bytes::from_static(b"hello")),
                    NamedBlob::new("big.bin", big.clone()),
                ],
                &mut LinkCollector::new(),
            )
            .unwrap();
        (dag.root, dag.to_car().unwrap(), big)
    }

    #[test]
    fn test_fetch_url() {
        let pipeline = pipeline("https://gateway.test/");
        let resource =
            resource::parse("bafybeibxm2nsadl3fnxv2sxcxmxaco2jl53wpeorjdzidjwf5aqdg7wa6u/a/b.txt")
                .unwrap();
        assert_eq!(
            pipeline.fetch_url(&resource),
            "https://gateway.test/ipfs/bafybeibxm2nsadl3fnxv2sxcxmxaco2jl53wpeorjdzidjwf5aqdg7wa6u/a/b.txt?format=car"
        );
    }

    #[tokio::test]
    async fn test_retrieve_standard_and_multiformat() {
        let server = MockServer::start().await;
        let (root, car, _) = fixture();

        Mock::given(method("GET"))
            .and(path(format!("/ipfs/{}/hello.txt", root)))
            .and(query_param("format", "car"))
            .and(header("accept", CAR_MEDIA_TYPE))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/plain")
                    .set_body_bytes(car.to_vec()),
            )
            .mount(&server)
            .await;

        let pipeline = pipeline(&server.uri());
        let filepath = format!("/ipfs/{}/hello.txt", root);

        let plain = pipeline
            .retrieve(&filepath, RetrieveOptions::default())
            .await
            .unwrap();
        assert_eq!(plain.data, "aGVsbG8=");
        assert_eq!(plain.mime_type.as_deref(), Some("text/plain"));

        let multiformat = pipeline
            .retrieve(
                &filepath,
                RetrieveOptions {
                    use_multiformat_base64: true,
                },
            )
            .await
            .unwrap();
        assert!(multiformat.data.starts_with('m'));
        assert_eq!(
            codec::decode_as(&multiformat.data, Base64Mode::Multiformat).unwrap(),
            b"hello"
        );
    }

    #[tokio::test]
    async fn test_retrieve_multi_block_file() {
        let server = MockServer::start().await;
        let (root, car, big) = fixture();

        Mock::given(method("GET"))
            .and(path(format!("/ipfs/{}/big.bin", root)))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(car.to_vec()))
            .mount(&server)
            .await;

        let result = pipeline(&server.uri())
            .retrieve(&format!("{}/big.bin", root), RetrieveOptions::default())
            .await
            .unwrap();
        assert_eq!(
            codec::decode_as(&result.data, Base64Mode::Standard).unwrap(),
            big
        );
        assert!(result.mime_type.is_none());
    }

    #[tokio::test]
    async fn test_retrieve_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = pipeline(&server.uri())
            .retrieve(
                "bafybeibxm2nsadl3fnxv2sxcxmxaco2jl53wpeorjdzidjwf5aqdg7wa6u/missing.txt",
                RetrieveOptions::default(),
            )
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("404"), "{}", message);
        assert!(message.contains("Not Found"), "{}", message);
    }

    #[tokio::test]
    async fn test_retrieve_nonstandard_status_has_reason() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(599))
            .mount(&server)
            .await;

        let err = pipeline(&server.uri())
            .retrieve(
                "bafybeibxm2nsadl3fnxv2sxcxmxaco2jl53wpeorjdzidjwf5aqdg7wa6u/file.txt",
                RetrieveOptions::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "HTTP error 599: Unknown");
    }

    #[tokio::test]
    async fn test_retrieve_rejects_bad_path_before_fetching() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = pipeline(&server.uri())
            .retrieve("no-slash-here", RetrieveOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.name(), "PathParseError");
    }

    #[tokio::test]
    async fn test_retrieve_rejects_garbage_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"<html>oops</html>".to_vec()))
            .mount(&server)
            .await;

        let err = pipeline(&server.uri())
            .retrieve(
                "bafybeibxm2nsadl3fnxv2sxcxmxaco2jl53wpeorjdzidjwf5aqdg7wa6u/a.txt",
                RetrieveOptions::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.name(), "ContentError");
    }

    #[test]
    fn test_result_type_field() {
        let result = RetrieveResult {
            data: "aGVsbG8=".to_string(),
            mime_type: Some("text/plain".to_string()),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["type"], "text/plain");

        let untyped = RetrieveResult {
            data: String::new(),
            mime_type: None,
        };
        assert!(serde_json::to_value(&untyped).unwrap().get("type").is_none());
    }
}
