//! Shared test utilities for pipeline integration tests
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use common::codec::{self, Base64Mode};
use common::crypto::Ed25519Signer;
use common::linked_data::car::CarWriter;
use common::linked_data::{encode_block, DAG_CBOR_CODEC};
use common::prelude::*;
use common::tools::Tools;
use ipld_core::ipld::Ipld;
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A single-block proof archive for `audience`, base64 encoded.
pub fn delegation_text(audience: &str) -> String {
    let mut map = BTreeMap::new();
    map.insert("aud".to_string(), Ipld::String(audience.to_string()));
    let block = serde_ipld_dagcbor::to_vec(&Ipld::Map(map)).unwrap();
    let (cid, block) = encode_block(DAG_CBOR_CODEC, block);

    let mut writer = CarWriter::new(vec![cid]).unwrap();
    writer.write(&cid, &block);
    codec::encode(&writer.finish(), Base64Mode::Standard)
}

/// Tools over a fresh local network, with the gateway pointed at `gateway`.
pub fn setup_tools(gateway: &str) -> (Tools, LocalNetwork, CancellationToken) {
    let identity = Arc::new(Ed25519Signer::generate().unwrap());
    let delegation = common::delegation::parse(&delegation_text("did:key:agent")).unwrap();
    let config = Configuration::new(identity, Url::parse(gateway).unwrap())
        .with_delegation(delegation);

    let network = LocalNetwork::new();
    let shutdown = CancellationToken::new();
    let tools = Tools::new(config, Arc::new(network.clone()), shutdown.clone());
    (tools, network, shutdown)
}

/// Serve `root/name` from `network` on `server` the way a trustless
///  gateway would.
pub async fn serve_from_network(server: &MockServer, network: &LocalNetwork, root: &Cid, name: &str) {
    let export = network.export_car(root, name).unwrap();
    let mut response = ResponseTemplate::new(200).set_body_bytes(export.car.to_vec());
    if let Some(content_type) = export.content_type {
        response = response.insert_header("content-type", content_type.as_str());
    }

    Mock::given(method("GET"))
        .and(path(format!("/ipfs/{}/{}", root, name)))
        .and(query_param("format", "car"))
        .respond_with(response)
        .mount(server)
        .await;
}

pub fn b64(bytes: &[u8]) -> String {
    codec::encode(bytes, Base64Mode::Standard)
}

pub fn unb64(text: &str) -> Bytes {
    Bytes::from(codec::decode(text).unwrap())
}
