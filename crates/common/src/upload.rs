use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};
use tokio_util::sync::CancellationToken;

use crate::codec;
use crate::config::Configuration;
use crate::delegation;
use crate::error::PipelineError;
use crate::linked_data::Cid;
use crate::network::{Session, StorageClient, StorageNetwork, UploadDirectoryOptions};
use crate::piece::{Fr32Sha256Trunc254Padded, PieceHasher};
use crate::unixfs::{canonical_name, LinkCollector, NamedBlob};

pub const DEFAULT_RETRIES: u32 = 3;

/// A file as callers hand it to us: a name and base64 content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadFile {
    pub name: String,
    pub content: String,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub retries: u32,
    /// Attach a piece hasher so the storage network replicates to Filecoin
    pub publish_to_filecoin: bool,
    pub cancel: CancellationToken,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            publish_to_filecoin: false,
            cancel: CancellationToken::new(),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    #[serde_as(as = "DisplayFromStr")]
    pub root: Cid,
    pub url: String,
    #[serde_as(as = "BTreeMap<_, DisplayFromStr>")]
    pub files: BTreeMap<String, Cid>,
}

/// Uploads batches of files as single directories.
///
/// Holds one storage client, opened by [`UploadPipeline::initialize`]
///  and dropped with the pipeline.
pub struct UploadPipeline {
    config: Configuration,
    network: Arc<dyn StorageNetwork>,
    client: Option<Box<dyn StorageClient>>,
}

impl UploadPipeline {
    pub fn new(config: Configuration, network: Arc<dyn StorageNetwork>) -> Self {
        Self {
            config,
            network,
            client: None,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.client.is_some()
    }

    /// Connect to the storage network as the configured identity.
    ///
    /// Fails without touching the network when there is no delegation.
    pub async fn initialize(&mut self) -> Result<(), PipelineError> {
        let delegation = delegation::resolve(None, self.config.delegation.as_ref())?;
        let session = Session::new(self.config.identity.clone(), delegation);

        let client = self.network.connect(session).await?;
        tracing::debug!(agent = %client.agent_did(), "upload client initialized");
        self.client = Some(client);
        Ok(())
    }

    pub async fn upload_files(
        &self,
        files: Vec<UploadFile>,
        options: UploadOptions,
    ) -> Result<UploadResult, PipelineError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(PipelineError::not_initialized)?;
        if options.cancel.is_cancelled() {
            return Err(PipelineError::Aborted);
        }

        let mut requested = HashSet::with_capacity(files.len());
        let mut blobs = Vec::with_capacity(files.len());
        for file in files {
            let bytes = codec::decode(&file.content)?;
            if bytes.len() > self.config.max_file_size {
                return Err(PipelineError::Format(format!(
                    "{} is {} bytes, over the {} byte limit",
                    file.name,
                    bytes.len(),
                    self.config.max_file_size
                )));
            }
            if let Some(name) = canonical_name(&file.name) {
                requested.insert(name);
            }
            tracing::debug!(name = %file.name, size = bytes.len(), "decoded upload file");
            blobs.push(NamedBlob::new(file.name, bytes));
        }

        let directory_options = UploadDirectoryOptions {
            retries: options.retries,
            piece_hasher: options
                .publish_to_filecoin
                .then(|| Arc::new(Fr32Sha256Trunc254Padded) as Arc<dyn PieceHasher>),
            cancel: options.cancel.clone(),
        };

        let mut links = LinkCollector::new();
        let root = client
            .upload_directory(blobs, directory_options, &mut links)
            .await?;

        // only entries the network reported as linked make it into the map
        let files: BTreeMap<String, Cid> = links
            .drain()
            .filter(|link| requested.contains(&link.name))
            .map(|link| (link.name, link.cid))
            .collect();

        let url = format!("{}/ipfs/{}", self.config.gateway_base(), root);
        tracing::info!(%root, files = files.len(), "upload complete");
        Ok(UploadResult { root, url, files })
    }
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;
    use crate::codec::Base64Mode;
    use crate::crypto::Ed25519Signer;
    use crate::delegation::{tests::sample_archive, Delegation};
    use crate::network::LocalNetwork;

    fn config(with_delegation: bool) -> Configuration {
        let identity = Arc::new(Ed25519Signer::generate().unwrap());
        let config = Configuration::new(identity, Url::parse("https://gateway.test/").unwrap());
        if with_delegation {
            config.with_delegation(Delegation::from_archive(sample_archive("did:key:x")).unwrap())
        } else {
            config
        }
    }

    fn file(name: &str, content: &[u8]) -> UploadFile {
        UploadFile::new(name, codec::encode(content, Base64Mode::Standard))
    }

    #[tokio::test]
    async fn test_upload_two_files() {
        let network = LocalNetwork::new();
        let mut pipeline = UploadPipeline::new(config(true), Arc::new(network.clone()));
        pipeline.initialize().await.unwrap();

        let result = pipeline
            .upload_files(
                vec![file("a.txt", b"alpha"), file("b.txt", b"beta")],
                UploadOptions::default(),
            )
            .await
            .unwrap();

        let keys: Vec<&String> = result.files.keys().collect();
        assert_eq!(keys, vec!["a.txt", "b.txt"]);
        assert_ne!(result.files["a.txt"], result.files["b.txt"]);
        assert_ne!(result.files["a.txt"], result.root);
        assert_eq!(result.url, format!("https://gateway.test/ipfs/{}", result.root));
        assert_eq!(network.uploads().len(), 1);
    }

    #[tokio::test]
    async fn test_uninitialized_pipeline() {
        let network = LocalNetwork::new();
        let pipeline = UploadPipeline::new(config(true), Arc::new(network.clone()));
        let err = pipeline
            .upload_files(vec![file("a.txt", b"alpha")], UploadOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "client not initialized");
        assert_eq!(network.store_calls(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_upload_makes_no_network_calls() {
        let network = LocalNetwork::new();
        let mut pipeline = UploadPipeline::new(config(true), Arc::new(network.clone()));
        pipeline.initialize().await.unwrap();

        let options = UploadOptions::default();
        options.cancel.cancel();
        let err = pipeline
            .upload_files(vec![file("a.txt", b"alpha")], options)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Aborted));
        assert_eq!(network.store_calls(), 0);
    }

    #[tokio::test]
    async fn test_initialize_without_delegation() {
        let network = LocalNetwork::new();
        let mut pipeline = UploadPipeline::new(config(false), Arc::new(network.clone()));
        let err = pipeline.initialize().await.unwrap_err();
        assert_eq!(err.to_string(), "delegation required");
        assert_eq!(network.connections(), 0);
        assert!(!pipeline.is_initialized());
    }

    #[tokio::test]
    async fn test_invalid_content_is_format_error() {
        let network = LocalNetwork::new();
        let mut pipeline = UploadPipeline::new(config(true), Arc::new(network.clone()));
        pipeline.initialize().await.unwrap();

        let err = pipeline
            .upload_files(
                vec![UploadFile::new("a.txt", "not base64!!")],
                UploadOptions::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.name(), "FormatError");
        assert_eq!(network.store_calls(), 0);
    }

    #[tokio::test]
    async fn test_oversized_file_rejected() {
        let network = LocalNetwork::new();
        let mut pipeline = UploadPipeline::new(
            config(true).with_max_file_size(4),
            Arc::new(network.clone()),
        );
        pipeline.initialize().await.unwrap();

        let err = pipeline
            .upload_files(vec![file("a.txt", b"alpha")], UploadOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.name(), "FormatError");
        assert!(err.to_string().contains("a.txt"));
        assert_eq!(network.store_calls(), 0);
    }

    #[tokio::test]
    async fn test_transport_failure_propagates_unchanged() {
        let network = LocalNetwork::new();
        network.fail_next(10);
        let mut pipeline = UploadPipeline::new(config(true), Arc::new(network.clone()));
        pipeline.initialize().await.unwrap();

        let options = UploadOptions {
            retries: 0,
            ..Default::default()
        };
        let err = pipeline
            .upload_files(vec![file("a.txt", b"alpha")], options)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Transport(_)));
        assert_eq!(err.to_string(), "connection reset by storage node");
    }

    #[tokio::test]
    async fn test_publish_to_filecoin_keeps_cids() {
        let network = LocalNetwork::new();
        let mut pipeline = UploadPipeline::new(config(true), Arc::new(network.clone()));
        pipeline.initialize().await.unwrap();

        let private = pipeline
            .upload_files(vec![file("a.txt", b"alpha")], UploadOptions::default())
            .await
            .unwrap();
        let public = pipeline
            .upload_files(
                vec![file("a.txt", b"alpha")],
                UploadOptions {
                    publish_to_filecoin: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(private, public);
        let uploads = network.uploads();
        assert!(uploads[0].piece.is_none());
        assert!(uploads[1].piece.is_some());
    }

    /// Links only the names it was told to, plus a directory nobody asked for.
    #[derive(Debug)]
    struct PartialLinks {
        linked: Vec<&'static str>,
    }

    struct PartialClient {
        linked: Vec<&'static str>,
    }

    #[async_trait::async_trait]
    impl StorageNetwork for PartialLinks {
        async fn connect(
            &self,
            _session: Session,
        ) -> Result<Box<dyn StorageClient>, crate::network::NetworkError> {
            Ok(Box::new(PartialClient {
                linked: self.linked.clone(),
            }))
        }
    }

    #[async_trait::async_trait]
    impl StorageClient for PartialClient {
        fn agent_did(&self) -> String {
            "did:key:partial".to_string()
        }

        async fn upload_directory(
            &self,
            files: Vec<NamedBlob>,
            _options: UploadDirectoryOptions,
            visitor: &mut dyn crate::unixfs::LinkVisitor,
        ) -> Result<Cid, crate::network::NetworkError> {
            use crate::linked_data::{block_cid, DAG_PB_CODEC, RAW_CODEC};
            use crate::unixfs::DirectoryEntryLink;

            for name in &self.linked {
                visitor.visit(DirectoryEntryLink {
                    name: name.to_string(),
                    cid: block_cid(RAW_CODEC, name.as_bytes()),
                    dag_byte_length: 1,
                });
            }
            visitor.visit(DirectoryEntryLink {
                name: "nested".to_string(),
                cid: block_cid(DAG_PB_CODEC, b"nested"),
                dag_byte_length: 1,
            });
            Ok(block_cid(DAG_PB_CODEC, &[files.len() as u8]))
        }
    }

    #[tokio::test]
    async fn test_unlinked_files_are_absent() {
        let network = PartialLinks {
            linked: vec!["a.txt", "nested/c.txt"],
        };
        let mut pipeline = UploadPipeline::new(config(true), Arc::new(network));
        pipeline.initialize().await.unwrap();

        let result = pipeline
            .upload_files(
                vec![
                    file("a.txt", b"alpha"),
                    file("b.txt", b"beta"),
                    file("nested/c.txt", b"gamma"),
                ],
                UploadOptions::default(),
            )
            .await
            .unwrap();

        let keys: Vec<&String> = result.files.keys().collect();
        assert_eq!(keys, vec!["a.txt", "nested/c.txt"]);
        assert!(!result.files.contains_key("b.txt"));
        assert!(!result.files.contains_key("nested"));
        assert_eq!(
            result.files["a.txt"],
            crate::linked_data::block_cid(crate::linked_data::RAW_CODEC, b"a.txt")
        );
    }

    #[test]
    fn test_result_serializes_cids_as_strings() {
        let root = crate::linked_data::block_cid(crate::linked_data::DAG_PB_CODEC, b"root");
        let file = crate::linked_data::block_cid(crate::linked_data::RAW_CODEC, b"a");
        let result = UploadResult {
            root,
            url: format!("https://gateway.test/ipfs/{}", root),
            files: BTreeMap::from([("a.txt".to_string(), file)]),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["root"], root.to_string());
        assert_eq!(json["files"]["a.txt"], file.to_string());

        let back: UploadResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
    }
}
