//! The operations exposed to callers: `upload`, `retrieve` and `identity`.
//!
//! Each call builds its own pipeline from the shared configuration plus
//!  whatever the request overrides.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::config::{Configuration, Overrides};
use crate::error::PipelineError;
use crate::network::StorageNetwork;
use crate::retrieve::{RetrievalPipeline, RetrieveOptions, RetrieveResult};
use crate::upload::{UploadFile, UploadOptions, UploadPipeline, UploadResult, DEFAULT_RETRIES};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadArgs {
    /// Base64 file content
    pub file: String,
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_to_filecoin: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrieveArgs {
    pub filepath: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_multiformat_base64: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityResult {
    pub id: String,
}

#[derive(Debug, Clone)]
pub struct Tools {
    config: Configuration,
    network: Arc<dyn StorageNetwork>,
    shutdown: CancellationToken,
}

impl Tools {
    /// `shutdown` aborts every upload still running when it fires.
    pub fn new(
        config: Configuration,
        network: Arc<dyn StorageNetwork>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            config,
            network,
            shutdown,
        }
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub async fn upload(&self, args: UploadArgs) -> Result<UploadResult, PipelineError> {
        let cancel = self.shutdown.child_token();
        if cancel.is_cancelled() {
            return Err(PipelineError::Aborted);
        }

        let config = self.config.with_overrides(&Overrides {
            delegation: args.delegation,
            gateway_url: args.gateway_url,
        })?;
        if let Some(mime_type) = &args.mime_type {
            tracing::debug!(name = %args.name, %mime_type, "upload declared a type");
        }

        let mut pipeline = UploadPipeline::new(config, self.network.clone());
        pipeline.initialize().await?;
        pipeline
            .upload_files(
                vec![UploadFile::new(args.name, args.file)],
                UploadOptions {
                    retries: DEFAULT_RETRIES,
                    publish_to_filecoin: args.publish_to_filecoin.unwrap_or(false),
                    cancel,
                },
            )
            .await
    }

    pub async fn retrieve(&self, args: RetrieveArgs) -> Result<RetrieveResult, PipelineError> {
        let pipeline = RetrievalPipeline::new(self.config.clone())?;
        pipeline
            .retrieve(
                &args.filepath,
                RetrieveOptions {
                    use_multiformat_base64: args.use_multiformat_base64.unwrap_or(false),
                },
            )
            .await
    }

    pub fn identity(&self) -> IdentityResult {
        IdentityResult {
            id: self.config.identity.did(),
        }
    }
}
