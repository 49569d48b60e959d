use std::path::PathBuf;

use clap::Args;

use common::codec::{self, Base64Mode, CodecError};
use w3s_daemon::http_server::api::client::ApiError;
use w3s_daemon::http_server::api::v0::retrieve::RetrieveRequest;

#[derive(Args, Debug, Clone)]
pub struct Retrieve {
    /// `CID/path`, `/ipfs/CID/path` or `ipfs://CID/path`
    pub filepath: String,

    /// Print self-describing (multibase) base64
    #[arg(long)]
    pub multiformat: bool,

    /// Write the decoded bytes here instead of printing base64
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum RetrieveError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("daemon returned undecodable data: {0}")]
    Decode(#[from] CodecError),
    #[error("failed to write {0:?}: {1}")]
    Write(PathBuf, std::io::Error),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Retrieve {
    type Error = RetrieveError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let request = RetrieveRequest {
            filepath: self.filepath.clone(),
            use_multiformat_base64: self.multiformat.then_some(true),
        };
        let result = ctx.client.call(request).await?;

        let Some(output) = &self.output else {
            return Ok(result.data);
        };

        let bytes = codec::decode_as(&result.data, Base64Mode::from_flag(self.multiformat))?;
        tokio::fs::write(output, &bytes)
            .await
            .map_err(|e| RetrieveError::Write(output.clone(), e))?;
        Ok(format!(
            "wrote {} bytes to {} ({})",
            bytes.len(),
            output.display(),
            result.mime_type.as_deref().unwrap_or("unknown type")
        ))
    }
}
