use std::fmt::Write;
use std::path::PathBuf;

use clap::Args;

use common::codec::{self, Base64Mode};
use common::prelude::UploadResult;
use w3s_daemon::http_server::api::client::ApiError;
use w3s_daemon::http_server::api::v0::upload::UploadRequest;

#[derive(Args, Debug, Clone)]
pub struct Upload {
    /// File to upload
    pub path: PathBuf,

    /// Name to store the file under (defaults to the file name)
    #[arg(long)]
    pub name: Option<String>,

    /// Delegation to upload with instead of the daemon's default
    #[arg(long)]
    pub delegation: Option<String>,

    /// Gateway to build the returned link from
    #[arg(long)]
    pub gateway_url: Option<String>,

    /// Ask the storage network to replicate the upload to Filecoin
    #[arg(long)]
    pub publish_to_filecoin: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("failed to read {0:?}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("cannot derive a name from {0:?}, pass --name")]
    NoName(PathBuf),
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl Upload {
    fn request(&self, bytes: &[u8]) -> Result<UploadRequest, UploadError> {
        let name = match &self.name {
            Some(name) => name.clone(),
            None => self
                .path
                .file_name()
                .and_then(|name| name.to_str())
                .map(str::to_string)
                .ok_or_else(|| UploadError::NoName(self.path.clone()))?,
        };
        let mime_type = mime_guess::from_path(&name)
            .first()
            .map(|mime| mime.essence_str().to_string());

        Ok(UploadRequest {
            file: codec::encode(bytes, Base64Mode::Standard),
            name,
            mime_type,
            delegation: self.delegation.clone(),
            gateway_url: self.gateway_url.clone(),
            publish_to_filecoin: self.publish_to_filecoin.then_some(true),
        })
    }
}

fn render(result: &UploadResult) -> String {
    let mut out = format!("root: {}\nurl:  {}", result.root, result.url);
    for (name, cid) in &result.files {
        let _ = write!(out, "\n  {}  {}", cid, name);
    }
    out
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Upload {
    type Error = UploadError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| UploadError::Read(self.path.clone(), e))?;
        let request = self.request(&bytes)?;

        let result = ctx.client.call(request).await?;
        Ok(render(&result))
    }
}
