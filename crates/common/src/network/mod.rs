use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::crypto::Identity;
use crate::delegation::Delegation;
use crate::linked_data::Cid;
use crate::piece::PieceHasher;
use crate::unixfs::{LinkVisitor, NamedBlob};

mod local;

pub use local::{GatewayExport, LocalNetwork, UploadRecord};

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// Carried back to the caller word for word
    #[error("{0}")]
    Transport(String),
    #[error("upload aborted")]
    Aborted,
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Who is talking to the network and on whose authority.
#[derive(Debug, Clone)]
pub struct Session {
    pub agent: Arc<dyn Identity>,
    pub proofs: Vec<Delegation>,
}

impl Session {
    pub fn new(agent: Arc<dyn Identity>, proof: Delegation) -> Self {
        Self {
            agent,
            proofs: vec![proof],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct UploadDirectoryOptions {
    /// Extra attempts at the block write after the first one fails
    pub retries: u32,
    /// Set when the upload should be replicated to Filecoin
    pub piece_hasher: Option<Arc<dyn PieceHasher>>,
    pub cancel: CancellationToken,
}

/// A storage network clients can connect to.
#[async_trait]
pub trait StorageNetwork: Send + Sync + Debug + 'static {
    /// Open a client bound to `session`. Clients are not pooled; each
    ///  pipeline call connects on its own.
    async fn connect(&self, session: Session) -> Result<Box<dyn StorageClient>, NetworkError>;
}

#[async_trait]
pub trait StorageClient: Send + Sync {
    fn agent_did(&self) -> String;

    /// Store `files` as one directory and return its root.
    ///
    /// `visitor` sees one event per entry that was durably linked, after
    ///  the write has been accepted. Nothing is reported for a failed
    ///  upload.
    async fn upload_directory(
        &self,
        files: Vec<NamedBlob>,
        options: UploadDirectoryOptions,
        visitor: &mut dyn LinkVisitor,
    ) -> Result<Cid, NetworkError>;
}
