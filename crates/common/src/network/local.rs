use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;

use super::{NetworkError, Session, StorageClient, StorageNetwork, UploadDirectoryOptions};
use crate::linked_data::car::CarWriter;
use crate::linked_data::{Cid, MemoryBlockstore};
use crate::piece::PieceCommitment;
use crate::unixfs::{
    self, DirectoryEncoder, EncodedDag, LinkCollector, LinkVisitor, NamedBlob, UnixFsError,
};

/// Base delay between write attempts, multiplied by the attempt number
const RETRY_BACKOFF: Duration = Duration::from_millis(25);

/// One accepted upload.
#[derive(Debug, Clone)]
pub struct UploadRecord {
    pub root: Cid,
    pub agent: String,
    pub piece: Option<PieceCommitment>,
    pub blocks: usize,
    pub bytes: usize,
}

/// What the gateway hands back for `root/path`.
#[derive(Debug, Clone)]
pub struct GatewayExport {
    /// Block container rooted at the requested root, holding the path
    ///  walk and the whole target DAG
    pub car: Bytes,
    pub target: Cid,
    pub content_type: Option<String>,
}

#[derive(Debug, Default)]
struct LocalNetworkInner {
    blocks: RwLock<MemoryBlockstore>,
    uploads: RwLock<Vec<UploadRecord>>,
    connections: AtomicUsize,
    store_calls: AtomicUsize,
    fail_next: AtomicUsize,
    encoder: DirectoryEncoder,
}

/// A storage network that lives in this process.
///
/// Blocks written by any client are visible to [`LocalNetwork::export_car`],
///  which backs the daemon's gateway.
#[derive(Debug, Clone, Default)]
pub struct LocalNetwork {
    inner: Arc<LocalNetworkInner>,
}

impl LocalNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_encoder(encoder: DirectoryEncoder) -> Self {
        Self {
            inner: Arc::new(LocalNetworkInner {
                encoder,
                ..Default::default()
            }),
        }
    }

    /// Fail the next `count` block writes with a transport error.
    pub fn fail_next(&self, count: usize) {
        self.inner.fail_next.store(count, Ordering::SeqCst);
    }

    /// Number of clients that have connected
    pub fn connections(&self) -> usize {
        self.inner.connections.load(Ordering::SeqCst)
    }

    /// Number of block writes attempted, failed ones included
    pub fn store_calls(&self) -> usize {
        self.inner.store_calls.load(Ordering::SeqCst)
    }

    pub fn uploads(&self) -> Vec<UploadRecord> {
        self.inner.uploads.read().clone()
    }

    pub fn has_block(&self, cid: &Cid) -> bool {
        self.inner.blocks.read().has(cid)
    }

    /// Export `root/path` the way a trustless gateway would.
    pub fn export_car(&self, root: &Cid, path: &str) -> Result<GatewayExport, UnixFsError> {
        let store = self.inner.blocks.read();

        let mut trace = Vec::new();
        let target = unixfs::resolve_traced(&store, root, path, &mut trace)?;
        let mut dag = Vec::new();
        unixfs::collect_dag(&store, &target, &mut dag)?;

        let mut writer = CarWriter::new(vec![*root])?;
        for cid in trace.iter().chain(dag.iter()) {
            writer.write(cid, store.get(cid)?);
        }

        let content_type = path
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .and_then(|name| mime_guess::from_path(name).first())
            .map(|mime| mime.essence_str().to_string());

        Ok(GatewayExport {
            car: writer.finish(),
            target,
            content_type,
        })
    }

    fn take_injected_failure(&self) -> bool {
        self.inner
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn store(&self, dag: &EncodedDag) -> Result<(), NetworkError> {
        self.inner.store_calls.fetch_add(1, Ordering::SeqCst);
        if self.take_injected_failure() {
            return Err(NetworkError::Transport(
                "connection reset by storage node".to_string(),
            ));
        }

        // verify everything before any block becomes visible
        let mut staged = MemoryBlockstore::new();
        for (cid, data) in &dag.blocks {
            staged
                .put(*cid, data.clone())
                .map_err(|e| NetworkError::Other(e.into()))?;
        }
        self.inner.blocks.write().extend(staged);
        Ok(())
    }
}

#[async_trait]
impl StorageNetwork for LocalNetwork {
    async fn connect(&self, session: Session) -> Result<Box<dyn StorageClient>, NetworkError> {
        if session.proofs.is_empty() {
            return Err(NetworkError::Unauthorized(
                "no proofs presented for this agent".to_string(),
            ));
        }
        self.inner.connections.fetch_add(1, Ordering::SeqCst);

        let agent = session.agent.did();
        tracing::debug!(%agent, proofs = session.proofs.len(), "client connected");
        Ok(Box::new(LocalClient {
            network: self.clone(),
            agent,
        }))
    }
}

struct LocalClient {
    network: LocalNetwork,
    agent: String,
}

#[async_trait]
impl StorageClient for LocalClient {
    fn agent_did(&self) -> String {
        self.agent.clone()
    }

    async fn upload_directory(
        &self,
        files: Vec<NamedBlob>,
        options: UploadDirectoryOptions,
        visitor: &mut dyn LinkVisitor,
    ) -> Result<Cid, NetworkError> {
        if options.cancel.is_cancelled() {
            return Err(NetworkError::Aborted);
        }

        let mut links = LinkCollector::new();
        let dag = self
            .network
            .inner
            .encoder
            .encode(files, &mut links)
            .map_err(|e| NetworkError::Other(e.into()))?;

        let piece = match &options.piece_hasher {
            Some(hasher) => {
                let car = dag.to_car().map_err(|e| NetworkError::Other(e.into()))?;
                let piece = hasher
                    .digest(&car)
                    .map_err(|e| NetworkError::Other(e.into()))?;
                tracing::debug!(hasher = hasher.name(), piece = %piece.cid, "computed piece");
                Some(piece)
            }
            None => None,
        };

        let mut attempt = 0;
        loop {
            if options.cancel.is_cancelled() {
                return Err(NetworkError::Aborted);
            }
            match self.network.store(&dag) {
                Ok(()) => break,
                Err(e) if attempt < options.retries => {
                    attempt += 1;
                    tracing::warn!(root = %dag.root, attempt, "block write failed, retrying: {}", e);
                    tokio::select! {
                        _ = options.cancel.cancelled() => return Err(NetworkError::Aborted),
                        _ = tokio::time::sleep(RETRY_BACKOFF * attempt) => {}
                    }
                }
                Err(e) => return Err(e),
            }
        }

        self.network.inner.uploads.write().push(UploadRecord {
            root: dag.root,
            agent: self.agent.clone(),
            piece,
            blocks: dag.blocks.len(),
            bytes: dag.byte_size(),
        });

        for link in links.drain() {
            visitor.visit(link);
        }
        Ok(dag.root)
    }
}
