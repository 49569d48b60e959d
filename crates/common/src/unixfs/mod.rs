mod builder;
mod exporter;
pub mod pb;

pub use builder::{
    canonical_name, DirectoryEncoder, DirectoryEntryLink, EncodedDag, LinkCollector, LinkVisitor,
    NamedBlob, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_CHILDREN,
};
pub use exporter::{cat, collect_dag, resolve, resolve_traced, FileChunks};

use crate::linked_data::{BlockstoreError, CarError, Cid};

#[derive(Debug, thiserror::Error)]
pub enum UnixFsError {
    #[error("invalid dag-pb: {0}")]
    Decode(String),
    #[error(transparent)]
    Blockstore(#[from] BlockstoreError),
    #[error(transparent)]
    Car(#[from] CarError),
    #[error("file does not exist: {0}")]
    NotFound(String),
    #[error("not a directory: {0}")]
    NotADirectory(Cid),
    #[error("not a file: {0}")]
    NotAFile(Cid),
    #[error("unsupported codec 0x{0:x}")]
    UnsupportedCodec(u64),
    #[error("invalid entry name: {0:?}")]
    InvalidName(String),
}
