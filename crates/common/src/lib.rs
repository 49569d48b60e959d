/**
 * Dual-mode base64 transcoding shared by the
 *  upload and retrieval pipelines.
 */
pub mod codec;
/**
 * Process-wide default configuration and
 *  per-call overrides.
 */
pub mod config;
/**
 * Signing identity of the agent talking to
 *  the storage network.
 */
pub mod crypto;
/**
 * Capability proofs handed to us by callers
 *  or by the environment.
 */
pub mod delegation;
/**
 * The error taxonomy every pipeline boundary
 *  normalizes into.
 */
pub mod error;
/**
 * Content identifiers, block verification, the
 *  block container format and an in-memory
 *  block store.
 */
pub mod linked_data;
/**
 * Storage network abstraction plus a local
 *  in-memory network.
 */
pub mod network;
/**
 * Filecoin piece commitment hashing.
 */
pub mod piece;
/**
 * Resource locator parsing: `CID/path` and
 *  its prefixed variants.
 */
pub mod resource;
/**
 * Gateway fetch, block container decode and
 *  DAG walk back to file bytes.
 */
pub mod retrieve;
/**
 * Caller-facing operations (upload, retrieve,
 *  identity) over the pipelines.
 */
pub mod tools;
/**
 * UnixFS encoding and export over dag-pb.
 */
pub mod unixfs;
/**
 * Batch upload into one content-addressed
 *  directory.
 */
pub mod upload;
/**
 * Build version information captured
 *  at compile time.
 */
pub mod version;

pub mod prelude {
    pub use crate::codec::Base64Mode;
    pub use crate::config::{Configuration, Overrides};
    pub use crate::crypto::{Ed25519Signer, Identity};
    pub use crate::delegation::Delegation;
    pub use crate::error::{ErrorEnvelope, PipelineError};
    pub use crate::linked_data::{multibase, Cid, MemoryBlockstore};
    pub use crate::network::{LocalNetwork, StorageClient, StorageNetwork};
    pub use crate::resource::Resource;
    pub use crate::retrieve::{RetrievalPipeline, RetrieveOptions, RetrieveResult};
    pub use crate::tools::Tools;
    pub use crate::upload::{UploadFile, UploadOptions, UploadPipeline, UploadResult};
    pub use crate::version::build_info;
}
