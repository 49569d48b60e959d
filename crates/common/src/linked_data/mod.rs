use bytes::Bytes;
use multihash::Multihash;
use sha2::{Digest, Sha256};

mod blockstore;
pub mod car;
pub mod varint;

pub use blockstore::{BlockstoreError, MemoryBlockstore};
pub use car::CarError;
pub use cid::multibase;
pub use cid::Cid;
pub use cid::Error as CidError;

/// Multicodec for raw bytes
pub const RAW_CODEC: u64 = 0x55;
/// Multicodec for dag-pb (UnixFS)
pub const DAG_PB_CODEC: u64 = 0x70;
/// Multicodec for dag-cbor
pub const DAG_CBOR_CODEC: u64 = 0x71;
/// Multicodec for a block container archive
pub const CAR_CODEC: u64 = 0x0202;

/// Multihash code for the identity "hash"
pub const IDENTITY_CODE: u64 = 0x00;
/// Multihash code for sha2-256
pub const SHA2_256_CODE: u64 = 0x12;

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("block {cid} does not match its hash")]
    HashMismatch { cid: Cid },
    #[error("block {cid} uses unsupported multihash 0x{code:x}")]
    UnsupportedHash { cid: Cid, code: u64 },
}

/// Hash `data` with sha2-256 and wrap it in a CIDv1 of the given codec.
pub fn block_cid(codec: u64, data: &[u8]) -> Cid {
    let digest = Sha256::digest(data);
    let hash = Multihash::<64>::wrap(SHA2_256_CODE, &digest)
        .expect("sha2-256 digest fits in a 64 byte multihash");
    Cid::new_v1(codec, hash)
}

/// Hash `data` and return both the CID and the block as `Bytes`.
pub fn encode_block(codec: u64, data: impl Into<Bytes>) -> (Cid, Bytes) {
    let data = data.into();
    (block_cid(codec, &data), data)
}

/// Check that `data` is what `cid` says it is.
pub fn verify_block(cid: &Cid, data: &[u8]) -> Result<(), VerifyError> {
    let hash = cid.hash();
    let matches = match hash.code() {
        SHA2_256_CODE => Sha256::digest(data).as_slice() == hash.digest(),
        IDENTITY_CODE => hash.digest() == data,
        code => {
            return Err(VerifyError::UnsupportedHash { cid: *cid, code });
        }
    };

    if matches {
        Ok(())
    } else {
        Err(VerifyError::HashMismatch { cid: *cid })
    }
}
