//! Filecoin piece commitments.
//!
//! A piece is the payload zero-extended to a power-of-two friendly size,
//!  expanded with FR32 padding (two zero bits after every 254 bits) and
//!  folded into a binary SHA2-256 merkle tree whose nodes have their top
//!  two bits cleared.

use std::fmt;

use multihash::Multihash;
use sha2::{Digest, Sha256};

use crate::linked_data::Cid;

/// fil-commitment-unsealed
pub const FIL_COMMITMENT_UNSEALED: u64 = 0xf101;
/// sha2-256-trunc254-padded
pub const SHA2_256_TRUNC254_PADDED: u64 = 0x1012;

const NODE_SIZE: usize = 32;
const MIN_PADDED_SIZE: u64 = 128;
/// Largest sector size the network accepts, 64 GiB
const MAX_PADDED_SIZE: u64 = 1 << 36;

#[derive(Debug, thiserror::Error)]
pub enum PieceError {
    #[error("payload of {0} bytes does not fit in a piece")]
    PayloadTooLarge(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PieceCommitment {
    pub cid: Cid,
    pub payload_size: u64,
    pub padded_size: u64,
}

/// Strategy attached to a store request to derive its piece commitment.
pub trait PieceHasher: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn digest(&self, payload: &[u8]) -> Result<PieceCommitment, PieceError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Fr32Sha256Trunc254Padded;

impl PieceHasher for Fr32Sha256Trunc254Padded {
    fn name(&self) -> &'static str {
        "fr32-sha2-256-trunc254-padded"
    }

    fn digest(&self, payload: &[u8]) -> Result<PieceCommitment, PieceError> {
        let payload_size = payload.len() as u64;
        let padded_size = padded_size(payload_size)?;

        let unpadded_size = (padded_size / 128 * 127) as usize;
        let mut unpadded = Vec::with_capacity(unpadded_size);
        unpadded.extend_from_slice(payload);
        unpadded.resize(unpadded_size, 0);

        let mut padded = vec![0u8; padded_size as usize];
        fr32_pad(&unpadded, &mut padded);

        let root = merkle_root(&padded);
        let hash = Multihash::<64>::wrap(SHA2_256_TRUNC254_PADDED, &root)
            .map_err(|_| PieceError::PayloadTooLarge(payload_size))?;

        Ok(PieceCommitment {
            cid: Cid::new_v1(FIL_COMMITMENT_UNSEALED, hash),
            payload_size,
            padded_size,
        })
    }
}

/// Smallest power-of-two piece whose FR32 capacity holds `payload_size`.
pub fn padded_size(payload_size: u64) -> Result<u64, PieceError> {
    let mut size = MIN_PADDED_SIZE;
    while size / 128 * 127 < payload_size {
        size <<= 1;
        if size > MAX_PADDED_SIZE {
            return Err(PieceError::PayloadTooLarge(payload_size));
        }
    }
    Ok(size)
}

/// Expand every 127 input bytes into 128 output bytes, inserting two
///  zero bits after each 254 bit quad.
fn fr32_pad(input: &[u8], out: &mut [u8]) {
    for (input, out) in input.chunks_exact(127).zip(out.chunks_exact_mut(128)) {
        out[..31].copy_from_slice(&input[..31]);

        let mut t = input[31] >> 6;
        out[31] = input[31] & 0x3f;
        let mut v = 0u8;

        for i in 32..64 {
            v = input[i];
            out[i] = (v << 2) | t;
            t = v >> 6;
        }

        t = v >> 4;
        out[63] &= 0x3f;

        for i in 64..96 {
            v = input[i];
            out[i] = (v << 4) | t;
            t = v >> 4;
        }

        t = v >> 2;
        out[95] &= 0x3f;

        for i in 96..127 {
            v = input[i];
            out[i] = (v << 6) | t;
            t = v >> 2;
        }

        out[127] = t & 0x3f;
    }
}

fn hash_pair(left: &[u8], right: &[u8]) -> [u8; NODE_SIZE] {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    let mut node: [u8; NODE_SIZE] = hasher.finalize().into();
    node[NODE_SIZE - 1] &= 0x3f;
    node
}

/// `leaves` must be a power-of-two number of 32 byte nodes.
fn merkle_root(leaves: &[u8]) -> [u8; NODE_SIZE] {
    let mut layer: Vec<[u8; NODE_SIZE]> = leaves
        .chunks_exact(2 * NODE_SIZE)
        .map(|pair| hash_pair(&pair[..NODE_SIZE], &pair[NODE_SIZE..]))
        .collect();

    while layer.len() > 1 {
        layer = layer
            .chunks_exact(2)
            .map(|pair| hash_pair(&pair[0], &pair[1]))
            .collect();
    }

    layer.first().copied().unwrap_or([0u8; NODE_SIZE])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded_size() {
        assert_eq!(padded_size(0).unwrap(), 128);
        assert_eq!(padded_size(1).unwrap(), 128);
        assert_eq!(padded_size(127).unwrap(), 128);
        assert_eq!(padded_size(128).unwrap(), 256);
        assert_eq!(padded_size(254).unwrap(), 256);
        assert_eq!(padded_size(255).unwrap(), 512);
        assert!(padded_size(u64::MAX).is_err());
    }

    #[test]
    fn test_fr32_pad_preserves_bits() {
        let input = [0xffu8; 127];
        let mut out = [0u8; 128];
        fr32_pad(&input, &mut out);

        let ones: u32 = out.iter().map(|b| b.count_ones()).sum();
        assert_eq!(ones, 127 * 8);
        for quad in out.chunks_exact(NODE_SIZE) {
            assert_eq!(quad[NODE_SIZE - 1] & 0xc0, 0);
        }
        assert!(out[..31].iter().all(|b| *b == 0xff));
    }

    #[test]
    fn test_zero_piece_matches_manual_tree() {
        let commitment = Fr32Sha256Trunc254Padded.digest(&[0u8; 100]).unwrap();
        assert_eq!(commitment.padded_size, 128);
        assert_eq!(commitment.payload_size, 100);

        let zero = [0u8; NODE_SIZE];
        let level1 = hash_pair(&zero, &zero);
        let root = hash_pair(&level1, &level1);
        assert_eq!(commitment.cid.hash().digest(), &root);
        assert_eq!(commitment.cid.codec(), FIL_COMMITMENT_UNSEALED);
        assert_eq!(commitment.cid.hash().code(), SHA2_256_TRUNC254_PADDED);
    }

    #[test]
    fn test_commitment_depends_on_content() {
        let a = Fr32Sha256Trunc254Padded.digest(b"hello piece").unwrap();
        let b = Fr32Sha256Trunc254Padded.digest(b"hello piece!").unwrap();
        let c = Fr32Sha256Trunc254Padded.digest(b"hello piece").unwrap();
        assert_ne!(a.cid, b.cid);
        assert_eq!(a, c);
    }

    #[test]
    fn test_multi_chunk_payload() {
        let payload: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
        let commitment = Fr32Sha256Trunc254Padded.digest(&payload).unwrap();
        assert_eq!(commitment.padded_size, 1024);
        assert_eq!(commitment.cid.hash().digest()[NODE_SIZE - 1] & 0xc0, 0);
    }
}
