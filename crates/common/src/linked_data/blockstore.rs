use std::collections::HashMap;

use bytes::Bytes;

use super::{verify_block, Cid, VerifyError};

#[derive(Debug, thiserror::Error)]
pub enum BlockstoreError {
    #[error("block not found: {0}")]
    NotFound(Cid),
    #[error(transparent)]
    Verify(#[from] VerifyError),
}

/// Random-access block store keyed by CID, held entirely in memory.
///
/// Blocks are verified against their CID on the way in, so anything
///  read back out can be trusted without re-hashing.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlockstore {
    blocks: HashMap<Cid, Bytes>,
}

impl MemoryBlockstore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Verify and insert a block. Re-inserting a block is a no-op.
    pub fn put(&mut self, cid: Cid, data: Bytes) -> Result<(), BlockstoreError> {
        if self.blocks.contains_key(&cid) {
            return Ok(());
        }
        verify_block(&cid, &data)?;
        self.blocks.insert(cid, data);
        Ok(())
    }

    pub fn get(&self, cid: &Cid) -> Result<&Bytes, BlockstoreError> {
        self.blocks.get(cid).ok_or(BlockstoreError::NotFound(*cid))
    }

    pub fn has(&self, cid: &Cid) -> bool {
        self.blocks.contains_key(cid)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Total size of all stored blocks in bytes
    pub fn byte_size(&self) -> usize {
        self.blocks.values().map(|b| b.len()).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Cid, &Bytes)> {
        self.blocks.iter()
    }

    /// Move every block of `other` into this store.
    pub fn extend(&mut self, other: MemoryBlockstore) {
        self.blocks.extend(other.blocks);
    }
}
