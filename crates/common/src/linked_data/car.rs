//! CARv1 block containers.
//!
//! Layout: `varint(len) ‖ dag-cbor header` followed by any number of
//!  `varint(len) ‖ cid ‖ block` sections.

use std::io::Cursor;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::{varint, BlockstoreError, Cid, CidError, MemoryBlockstore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarHeader {
    #[serde(default)]
    pub roots: Vec<Cid>,
    pub version: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum CarError {
    #[error("invalid car header: {0}")]
    Header(String),
    #[error("unsupported car version: {0}")]
    UnsupportedVersion(u64),
    #[error("car truncated at byte {0}")]
    Truncated(usize),
    #[error("invalid cid in car section at byte {offset}: {source}")]
    InvalidCid { offset: usize, source: CidError },
    #[error("invalid block: {0}")]
    Block(#[from] BlockstoreError),
}

/// Streaming reader over an in-memory CARv1.
///
/// Yields `(cid, block)` pairs without verifying them; use
///  [`decode`] to get a verified [`MemoryBlockstore`].
pub struct CarReader {
    bytes: Bytes,
    offset: usize,
    header: CarHeader,
}

impl CarReader {
    pub fn new(bytes: Bytes) -> Result<Self, CarError> {
        let (header_len, prefix) = varint::decode(&bytes).ok_or(CarError::Truncated(0))?;
        let header_len = header_len as usize;
        let end = prefix
            .checked_add(header_len)
            .filter(|end| *end <= bytes.len())
            .ok_or(CarError::Truncated(prefix))?;

        let header: CarHeader = serde_ipld_dagcbor::from_slice(&bytes[prefix..end])
            .map_err(|e| CarError::Header(e.to_string()))?;
        if header.version != 1 {
            return Err(CarError::UnsupportedVersion(header.version));
        }

        Ok(Self {
            bytes,
            offset: end,
            header,
        })
    }

    pub fn header(&self) -> &CarHeader {
        &self.header
    }

    pub fn roots(&self) -> &[Cid] {
        &self.header.roots
    }

    fn next_section(&mut self) -> Result<Option<(Cid, Bytes)>, CarError> {
        if self.offset >= self.bytes.len() {
            return Ok(None);
        }

        let start = self.offset;
        let (len, prefix) =
            varint::decode(&self.bytes[start..]).ok_or(CarError::Truncated(start))?;
        let section_start = start + prefix;
        let section_end = section_start
            .checked_add(len as usize)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(CarError::Truncated(section_start))?;

        let section = &self.bytes[section_start..section_end];
        let mut cursor = Cursor::new(section);
        let cid = Cid::read_bytes(&mut cursor).map_err(|source| CarError::InvalidCid {
            offset: section_start,
            source,
        })?;
        let data_start = section_start + cursor.position() as usize;

        self.offset = section_end;
        Ok(Some((cid, self.bytes.slice(data_start..section_end))))
    }
}

impl Iterator for CarReader {
    type Item = Result<(Cid, Bytes), CarError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_section() {
            Ok(Some(section)) => Some(Ok(section)),
            Ok(None) => None,
            Err(e) => {
                // stop after the first malformed section
                self.offset = self.bytes.len();
                Some(Err(e))
            }
        }
    }
}

/// Decode a CARv1 into its header and a verified block store.
pub fn decode(bytes: Bytes) -> Result<(CarHeader, MemoryBlockstore), CarError> {
    let mut reader = CarReader::new(bytes)?;
    let header = reader.header().clone();
    let mut store = MemoryBlockstore::new();
    for section in &mut reader {
        let (cid, data) = section?;
        store.put(cid, data)?;
    }
    Ok((header, store))
}

/// Accumulates a CARv1 in memory.
pub struct CarWriter {
    buffer: Vec<u8>,
}

impl CarWriter {
    pub fn new(roots: Vec<Cid>) -> Result<Self, CarError> {
        let header = CarHeader { roots, version: 1 };
        let encoded =
            serde_ipld_dagcbor::to_vec(&header).map_err(|e| CarError::Header(e.to_string()))?;

        let mut buffer = Vec::with_capacity(encoded.len() + varint::MAX_LEN);
        varint::encode(encoded.len() as u64, &mut buffer);
        buffer.extend_from_slice(&encoded);
        Ok(Self { buffer })
    }

    pub fn write(&mut self, cid: &Cid, data: &[u8]) {
        let cid_bytes = cid.to_bytes();
        varint::encode((cid_bytes.len() + data.len()) as u64, &mut self.buffer);
        self.buffer.extend_from_slice(&cid_bytes);
        self.buffer.extend_from_slice(data);
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn finish(self) -> Bytes {
        Bytes::from(self.buffer)
    }
}
