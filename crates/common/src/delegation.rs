use std::sync::Arc;

use bytes::Bytes;
use ipld_core::ipld::Ipld;

use crate::codec::{self, Base64Mode};
use crate::linked_data::car::{self, CarError};
use crate::linked_data::multibase;
use crate::linked_data::{varint, Cid, MemoryBlockstore, CAR_CODEC, IDENTITY_CODE};

#[derive(Debug, thiserror::Error)]
pub enum DelegationError {
    #[error("delegation required")]
    Required,
    #[error("delegation is empty")]
    Empty,
    #[error("failed to decode delegation: {0}")]
    Encoding(String),
    #[error("failed to decode delegation archive: {0}")]
    Archive(#[from] CarError),
    #[error("delegation archive has no root")]
    MissingRoot,
    #[error("delegation root block {0} is missing")]
    MissingRootBlock(Cid),
    #[error("delegation root {0} is not dag-cbor: {1}")]
    InvalidRoot(Cid, String),
    #[error("delegation rejected: {0}")]
    Rejected(String),
}

#[derive(Debug)]
struct DelegationInner {
    root: Cid,
    payload: Ipld,
    blocks: MemoryBlockstore,
    archive: Bytes,
}

/// A capability proof chain, held as the archive it arrived in.
///
/// Only the structure is checked: the archive decodes, every block
///  matches its hash and the root is a dag-cbor block we hold. What the
///  proof grants is left to the storage network.
#[derive(Debug, Clone)]
pub struct Delegation(Arc<DelegationInner>);

/// Unwrap `CIDv1(car, identity(archive))` if that is what `bytes` is.
///
/// Large archives overflow the fixed-size multihash behind [`Cid`], so
///  the header is walked by hand.
fn identity_archive(bytes: &[u8]) -> Option<&[u8]> {
    let mut offset = 0;
    let next = |offset: &mut usize| {
        let (value, len) = varint::decode(&bytes[*offset..])?;
        *offset += len;
        Some(value)
    };

    if next(&mut offset)? != 1 || next(&mut offset)? != CAR_CODEC {
        return None;
    }
    if next(&mut offset)? != IDENTITY_CODE {
        return None;
    }
    let len = usize::try_from(next(&mut offset)?).ok()?;
    let digest = bytes.get(offset..)?;
    (digest.len() == len).then_some(digest)
}

/// Decode a delegation from its transport encoding.
///
/// Whitespace anywhere in `raw` is dropped first. Two encodings are
///  understood: a multibase CID whose identity multihash inlines the
///  archive, and plain or self-describing base64 of the archive.
pub fn parse(raw: &str) -> Result<Delegation, DelegationError> {
    let cleaned: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return Err(DelegationError::Empty);
    }

    let archive = match multibase::decode(&cleaned) {
        Ok((_, bytes)) if identity_archive(&bytes).is_some() => {
            identity_archive(&bytes).map(Bytes::copy_from_slice)
        }
        _ => None,
    };
    if let Some(archive) = archive {
        return Delegation::from_archive(archive);
    }

    let bytes = codec::decode(&cleaned).map_err(|e| DelegationError::Encoding(e.to_string()))?;
    match Delegation::from_archive(Bytes::from(bytes)) {
        // self-describing text can also read as standard base64
        Err(err) if cleaned.starts_with(codec::MULTIBASE_BASE64_PREFIX) => {
            codec::decode_as(&cleaned, Base64Mode::Multiformat)
                .ok()
                .and_then(|bytes| Delegation::from_archive(Bytes::from(bytes)).ok())
                .ok_or(err)
        }
        result => result,
    }
}

/// Pick the delegation for one call: the request's own wins over the
///  configured default, and having neither is an error.
pub fn resolve(
    requested: Option<&str>,
    default: Option<&Delegation>,
) -> Result<Delegation, DelegationError> {
    match requested.filter(|raw| !raw.trim().is_empty()) {
        Some(raw) => parse(raw),
        None => default.cloned().ok_or(DelegationError::Required),
    }
}

impl Delegation {
    pub fn from_archive(archive: Bytes) -> Result<Self, DelegationError> {
        let (header, blocks) = car::decode(archive.clone())?;
        let root = *header.roots.first().ok_or(DelegationError::MissingRoot)?;
        let block = blocks
            .get(&root)
            .map_err(|_| DelegationError::MissingRootBlock(root))?;
        let payload: Ipld = serde_ipld_dagcbor::from_slice(block)
            .map_err(|e| DelegationError::InvalidRoot(root, e.to_string()))?;

        Ok(Self(Arc::new(DelegationInner {
            root,
            payload,
            blocks,
            archive,
        })))
    }

    pub fn root(&self) -> &Cid {
        &self.0.root
    }

    /// Decoded root block
    pub fn payload(&self) -> &Ipld {
        &self.0.payload
    }

    pub fn blocks(&self) -> &MemoryBlockstore {
        &self.0.blocks
    }

    pub fn archive(&self) -> &Bytes {
        &self.0.archive
    }

    /// Self-describing base64 of the archive, accepted by [`parse`].
    pub fn format(&self) -> String {
        codec::encode(&self.0.archive, Base64Mode::Multiformat)
    }
}

impl PartialEq for Delegation {
    fn eq(&self, other: &Self) -> bool {
        self.0.archive == other.0.archive
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::linked_data::car::CarWriter;
    use crate::linked_data::{encode_block, DAG_CBOR_CODEC};

    /// A structurally valid single-block proof archive.
    pub(crate) fn sample_archive(audience: &str) -> Bytes {
        let mut map = BTreeMap::new();
        map.insert("aud".to_string(), Ipld::String(audience.to_string()));
        map.insert("v".to_string(), Ipld::String("0.9.1".to_string()));
        let block = serde_ipld_dagcbor::to_vec(&Ipld::Map(map)).unwrap();
        let (cid, block) = encode_block(DAG_CBOR_CODEC, block);

        let mut writer = CarWriter::new(vec![cid]).unwrap();
        writer.write(&cid, &block);
        writer.finish()
    }

    fn identity_cid_text(archive: &[u8]) -> String {
        let mut bytes = Vec::new();
        varint::encode(1, &mut bytes);
        varint::encode(CAR_CODEC, &mut bytes);
        varint::encode(IDENTITY_CODE, &mut bytes);
        varint::encode(archive.len() as u64, &mut bytes);
        bytes.extend_from_slice(archive);
        multibase::encode(multibase::Base::Base64, bytes)
    }

    #[test]
    fn test_parse_base64_archive() {
        let archive = sample_archive("did:key:alice");
        for mode in [Base64Mode::Standard, Base64Mode::Multiformat] {
            let delegation = parse(&codec::encode(&archive, mode)).unwrap();
            assert_eq!(delegation.archive(), &archive);
            assert_eq!(delegation.blocks().len(), 1);
            assert!(matches!(delegation.payload(), Ipld::Map(_)));
        }
    }

    #[test]
    fn test_parse_identity_cid() {
        let archive = sample_archive("did:key:bob");
        let delegation = parse(&identity_cid_text(&archive)).unwrap();
        assert_eq!(delegation.archive(), &archive);
        assert_eq!(delegation.root().codec(), DAG_CBOR_CODEC);
    }

    #[test]
    fn test_parse_strips_whitespace() {
        let archive = sample_archive("did:key:carol");
        let text = codec::encode(&archive, Base64Mode::Standard);
        let (head, tail) = text.split_at(text.len() / 2);
        let messy = format!(" {}\n\t{} \r\n", head, tail);
        assert_eq!(parse(&messy).unwrap().archive(), &archive);
    }

    #[test]
    fn test_format_roundtrip() {
        let delegation = parse(&codec::encode(
            &sample_archive("did:key:dave"),
            Base64Mode::Standard,
        ))
        .unwrap();
        let again = parse(&delegation.format()).unwrap();
        assert_eq!(again, delegation);
    }

    #[test]
    fn test_format_roundtrip_every_length_residue() {
        // each extra audience byte grows the archive by one
        let mut residues = std::collections::BTreeSet::new();
        for audience in ["did:key:e", "did:key:ee", "did:key:eee"] {
            let archive = sample_archive(audience);
            let delegation = Delegation::from_archive(archive.clone()).unwrap();
            assert_eq!(parse(&delegation.format()).unwrap().archive(), &archive);
            residues.insert(archive.len() % 3);
        }
        assert_eq!(residues.len(), 3);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(matches!(parse("  \n"), Err(DelegationError::Empty)));
        assert!(matches!(parse("***"), Err(DelegationError::Encoding(_))));
        // valid base64, not an archive
        assert!(matches!(
            parse(&codec::encode(b"hello", Base64Mode::Standard)),
            Err(DelegationError::Archive(_))
        ));
    }

    #[test]
    fn test_parse_rejects_non_cbor_root() {
        let (cid, block) = encode_block(DAG_CBOR_CODEC, Bytes::from_static(&[0xff, 0xff]));
        let mut writer = CarWriter::new(vec![cid]).unwrap();
        writer.write(&cid, &block);
        let text = codec::encode(&writer.finish(), Base64Mode::Standard);
        assert!(matches!(parse(&text), Err(DelegationError::InvalidRoot(..))));
    }

    #[test]
    fn test_resolve_precedence() {
        let default = parse(&codec::encode(
            &sample_archive("did:key:default"),
            Base64Mode::Standard,
        ))
        .unwrap();
        let requested = codec::encode(&sample_archive("did:key:request"), Base64Mode::Standard);

        let chosen = resolve(Some(&requested), Some(&default)).unwrap();
        assert_ne!(chosen, default);

        let fallback = resolve(None, Some(&default)).unwrap();
        assert_eq!(fallback, default);

        let err = resolve(None, None).unwrap_err();
        assert_eq!(err.to_string(), "delegation required");

        // blank request strings fall back to the default
        assert_eq!(resolve(Some("  "), Some(&default)).unwrap(), default);
    }
}
