use std::collections::HashSet;

use bytes::Bytes;

use crate::linked_data::{BlockstoreError, Cid, MemoryBlockstore, DAG_PB_CODEC, RAW_CODEC};

use super::pb::{DataType, PbNode, UnixFsData};
use super::UnixFsError;

/// Walk `path` from `root` and return the CID it names.
pub fn resolve(store: &MemoryBlockstore, root: &Cid, path: &str) -> Result<Cid, UnixFsError> {
    resolve_traced(store, root, path, &mut Vec::new())
}

/// Like [`resolve`], additionally recording every block the walk had
///  to read (directories and shards, not the target itself).
pub fn resolve_traced(
    store: &MemoryBlockstore,
    root: &Cid,
    path: &str,
    trace: &mut Vec<Cid>,
) -> Result<Cid, UnixFsError> {
    let mut current = *root;
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        trace.push(current);
        current = lookup(store, &current, segment, trace)
            .map_err(|e| match e {
                UnixFsError::NotFound(_) => UnixFsError::NotFound(path.to_string()),
                other => other,
            })?;
    }
    Ok(current)
}

fn lookup(
    store: &MemoryBlockstore,
    dir: &Cid,
    name: &str,
    trace: &mut Vec<Cid>,
) -> Result<Cid, UnixFsError> {
    if dir.codec() != DAG_PB_CODEC {
        return Err(UnixFsError::NotADirectory(*dir));
    }

    let node = PbNode::decode(store.get(dir)?)?;
    let meta = node.unixfs()?;
    let found = match meta.data_type {
        DataType::Directory => node
            .links
            .iter()
            .find(|link| link.name.as_deref() == Some(name))
            .map(|link| link.hash),
        DataType::HamtShard => find_in_shard(store, &node, &meta, name, trace)?,
        _ => return Err(UnixFsError::NotADirectory(*dir)),
    };

    found.ok_or_else(|| UnixFsError::NotFound(name.to_string()))
}

/// Search a HAMT shard for `name`.
///
/// Entry links are named `<hex bucket><entry name>`; a link named by the
///  bucket prefix alone points at a sub-shard. Instead of hashing the
///  name to pick a bucket, every bucket is scanned and sub-shards that are
///  absent from the store are skipped: a trustless gateway only ships the
///  shards along the requested path.
fn find_in_shard(
    store: &MemoryBlockstore,
    node: &PbNode,
    meta: &UnixFsData,
    name: &str,
    trace: &mut Vec<Cid>,
) -> Result<Option<Cid>, UnixFsError> {
    let fanout = meta.fanout.unwrap_or(256);
    if fanout < 2 {
        return Err(UnixFsError::Decode(format!("invalid shard fanout {}", fanout)));
    }
    let prefix_len = format!("{:X}", fanout - 1).len();

    for link in &node.links {
        let link_name = link.name.as_deref().unwrap_or_default();
        if link_name.len() < prefix_len || !link_name.is_char_boundary(prefix_len) {
            return Err(UnixFsError::Decode(format!(
                "shard link name too short: {:?}",
                link_name
            )));
        }

        let entry = &link_name[prefix_len..];
        if entry == name {
            return Ok(Some(link.hash));
        }
        if !entry.is_empty() {
            continue;
        }

        let block = match store.get(&link.hash) {
            Ok(block) => block,
            Err(BlockstoreError::NotFound(_)) => continue,
            Err(e) => return Err(e.into()),
        };
        let child = PbNode::decode(block)?;
        let child_meta = child.unixfs()?;
        if child_meta.data_type != DataType::HamtShard {
            return Err(UnixFsError::Decode(format!(
                "sub-shard {} is not a shard",
                link.hash
            )));
        }

        trace.push(link.hash);
        if let Some(found) = find_in_shard(store, &child, &child_meta, name, trace)? {
            return Ok(Some(found));
        }
        trace.pop();
    }

    Ok(None)
}

/// Byte chunks of a file, in order, read lazily from the store.
pub struct FileChunks<'a> {
    store: &'a MemoryBlockstore,
    stack: Vec<Cid>,
}

/// Start reading the file rooted at `cid`.
///
/// Handles raw leaves, single-block dag-pb files with inline data and
///  multi-block dag-pb files.
pub fn cat<'a>(store: &'a MemoryBlockstore, cid: &Cid) -> Result<FileChunks<'a>, UnixFsError> {
    match cid.codec() {
        RAW_CODEC => {}
        DAG_PB_CODEC => {
            let meta = PbNode::decode(store.get(cid)?)?.unixfs()?;
            if !matches!(meta.data_type, DataType::File | DataType::Raw) {
                return Err(UnixFsError::NotAFile(*cid));
            }
        }
        codec => return Err(UnixFsError::UnsupportedCodec(codec)),
    }

    Ok(FileChunks {
        store,
        stack: vec![*cid],
    })
}

impl FileChunks<'_> {
    fn expand(&mut self, cid: Cid) -> Result<Option<Bytes>, UnixFsError> {
        let block = self.store.get(&cid)?;
        match cid.codec() {
            RAW_CODEC => Ok(Some(block.clone()).filter(|b| !b.is_empty())),
            DAG_PB_CODEC => {
                let node = PbNode::decode(block)?;
                let meta = node.unixfs()?;
                if !matches!(meta.data_type, DataType::File | DataType::Raw) {
                    return Err(UnixFsError::NotAFile(cid));
                }
                self.stack.extend(node.links.iter().rev().map(|link| link.hash));
                Ok(meta.data.filter(|d| !d.is_empty()).map(Bytes::from))
            }
            codec => Err(UnixFsError::UnsupportedCodec(codec)),
        }
    }
}

impl Iterator for FileChunks<'_> {
    type Item = Result<Bytes, UnixFsError>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(cid) = self.stack.pop() {
            match self.expand(cid) {
                Ok(Some(bytes)) => return Some(Ok(bytes)),
                Ok(None) => continue,
                Err(e) => {
                    self.stack.clear();
                    return Some(Err(e));
                }
            }
        }
        None
    }
}

/// Append `cid` and every distinct block reachable from it to `out`.
pub fn collect_dag(
    store: &MemoryBlockstore,
    cid: &Cid,
    out: &mut Vec<Cid>,
) -> Result<(), UnixFsError> {
    let mut seen = HashSet::new();
    let mut stack = vec![*cid];
    while let Some(next) = stack.pop() {
        if !seen.insert(next) {
            continue;
        }
        let block = store.get(&next)?;
        out.push(next);
        match next.codec() {
            RAW_CODEC => {}
            DAG_PB_CODEC => {
                let node = PbNode::decode(block)?;
                stack.extend(node.links.iter().rev().map(|link| link.hash));
            }
            codec => return Err(UnixFsError::UnsupportedCodec(codec)),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linked_data::encode_block;
    use crate::unixfs::pb::PbLink;
    use crate::unixfs::{DirectoryEncoder, LinkCollector, NamedBlob};

    fn store_for(files: Vec<NamedBlob>, encoder: &DirectoryEncoder) -> (Cid, MemoryBlockstore) {
        let mut collector = LinkCollector::new();
        let dag = encoder.encode(files, &mut collector).unwrap();
        let mut store = MemoryBlockstore::new();
        for (cid, data) in dag.blocks {
            store.put(cid, data).unwrap();
        }
        (dag.root, store)
    }

    fn read_all(store: &MemoryBlockstore, cid: &Cid) -> Vec<u8> {
        cat(store, cid)
            .unwrap()
            .map(|chunk| chunk.unwrap())
            .fold(Vec::new(), |mut acc, chunk| {
                acc.extend_from_slice(&chunk);
                acc
            })
    }

    #[test]
    fn test_resolve_and_cat_single_block() {
        let (root, store) = store_for(
            vec![NamedBlob::new("hello.txt", &b"hello world"[..])],
            &DirectoryEncoder::default(),
        );
        let cid = resolve(&store, &root, "/hello.txt").unwrap();
        assert_eq!(read_all(&store, &cid), b"hello world");
    }

    #[test]
    fn test_cat_multi_block_file_in_order() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let (root, store) = store_for(
            vec![NamedBlob::new("dir/sub/data.bin", data.clone())],
            &DirectoryEncoder::new(100, 7),
        );
        let cid = resolve(&store, &root, "/dir/sub/data.bin").unwrap();
        assert_eq!(cid.codec(), DAG_PB_CODEC);
        assert_eq!(read_all(&store, &cid), data);
    }

    #[test]
    fn test_cat_inline_dag_pb_file() {
        let mut meta = UnixFsData::new(DataType::File);
        meta.data = Some(b"inline bytes".to_vec());
        meta.filesize = Some(12);
        let node = PbNode {
            links: vec![],
            data: Some(meta.encode()),
        };
        let (cid, block) = encode_block(DAG_PB_CODEC, node.encode());
        let mut store = MemoryBlockstore::new();
        store.put(cid, block).unwrap();

        assert_eq!(read_all(&store, &cid), b"inline bytes");
    }

    #[test]
    fn test_missing_entry() {
        let (root, store) = store_for(
            vec![NamedBlob::new("a.txt", &b"a"[..])],
            &DirectoryEncoder::default(),
        );
        let result = resolve(&store, &root, "/b.txt");
        assert!(matches!(result, Err(UnixFsError::NotFound(p)) if p == "/b.txt"));
    }

    #[test]
    fn test_cat_directory_is_an_error() {
        let (root, store) = store_for(
            vec![NamedBlob::new("a.txt", &b"a"[..])],
            &DirectoryEncoder::default(),
        );
        assert!(matches!(cat(&store, &root), Err(UnixFsError::NotAFile(_))));
    }

    #[test]
    fn test_path_through_a_file_is_an_error() {
        let (root, store) = store_for(
            vec![NamedBlob::new("a.txt", &b"a"[..])],
            &DirectoryEncoder::default(),
        );
        let result = resolve(&store, &root, "/a.txt/nested");
        assert!(matches!(result, Err(UnixFsError::NotADirectory(_))));
    }

    fn shard_node(links: Vec<PbLink>) -> (Cid, Bytes) {
        let mut meta = UnixFsData::new(DataType::HamtShard);
        meta.fanout = Some(256);
        meta.hash_type = Some(0x22);
        let node = PbNode {
            links,
            data: Some(meta.encode()),
        };
        encode_block(DAG_PB_CODEC, node.encode())
    }

    #[test]
    fn test_resolve_through_hamt_shard() {
        let mut store = MemoryBlockstore::new();
        let (file_cid, file) = encode_block(RAW_CODEC, &b"sharded"[..]);
        store.put(file_cid, file).unwrap();

        let (sub_cid, sub) = shard_node(vec![PbLink {
            hash: file_cid,
            name: Some("3Fdeep.txt".to_string()),
            tsize: Some(7),
        }]);
        store.put(sub_cid, sub).unwrap();

        // a sub-shard the gateway did not send
        let (absent_cid, _) = shard_node(vec![]);

        let (root_cid, root) = shard_node(vec![
            PbLink {
                hash: absent_cid,
                name: Some("01".to_string()),
                tsize: Some(0),
            },
            PbLink {
                hash: sub_cid,
                name: Some("A2".to_string()),
                tsize: Some(20),
            },
        ]);
        store.put(root_cid, root).unwrap();

        let mut trace = Vec::new();
        let cid = resolve_traced(&store, &root_cid, "/deep.txt", &mut trace).unwrap();
        assert_eq!(cid, file_cid);
        assert_eq!(trace, vec![root_cid, sub_cid]);
        assert_eq!(read_all(&store, &cid), b"sharded");
    }

    #[test]
    fn test_collect_dag() {
        let (root, store) = store_for(
            vec![NamedBlob::new("big", vec![1u8; 50])],
            &DirectoryEncoder::new(10, 4),
        );
        let file = resolve(&store, &root, "big").unwrap();
        let mut out = Vec::new();
        collect_dag(&store, &file, &mut out).unwrap();
        // root, two parents and one distinct leaf
        assert_eq!(out[0], file);
        assert_eq!(out.len(), 4);
    }
}
