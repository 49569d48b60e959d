use std::collections::{BTreeMap, HashSet};

use bytes::Bytes;

use crate::linked_data::car::{CarError, CarWriter};
use crate::linked_data::{encode_block, Cid, DAG_PB_CODEC, RAW_CODEC};

use super::pb::{DataType, PbLink, PbNode, UnixFsData};
use super::UnixFsError;

/// Fixed chunk size for file leaves (1 MiB)
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;
/// Widest fan-out of an intermediate file node
pub const DEFAULT_MAX_CHILDREN: usize = 1024;

/// A named binary object to place in a directory.
#[derive(Debug, Clone)]
pub struct NamedBlob {
    pub name: String,
    pub bytes: Bytes,
}

impl NamedBlob {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

/// Reported once for every entry linked into the directory graph:
///  each file, each intermediate directory, and finally the root
///  (with an empty name).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntryLink {
    pub name: String,
    pub cid: Cid,
    pub dag_byte_length: u64,
}

pub trait LinkVisitor: Send {
    fn visit(&mut self, link: DirectoryEntryLink);
}

/// Collects link events so they can be drained once the write is done.
#[derive(Debug, Default)]
pub struct LinkCollector {
    links: Vec<DirectoryEntryLink>,
}

impl LinkCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = DirectoryEntryLink> + '_ {
        self.links.drain(..)
    }
}

impl LinkVisitor for LinkCollector {
    fn visit(&mut self, link: DirectoryEntryLink) {
        self.links.push(link);
    }
}

/// The blocks of an encoded directory, in write order (root last).
#[derive(Debug, Clone)]
pub struct EncodedDag {
    pub root: Cid,
    pub blocks: Vec<(Cid, Bytes)>,
}

impl EncodedDag {
    pub fn byte_size(&self) -> usize {
        self.blocks.iter().map(|(_, b)| b.len()).sum()
    }

    /// Pack every block into a block container rooted at `root`.
    pub fn to_car(&self) -> Result<Bytes, CarError> {
        let mut writer = CarWriter::new(vec![self.root])?;
        for (cid, data) in &self.blocks {
            writer.write(cid, data);
        }
        Ok(writer.finish())
    }
}

#[derive(Default)]
struct BlockSink {
    seen: HashSet<Cid>,
    blocks: Vec<(Cid, Bytes)>,
}

impl BlockSink {
    fn push(&mut self, cid: Cid, data: Bytes) {
        if self.seen.insert(cid) {
            self.blocks.push((cid, data));
        }
    }
}

enum TreeEntry {
    File(Bytes),
    Dir(BTreeMap<String, TreeEntry>),
}

/// Split a `/`-separated entry name into its path segments.
fn segments(name: &str) -> Result<Vec<&str>, UnixFsError> {
    let segments: Vec<&str> = name.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() || segments.iter().any(|s| *s == "." || *s == "..") {
        return Err(UnixFsError::InvalidName(name.to_string()));
    }
    Ok(segments)
}

/// The name an entry is reported under: its segments joined by `/`.
pub fn canonical_name(name: &str) -> Option<String> {
    segments(name).ok().map(|s| s.join("/"))
}

/// Encodes a batch of files into one UnixFS directory.
///
/// Files are split into fixed-size raw leaves and assembled into a
///  balanced tree; directories are plain (unsharded) dag-pb nodes
///  whose links are sorted by name.
#[derive(Debug, Clone)]
pub struct DirectoryEncoder {
    chunk_size: usize,
    max_children: usize,
}

impl Default for DirectoryEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_MAX_CHILDREN)
    }
}

impl DirectoryEncoder {
    pub fn new(chunk_size: usize, max_children: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            max_children: max_children.max(2),
        }
    }

    pub fn encode(
        &self,
        files: Vec<NamedBlob>,
        visitor: &mut dyn LinkVisitor,
    ) -> Result<EncodedDag, UnixFsError> {
        let mut tree = BTreeMap::new();
        for file in files {
            insert(&mut tree, &file.name, file.bytes)?;
        }

        let mut sink = BlockSink::default();
        let (root, size) = self.encode_dir("", tree, &mut sink, visitor)?;
        visitor.visit(DirectoryEntryLink {
            name: String::new(),
            cid: root,
            dag_byte_length: size,
        });

        tracing::debug!(%root, blocks = sink.blocks.len(), "encoded directory");
        Ok(EncodedDag {
            root,
            blocks: sink.blocks,
        })
    }

    fn encode_dir(
        &self,
        prefix: &str,
        entries: BTreeMap<String, TreeEntry>,
        sink: &mut BlockSink,
        visitor: &mut dyn LinkVisitor,
    ) -> Result<(Cid, u64), UnixFsError> {
        let mut links = Vec::with_capacity(entries.len());
        let mut total = 0u64;

        for (name, entry) in entries {
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{}/{}", prefix, name)
            };

            let (cid, size) = match entry {
                TreeEntry::File(bytes) => self.encode_file(&bytes, sink),
                TreeEntry::Dir(children) => self.encode_dir(&path, children, sink, visitor)?,
            };

            visitor.visit(DirectoryEntryLink {
                name: path,
                cid,
                dag_byte_length: size,
            });

            total += size;
            links.push(PbLink {
                hash: cid,
                name: Some(name),
                tsize: Some(size),
            });
        }

        let node = PbNode {
            links,
            data: Some(UnixFsData::new(DataType::Directory).encode()),
        };
        let (cid, data) = encode_block(DAG_PB_CODEC, node.encode());
        total += data.len() as u64;
        sink.push(cid, data);
        Ok((cid, total))
    }

    /// Returns the file's root CID and the byte size of its whole DAG.
    fn encode_file(&self, bytes: &Bytes, sink: &mut BlockSink) -> (Cid, u64) {
        // (cid, dag size, file size) per node of the current level
        let mut level: Vec<(Cid, u64, u64)> = Vec::new();

        if bytes.is_empty() {
            let (cid, data) = encode_block(RAW_CODEC, Bytes::new());
            sink.push(cid, data);
            return (cid, 0);
        }

        let mut offset = 0;
        while offset < bytes.len() {
            let end = (offset + self.chunk_size).min(bytes.len());
            let (cid, data) = encode_block(RAW_CODEC, bytes.slice(offset..end));
            let len = data.len() as u64;
            sink.push(cid, data);
            level.push((cid, len, len));
            offset = end;
        }

        while level.len() > 1 {
            let mut parents = Vec::with_capacity(level.len() / self.max_children + 1);
            for group in level.chunks(self.max_children) {
                let mut meta = UnixFsData::new(DataType::File);
                meta.filesize = Some(group.iter().map(|(_, _, size)| size).sum());
                meta.blocksizes = group.iter().map(|(_, _, size)| *size).collect();

                let node = PbNode {
                    links: group
                        .iter()
                        .map(|(cid, dag_size, _)| PbLink {
                            hash: *cid,
                            name: Some(String::new()),
                            tsize: Some(*dag_size),
                        })
                        .collect(),
                    data: Some(meta.encode()),
                };

                let (cid, data) = encode_block(DAG_PB_CODEC, node.encode());
                let dag_size =
                    data.len() as u64 + group.iter().map(|(_, dag, _)| dag).sum::<u64>();
                sink.push(cid, data);
                parents.push((cid, dag_size, meta.filesize.unwrap_or_default()));
            }
            level = parents;
        }

        let (cid, dag_size, _) = level[0];
        (cid, dag_size)
    }
}

fn insert(
    tree: &mut BTreeMap<String, TreeEntry>,
    name: &str,
    bytes: Bytes,
) -> Result<(), UnixFsError> {
    let segments = segments(name)?;
    let (file_name, parents) = segments
        .split_last()
        .ok_or_else(|| UnixFsError::InvalidName(name.to_string()))?;

    let mut current = tree;
    for segment in parents {
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| TreeEntry::Dir(BTreeMap::new()));
        current = match entry {
            TreeEntry::Dir(children) => children,
            TreeEntry::File(_) => return Err(UnixFsError::InvalidName(name.to_string())),
        };
    }

    if let Some(TreeEntry::Dir(_)) = current.get(*file_name) {
        return Err(UnixFsError::InvalidName(name.to_string()));
    }
    // a later file with the same name replaces the earlier one
    current.insert(file_name.to_string(), TreeEntry::File(bytes));
    Ok(())
}
