//! Just enough protobuf to read and write dag-pb nodes and the
//! UnixFS `Data` message they carry.

use crate::linked_data::{varint, Cid};

use super::UnixFsError;

const WIRE_VARINT: u64 = 0;
const WIRE_FIXED64: u64 = 1;
const WIRE_LEN: u64 = 2;
const WIRE_FIXED32: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Raw,
    Directory,
    File,
    Metadata,
    Symlink,
    HamtShard,
}

impl DataType {
    fn from_code(code: u64) -> Result<Self, UnixFsError> {
        Ok(match code {
            0 => DataType::Raw,
            1 => DataType::Directory,
            2 => DataType::File,
            3 => DataType::Metadata,
            4 => DataType::Symlink,
            5 => DataType::HamtShard,
            other => {
                return Err(UnixFsError::Decode(format!(
                    "unknown unixfs data type {}",
                    other
                )))
            }
        })
    }

    fn code(self) -> u64 {
        match self {
            DataType::Raw => 0,
            DataType::Directory => 1,
            DataType::File => 2,
            DataType::Metadata => 3,
            DataType::Symlink => 4,
            DataType::HamtShard => 5,
        }
    }
}

/// UnixFS `Data` message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnixFsData {
    pub data_type: DataType,
    pub data: Option<Vec<u8>>,
    pub filesize: Option<u64>,
    pub blocksizes: Vec<u64>,
    pub hash_type: Option<u64>,
    pub fanout: Option<u64>,
}

impl UnixFsData {
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            data: None,
            filesize: None,
            blocksizes: Vec::new(),
            hash_type: None,
            fanout: None,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        put_varint_field(&mut out, 1, self.data_type.code());
        if let Some(data) = &self.data {
            put_bytes_field(&mut out, 2, data);
        }
        if let Some(filesize) = self.filesize {
            put_varint_field(&mut out, 3, filesize);
        }
        for size in &self.blocksizes {
            put_varint_field(&mut out, 4, *size);
        }
        if let Some(hash_type) = self.hash_type {
            put_varint_field(&mut out, 5, hash_type);
        }
        if let Some(fanout) = self.fanout {
            put_varint_field(&mut out, 6, fanout);
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, UnixFsError> {
        let mut data_type = None;
        let mut message = UnixFsData::new(DataType::Raw);

        for field in Fields::new(bytes) {
            match field? {
                (1, Value::Varint(v)) => data_type = Some(DataType::from_code(v)?),
                (2, Value::Bytes(b)) => message.data = Some(b.to_vec()),
                (3, Value::Varint(v)) => message.filesize = Some(v),
                (4, Value::Varint(v)) => message.blocksizes.push(v),
                (4, Value::Bytes(packed)) => {
                    let mut rest = packed;
                    while !rest.is_empty() {
                        let (v, used) = varint::decode(rest)
                            .ok_or_else(|| decode_error("truncated packed blocksizes"))?;
                        message.blocksizes.push(v);
                        rest = &rest[used..];
                    }
                }
                (5, Value::Varint(v)) => message.hash_type = Some(v),
                (6, Value::Varint(v)) => message.fanout = Some(v),
                // mode, mtime and anything newer
                _ => {}
            }
        }

        message.data_type = data_type.ok_or_else(|| decode_error("missing unixfs data type"))?;
        Ok(message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PbLink {
    pub hash: Cid,
    pub name: Option<String>,
    pub tsize: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PbNode {
    pub links: Vec<PbLink>,
    pub data: Option<Vec<u8>>,
}

impl PbNode {
    /// Encode in canonical dag-pb order: links first, then data.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for link in &self.links {
            let mut encoded = Vec::new();
            put_bytes_field(&mut encoded, 1, &link.hash.to_bytes());
            if let Some(name) = &link.name {
                put_bytes_field(&mut encoded, 2, name.as_bytes());
            }
            if let Some(tsize) = link.tsize {
                put_varint_field(&mut encoded, 3, tsize);
            }
            put_bytes_field(&mut out, 2, &encoded);
        }
        if let Some(data) = &self.data {
            put_bytes_field(&mut out, 1, data);
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, UnixFsError> {
        let mut node = PbNode::default();
        for field in Fields::new(bytes) {
            match field? {
                (1, Value::Bytes(b)) => node.data = Some(b.to_vec()),
                (2, Value::Bytes(b)) => node.links.push(decode_link(b)?),
                (number, _) => {
                    return Err(decode_error(&format!(
                        "unexpected field {} in dag-pb node",
                        number
                    )))
                }
            }
        }
        Ok(node)
    }

    /// Decode the UnixFS message carried in the node's data.
    pub fn unixfs(&self) -> Result<UnixFsData, UnixFsError> {
        let data = self
            .data
            .as_deref()
            .ok_or_else(|| decode_error("dag-pb node carries no unixfs data"))?;
        UnixFsData::decode(data)
    }
}

fn decode_link(bytes: &[u8]) -> Result<PbLink, UnixFsError> {
    let mut hash = None;
    let mut name = None;
    let mut tsize = None;

    for field in Fields::new(bytes) {
        match field? {
            (1, Value::Bytes(b)) => {
                hash = Some(Cid::try_from(b).map_err(|e| decode_error(&e.to_string()))?)
            }
            (2, Value::Bytes(b)) => {
                name = Some(
                    String::from_utf8(b.to_vec())
                        .map_err(|_| decode_error("link name is not utf-8"))?,
                )
            }
            (3, Value::Varint(v)) => tsize = Some(v),
            (number, _) => {
                return Err(decode_error(&format!(
                    "unexpected field {} in dag-pb link",
                    number
                )))
            }
        }
    }

    Ok(PbLink {
        hash: hash.ok_or_else(|| decode_error("dag-pb link without hash"))?,
        name,
        tsize,
    })
}

fn decode_error(msg: &str) -> UnixFsError {
    UnixFsError::Decode(msg.to_string())
}

fn put_key(out: &mut Vec<u8>, number: u64, wire: u64) {
    varint::encode((number << 3) | wire, out);
}

fn put_varint_field(out: &mut Vec<u8>, number: u64, value: u64) {
    put_key(out, number, WIRE_VARINT);
    varint::encode(value, out);
}

fn put_bytes_field(out: &mut Vec<u8>, number: u64, value: &[u8]) {
    put_key(out, number, WIRE_LEN);
    varint::encode(value.len() as u64, out);
    out.extend_from_slice(value);
}

enum Value<'a> {
    Varint(u64),
    Bytes(&'a [u8]),
    Fixed,
}

/// Iterator over `(field number, value)` pairs of a protobuf message.
struct Fields<'a> {
    rest: &'a [u8],
}

impl<'a> Fields<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { rest: bytes }
    }

    fn take_varint(&mut self) -> Result<u64, UnixFsError> {
        let (value, used) =
            varint::decode(self.rest).ok_or_else(|| decode_error("truncated varint"))?;
        self.rest = &self.rest[used..];
        Ok(value)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], UnixFsError> {
        if len > self.rest.len() {
            return Err(decode_error("truncated field"));
        }
        let (head, tail) = self.rest.split_at(len);
        self.rest = tail;
        Ok(head)
    }

    fn next_field(&mut self) -> Result<(u64, Value<'a>), UnixFsError> {
        let key = self.take_varint()?;
        let number = key >> 3;
        let value = match key & 0x7 {
            WIRE_VARINT => Value::Varint(self.take_varint()?),
            WIRE_LEN => {
                let len = self.take_varint()? as usize;
                Value::Bytes(self.take(len)?)
            }
            WIRE_FIXED64 => {
                self.take(8)?;
                Value::Fixed
            }
            WIRE_FIXED32 => {
                self.take(4)?;
                Value::Fixed
            }
            wire => return Err(decode_error(&format!("unsupported wire type {}", wire))),
        };
        Ok((number, value))
    }
}

impl<'a> Iterator for Fields<'a> {
    type Item = Result<(u64, Value<'a>), UnixFsError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }
        let field = self.next_field();
        if field.is_err() {
            self.rest = &[];
        }
        Some(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linked_data::{block_cid, RAW_CODEC};

    #[test]
    fn test_file_node_roundtrip() {
        let child = block_cid(RAW_CODEC, b"chunk");
        let mut data = UnixFsData::new(DataType::File);
        data.filesize = Some(10);
        data.blocksizes = vec![5, 5];

        let node = PbNode {
            links: vec![
                PbLink {
                    hash: child,
                    name: Some(String::new()),
                    tsize: Some(5),
                },
                PbLink {
                    hash: child,
                    name: Some(String::new()),
                    tsize: Some(5),
                },
            ],
            data: Some(data.encode()),
        };

        let decoded = PbNode::decode(&node.encode()).unwrap();
        assert_eq!(decoded, node);
        assert_eq!(decoded.unixfs().unwrap(), data);
    }

    #[test]
    fn test_known_directory_encoding() {
        // Type=Directory
        assert_eq!(UnixFsData::new(DataType::Directory).encode(), vec![0x08, 0x01]);
        // An empty directory node: Data field wrapping the above
        let node = PbNode {
            links: vec![],
            data: Some(vec![0x08, 0x01]),
        };
        assert_eq!(node.encode(), vec![0x0a, 0x02, 0x08, 0x01]);
    }

    #[test]
    fn test_packed_blocksizes() {
        // Type=File, blocksizes packed [3, 300]
        let bytes = [0x08, 0x02, 0x22, 0x03, 0x03, 0xac, 0x02];
        let data = UnixFsData::decode(&bytes).unwrap();
        assert_eq!(data.data_type, DataType::File);
        assert_eq!(data.blocksizes, vec![3, 300]);
    }

    #[test]
    fn test_unknown_unixfs_fields_are_skipped() {
        // Type=File, mode (field 7) = 0o644, fixed64 field 9
        let mut bytes = vec![0x08, 0x02, 0x38, 0xa4, 0x03, 0x49];
        bytes.extend_from_slice(&[0u8; 8]);
        let data = UnixFsData::decode(&bytes).unwrap();
        assert_eq!(data.data_type, DataType::File);
    }

    #[test]
    fn test_missing_type_is_an_error() {
        assert!(UnixFsData::decode(&[0x18, 0x05]).is_err());
    }

    #[test]
    fn test_truncated_node() {
        let node = PbNode {
            links: vec![],
            data: Some(vec![1, 2, 3, 4]),
        };
        let encoded = node.encode();
        assert!(PbNode::decode(&encoded[..encoded.len() - 1]).is_err());
    }
}
