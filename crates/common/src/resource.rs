use std::fmt;

use serde::Serialize;
use serde_with::{serde_as, DisplayFromStr};

use crate::linked_data::Cid;

/// Prefixes accepted in front of `CID/path`, longest first.
const PREFIXES: [&str; 3] = ["ipfs://", "/ipfs/", "ipfs/"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Ipfs,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Ipfs => write!(f, "ipfs"),
        }
    }
}

/// A file addressed by a content id and a path beneath it.
///
/// `pathname` always starts with `/` and names something below the
///  root; anything after the first slash is kept verbatim.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub protocol: Protocol,
    #[serde_as(as = "DisplayFromStr")]
    pub content_id: Cid,
    pub pathname: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathErrorKind {
    MissingSeparator,
    EmptyFilename,
    InvalidContentId(String),
}

impl fmt::Display for PathErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathErrorKind::MissingSeparator => write!(f, "expected CID/filename"),
            PathErrorKind::EmptyFilename => write!(f, "filename is empty"),
            PathErrorKind::InvalidContentId(reason) => write!(f, "invalid CID: {}", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid path format: {input} ({kind})")]
pub struct ResourceError {
    pub input: String,
    pub kind: PathErrorKind,
}

impl ResourceError {
    fn new(input: &str, kind: PathErrorKind) -> Self {
        Self {
            input: input.to_string(),
            kind,
        }
    }
}

fn strip_prefix(path: &str) -> &str {
    PREFIXES
        .iter()
        .find_map(|prefix| path.strip_prefix(prefix))
        .unwrap_or(path)
}

/// Parse any of `CID/name`, `/ipfs/CID/name`, `ipfs/CID/name` or
///  `ipfs://CID/name`.
pub fn parse(path: &str) -> Result<Resource, ResourceError> {
    let rest = strip_prefix(path);

    let slash = rest
        .find('/')
        .ok_or_else(|| ResourceError::new(path, PathErrorKind::MissingSeparator))?;
    let (content_id, pathname) = rest.split_at(slash);

    if pathname.len() <= 1 {
        return Err(ResourceError::new(path, PathErrorKind::EmptyFilename));
    }

    let content_id = Cid::try_from(content_id).map_err(|e| {
        ResourceError::new(path, PathErrorKind::InvalidContentId(e.to_string()))
    })?;

    Ok(Resource {
        protocol: Protocol::Ipfs,
        content_id,
        pathname: pathname.to_string(),
    })
}

/// Strip any recognised prefixes, leaving `CID/name`. Does not validate.
pub fn normalize(path: &str) -> String {
    let mut current = path;
    loop {
        let stripped = strip_prefix(current);
        if stripped.len() == current.len() {
            return current.to_string();
        }
        current = stripped;
    }
}

impl Resource {
    /// Path used to fetch this resource from a gateway.
    pub fn gateway_path(&self) -> String {
        format!("/{}/{}{}", self.protocol, self.content_id, self.pathname)
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}{}", self.protocol, self.content_id, self.pathname)
    }
}

impl std::str::FromStr for Resource {
    type Err = ResourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}
