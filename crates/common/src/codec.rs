use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use futures::{Stream, TryStreamExt};

use crate::linked_data::multibase::{self, Base};

/// Leading character of self-describing (multibase) base64
pub const MULTIBASE_BASE64_PREFIX: char = 'm';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Base64Mode {
    /// Plain RFC 4648 base64 with padding
    #[default]
    Standard,
    /// Multibase base64: `m` followed by unpadded base64
    Multiformat,
}

impl Base64Mode {
    pub fn from_flag(use_multiformat: bool) -> Self {
        if use_multiformat {
            Base64Mode::Multiformat
        } else {
            Base64Mode::Standard
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Invalid base64 format")]
    InvalidBase64,
}

/// Strip a `data:<mime>;base64,` prefix if there is one.
pub fn strip_data_url(text: &str) -> &str {
    text.strip_prefix("data:")
        .and_then(|rest| rest.find(";base64,").map(|idx| &rest[idx + ";base64,".len()..]))
        .unwrap_or(text)
}

/// Decode base64 text of either flavour.
///
/// Canonical padded standard base64 wins, so plain text that happens to
///  start with `m` keeps its meaning. Anything else is read as
///  self-describing base64, adding the `m` marker when the caller left it
///  off.
///
/// Self-describing text whose payload length is 2 mod 3 is also valid
///  standard base64 and decodes as such; use [`decode_as`] when the mode
///  is known.
pub fn decode(text: &str) -> Result<Vec<u8>, CodecError> {
    let cleaned = strip_data_url(text);

    if let Ok(bytes) = decode_standard(cleaned) {
        return Ok(bytes);
    }

    let candidate = if cleaned.starts_with(MULTIBASE_BASE64_PREFIX) {
        cleaned.to_string()
    } else {
        format!("{}{}", MULTIBASE_BASE64_PREFIX, cleaned)
    };
    match multibase::decode(&candidate) {
        Ok((Base::Base64, bytes)) => Ok(bytes),
        _ => Err(CodecError::InvalidBase64),
    }
}

/// Decode text known to be in `mode`, without guessing.
pub fn decode_as(text: &str, mode: Base64Mode) -> Result<Vec<u8>, CodecError> {
    let cleaned = strip_data_url(text);
    match mode {
        Base64Mode::Standard => decode_standard(cleaned),
        Base64Mode::Multiformat => match multibase::decode(cleaned) {
            Ok((Base::Base64, bytes)) => Ok(bytes),
            _ => Err(CodecError::InvalidBase64),
        },
    }
}

fn decode_standard(cleaned: &str) -> Result<Vec<u8>, CodecError> {
    let bytes = STANDARD
        .decode(cleaned)
        .map_err(|_| CodecError::InvalidBase64)?;
    if STANDARD.encode(&bytes) != cleaned {
        return Err(CodecError::InvalidBase64);
    }
    Ok(bytes)
}

pub fn encode(bytes: &[u8], mode: Base64Mode) -> String {
    match mode {
        Base64Mode::Standard => STANDARD.encode(bytes),
        Base64Mode::Multiformat => multibase::encode(Base::Base64, bytes),
    }
}

/// Drain `stream` into one buffer and encode it.
///
/// The whole stream is held in memory; callers are expected to bound
///  what they feed in.
pub async fn stream_to_text<S, E>(stream: S, mode: Base64Mode) -> Result<String, E>
where
    S: Stream<Item = Result<Bytes, E>>,
{
    let buffer = stream
        .try_fold(Vec::new(), |mut buffer, chunk| async move {
            buffer.extend_from_slice(&chunk);
            Ok(buffer)
        })
        .await?;
    Ok(encode(&buffer, mode))
}
