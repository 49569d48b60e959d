use std::fmt;

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};

use super::{Identity, Signature};
use crate::linked_data::multibase::{self, Base};
use crate::linked_data::varint;

/// Size of Ed25519 private key in bytes
pub const PRIVATE_KEY_SIZE: usize = 32;
/// Size of Ed25519 public key in bytes
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Multicodec tag in front of an exported private key
const SIGNER_CODE: u64 = 0x1300;
/// Multicodec tag for an ed25519 public key
const VERIFIER_CODE: u64 = 0xed;

const DID_KEY_PREFIX: &str = "did:key:";

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("private key is not multibase text: {0}")]
    Multibase(#[from] multibase::Error),
    #[error("unexpected key tag 0x{0:x}")]
    UnexpectedTag(u64),
    #[error("invalid key length, expected {expected}, got {got}")]
    InvalidLength { expected: usize, got: usize },
    #[error("public key does not match private key")]
    PublicKeyMismatch,
    #[error("invalid public key: {0}")]
    InvalidPublicKey(#[from] ed25519_dalek::SignatureError),
    #[error("failed to generate random bytes: {0}")]
    Random(#[from] getrandom::Error),
}

/// An Ed25519 keypair acting as the agent identity.
#[derive(Clone)]
pub struct Ed25519Signer {
    signing_key: SigningKey,
}

impl fmt::Debug for Ed25519Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ed25519Signer")
            .field("did", &self.did())
            .finish_non_exhaustive()
    }
}

impl From<[u8; PRIVATE_KEY_SIZE]> for Ed25519Signer {
    fn from(secret: [u8; PRIVATE_KEY_SIZE]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&secret),
        }
    }
}

fn read_tag(bytes: &[u8], expected: u64) -> Result<usize, IdentityError> {
    let (tag, len) = varint::decode(bytes).ok_or(IdentityError::InvalidLength {
        expected: 1,
        got: 0,
    })?;
    if tag != expected {
        return Err(IdentityError::UnexpectedTag(tag));
    }
    Ok(len)
}

impl Ed25519Signer {
    /// Generate a new random keypair using a cryptographically secure RNG
    pub fn generate() -> Result<Self, IdentityError> {
        let mut bytes = [0u8; PRIVATE_KEY_SIZE];
        getrandom::getrandom(&mut bytes)?;
        Ok(Self::from(bytes))
    }

    /// Parse an exported private key.
    ///
    /// Whitespace around the key is ignored. Any multibase encoding is
    ///  accepted, not just `M`.
    pub fn parse(text: &str) -> Result<Self, IdentityError> {
        let (_, bytes) = multibase::decode(text.trim())?;

        let mut offset = read_tag(&bytes, SIGNER_CODE)?;
        let secret = bytes
            .get(offset..offset + PRIVATE_KEY_SIZE)
            .ok_or(IdentityError::InvalidLength {
                expected: PRIVATE_KEY_SIZE,
                got: bytes.len().saturating_sub(offset),
            })?;
        let mut buff = [0u8; PRIVATE_KEY_SIZE];
        buff.copy_from_slice(secret);
        offset += PRIVATE_KEY_SIZE;

        offset += read_tag(&bytes[offset..], VERIFIER_CODE)?;
        let public = &bytes[offset..];
        if public.len() != PUBLIC_KEY_SIZE {
            return Err(IdentityError::InvalidLength {
                expected: PUBLIC_KEY_SIZE,
                got: public.len(),
            });
        }

        let signer = Self::from(buff);
        if signer.public_key() != public {
            return Err(IdentityError::PublicKeyMismatch);
        }
        Ok(signer)
    }

    /// Export the keypair in the form [`Ed25519Signer::parse`] reads.
    pub fn format(&self) -> String {
        let mut bytes = Vec::with_capacity(2 * varint::MAX_LEN + PRIVATE_KEY_SIZE + PUBLIC_KEY_SIZE);
        varint::encode(SIGNER_CODE, &mut bytes);
        bytes.extend_from_slice(&self.signing_key.to_bytes());
        varint::encode(VERIFIER_CODE, &mut bytes);
        bytes.extend_from_slice(&self.public_key());
        multibase::encode(Base::Base64Pad, bytes)
    }

    pub fn public_key(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Check a signature made by the holder of `did`.
    pub fn verify_with_did(
        did: &str,
        payload: &[u8],
        signature: &Signature,
    ) -> Result<bool, IdentityError> {
        let encoded = did.strip_prefix(DID_KEY_PREFIX).unwrap_or(did);
        let (_, bytes) = multibase::decode(encoded)?;
        let offset = read_tag(&bytes, VERIFIER_CODE)?;
        let public: [u8; PUBLIC_KEY_SIZE] =
            bytes[offset..]
                .try_into()
                .map_err(|_| IdentityError::InvalidLength {
                    expected: PUBLIC_KEY_SIZE,
                    got: bytes.len() - offset,
                })?;
        let key = VerifyingKey::from_bytes(&public)?;
        Ok(key.verify(payload, signature).is_ok())
    }
}

impl Identity for Ed25519Signer {
    fn did(&self) -> String {
        let mut bytes = Vec::with_capacity(varint::MAX_LEN + PUBLIC_KEY_SIZE);
        varint::encode(VERIFIER_CODE, &mut bytes);
        bytes.extend_from_slice(&self.public_key());
        format!("{}{}", DID_KEY_PREFIX, multibase::encode(Base::Base58Btc, bytes))
    }

    fn sign(&self, payload: &[u8]) -> Signature {
        self.signing_key.sign(payload)
    }

    fn verify(&self, payload: &[u8], signature: &Signature) -> bool {
        self.signing_key
            .verifying_key()
            .verify(payload, signature)
            .is_ok()
    }
}
