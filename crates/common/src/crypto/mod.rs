//! Signing identity for the agent
//!
//! The storage network only ever asks an agent for three things: its
//! `did:key` identifier, a signature over some payload, and a way to
//! check one. [`Identity`] is exactly that surface, and
//! [`Ed25519Signer`] is the one implementation we ship.
//!
//! # Key format
//!
//! Private keys travel as multibase `M` (padded base64) text of
//!  `varint(0x1300) || secret (32) || varint(0xed) || public (32)`,
//!  the form produced by `w3s keygen`.

mod keys;

pub use ed25519_dalek::Signature;
pub use keys::{Ed25519Signer, IdentityError, PRIVATE_KEY_SIZE, PUBLIC_KEY_SIZE};

/// The narrow capability the pipelines need from a signer.
pub trait Identity: std::fmt::Debug + Send + Sync {
    /// `did:key:z...` identifier of this agent
    fn did(&self) -> String;

    fn sign(&self, payload: &[u8]) -> Signature;

    fn verify(&self, payload: &[u8], signature: &Signature) -> bool;
}
