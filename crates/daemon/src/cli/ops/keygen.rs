use clap::Args;

use common::crypto::IdentityError;
use common::prelude::{Ed25519Signer, Identity};

/// Generate a fresh agent key; runs locally without a daemon
#[derive(Args, Debug, Clone)]
pub struct Keygen;

#[async_trait::async_trait]
impl crate::cli::op::Op for Keygen {
    type Error = IdentityError;
    type Output = String;

    async fn execute(&self, _ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let signer = Ed25519Signer::generate()?;
        Ok(format!("# {}\nPRIVATE_KEY={}", signer.did(), signer.format()))
    }
}
