use std::path::PathBuf;

use clap::Args;
use url::Url;

use common::config::DEFAULT_MAX_FILE_SIZE;
use common::crypto::IdentityError;
use common::prelude::Ed25519Signer;
use w3s_daemon::{spawn_service, ServiceConfig};

#[derive(Args, Debug, Clone)]
pub struct Daemon {
    /// Agent private key, multibase base64pad (see `w3s keygen`)
    #[arg(long, env = "PRIVATE_KEY", hide_env_values = true)]
    pub private_key: String,

    /// Default delegation for uploads that do not bring their own
    #[arg(long, env = "DELEGATION", hide_env_values = true)]
    pub delegation: Option<String>,

    /// Gateway to retrieve from and to link uploads to
    ///  (defaults to this daemon's own gateway)
    #[arg(long, env = "GATEWAY_URL")]
    pub gateway_url: Option<Url>,

    /// Port for the API and the local gateway
    #[arg(long, env = "API_PORT", default_value_t = 3001)]
    pub api_port: u16,

    /// Largest file an upload may carry, in bytes
    #[arg(long, env = "MAX_FILE_SIZE", default_value_t = DEFAULT_MAX_FILE_SIZE)]
    pub max_file_size: usize,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: tracing::Level,

    /// Directory for log files (logs to stdout only if not set)
    #[arg(long, env = "LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("invalid private key: {0}")]
    PrivateKey(#[from] IdentityError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Daemon {
    type Error = DaemonError;
    type Output = String;

    async fn execute(&self, _ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let identity = Ed25519Signer::parse(&self.private_key)?;

        let config = ServiceConfig {
            identity,
            delegation: self
                .delegation
                .clone()
                .filter(|raw| !raw.trim().is_empty()),
            api_port: self.api_port,
            gateway_url: self.gateway_url.clone(),
            max_file_size: self.max_file_size,
            log_level: self.log_level,
            log_dir: self.log_dir.clone(),
        };

        spawn_service(&config).await;
        Ok("daemon ended".to_string())
    }
}
