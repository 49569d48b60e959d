use std::path::PathBuf;

use url::Url;

use common::prelude::Ed25519Signer;

#[derive(Debug)]
pub struct Config {
    // identity configuration
    /// the agent key every storage session signs with
    pub identity: Ed25519Signer,
    /// default proof used when a request does not carry its own,
    ///  if not set then every upload must bring a delegation
    pub delegation: Option<String>,

    // http server configuration
    /// Port for the API server, which also hosts the local gateway
    pub api_port: u16,
    /// Gateway that retrievals and upload links point at,
    ///  if not set then the daemon's own gateway is used
    pub gateway_url: Option<Url>,
    /// Largest decoded file an upload may carry, in bytes
    pub max_file_size: usize,

    // logging
    pub log_level: tracing::Level,
    /// Directory for log files (optional, logs to stdout only if not set)
    pub log_dir: Option<PathBuf>,
}

impl Config {
    /// The gateway this daemon serves itself
    pub fn local_gateway_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&format!("http://localhost:{}", self.api_port))
    }

    pub fn effective_gateway_url(&self) -> Result<Url, url::ParseError> {
        match &self.gateway_url {
            Some(url) => Ok(url.clone()),
            None => self.local_gateway_url(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(gateway_url: Option<&str>) -> Config {
        Config {
            identity: Ed25519Signer::generate().unwrap(),
            delegation: None,
            api_port: 3001,
            gateway_url: gateway_url.map(|url| Url::parse(url).unwrap()),
            max_file_size: 1024,
            log_level: tracing::Level::INFO,
            log_dir: None,
        }
    }

    #[test]
    fn test_gateway_defaults_to_local() {
        let url = config(None).effective_gateway_url().unwrap();
        assert_eq!(url.as_str(), "http://localhost:3001/");
    }

    #[test]
    fn test_explicit_gateway_wins() {
        let url = config(Some("https://storacha.link"))
            .effective_gateway_url()
            .unwrap();
        assert_eq!(url.as_str(), "https://storacha.link/");
    }
}
