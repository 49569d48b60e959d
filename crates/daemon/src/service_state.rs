use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use common::delegation::{self, DelegationError};
use common::prelude::{Configuration, LocalNetwork, Tools};

use crate::ServiceConfig;

/// Shared state behind every handler.
///
/// Cloning is cheap; all clones see the same network and the same
///  shutdown token.
#[derive(Debug, Clone)]
pub struct State {
    tools: Tools,
    network: LocalNetwork,
    shutdown: CancellationToken,
}

impl State {
    pub async fn from_config(config: &ServiceConfig) -> Result<Self, StateSetupError> {
        let gateway_url = config.effective_gateway_url()?;
        let mut configuration = Configuration::new(Arc::new(config.identity.clone()), gateway_url)
            .with_max_file_size(config.max_file_size);

        if let Some(raw) = config.delegation.as_deref() {
            let proof = delegation::parse(raw)?;
            tracing::info!(root = %proof.root(), "loaded default delegation");
            configuration = configuration.with_delegation(proof);
        }

        tracing::info!(
            agent = %configuration.identity.did(),
            gateway = %configuration.gateway_base(),
            "service state ready"
        );
        Ok(Self::new(configuration, LocalNetwork::new()))
    }

    pub fn new(configuration: Configuration, network: LocalNetwork) -> Self {
        let shutdown = CancellationToken::new();
        let tools = Tools::new(configuration, Arc::new(network.clone()), shutdown.clone());
        Self {
            tools,
            network,
            shutdown,
        }
    }

    pub fn tools(&self) -> &Tools {
        &self.tools
    }

    pub fn network(&self) -> &LocalNetwork {
        &self.network
    }

    /// Fires once the service begins shutting down
    pub fn shutdown(&self) -> &CancellationToken {
        &self.shutdown
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateSetupError {
    #[error("invalid gateway url: {0}")]
    GatewayUrl(#[from] url::ParseError),
    #[error("invalid default delegation: {0}")]
    Delegation(#[from] DelegationError),
}
