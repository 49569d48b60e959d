use std::sync::Arc;

use url::Url;

use crate::crypto::Identity;
use crate::delegation::{self, Delegation, DelegationError};

/// Default cap on a single decoded upload, 100 MiB
pub const DEFAULT_MAX_FILE_SIZE: usize = 100 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid gateway url {0:?}: {1}")]
    GatewayUrl(String, url::ParseError),
    #[error(transparent)]
    Delegation(#[from] DelegationError),
}

/// Process-wide defaults, read-only once loaded.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub identity: Arc<dyn Identity>,
    pub delegation: Option<Delegation>,
    pub gateway_url: Url,
    pub max_file_size: usize,
}

/// Per-call replacements for parts of a [`Configuration`].
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub delegation: Option<String>,
    pub gateway_url: Option<String>,
}

impl Configuration {
    pub fn new(identity: Arc<dyn Identity>, gateway_url: Url) -> Self {
        Self {
            identity,
            delegation: None,
            gateway_url,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }

    pub fn with_delegation(mut self, delegation: Delegation) -> Self {
        self.delegation = Some(delegation);
        self
    }

    pub fn with_max_file_size(mut self, max_file_size: usize) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    /// Derive the configuration for a single call.
    ///
    /// A request delegation replaces the default outright; the shared
    ///  value is never touched.
    pub fn with_overrides(&self, overrides: &Overrides) -> Result<Self, ConfigError> {
        let mut derived = self.clone();

        // having neither is left for the upload client to report
        derived.delegation = match delegation::resolve(
            overrides.delegation.as_deref(),
            self.delegation.as_ref(),
        ) {
            Ok(resolved) => Some(resolved),
            Err(DelegationError::Required) => None,
            Err(e) => return Err(e.into()),
        };

        if let Some(raw) = overrides
            .gateway_url
            .as_deref()
            .filter(|raw| !raw.trim().is_empty())
        {
            derived.gateway_url =
                Url::parse(raw.trim()).map_err(|e| ConfigError::GatewayUrl(raw.to_string(), e))?;
        }

        Ok(derived)
    }

    /// The gateway address without a trailing slash
    pub fn gateway_base(&self) -> &str {
        self.gateway_url.as_str().trim_end_matches('/')
    }
}
