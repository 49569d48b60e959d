use std::sync::Arc;

use axum::extract::FromRef;

use crate::ServiceState;

#[derive(Debug, thiserror::Error)]
pub enum DataSourceError {
    #[error("service is shutting down")]
    ShuttingDown,
}

/// Something the readiness probe can ask about.
#[async_trait::async_trait]
pub trait Readiness: Send + Sync {
    async fn is_ready(&self) -> Result<(), DataSourceError>;
}

#[async_trait::async_trait]
impl Readiness for ServiceState {
    async fn is_ready(&self) -> Result<(), DataSourceError> {
        if self.shutdown().is_cancelled() {
            return Err(DataSourceError::ShuttingDown);
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct StateDataSource(Arc<dyn Readiness>);

impl StateDataSource {
    pub fn new(source: Arc<dyn Readiness>) -> Self {
        Self(source)
    }

    pub async fn is_ready(&self) -> Result<(), DataSourceError> {
        self.0.is_ready().await
    }
}

impl std::fmt::Debug for StateDataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StateDataSource")
    }
}

impl FromRef<ServiceState> for StateDataSource {
    fn from_ref(state: &ServiceState) -> Self {
        Self::new(Arc::new(state.clone()))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub enum MockReadiness {
        Ready,
        ShuttingDown,
    }

    #[async_trait::async_trait]
    impl Readiness for MockReadiness {
        async fn is_ready(&self) -> Result<(), DataSourceError> {
            match self {
                MockReadiness::Ready => Ok(()),
                MockReadiness::ShuttingDown => Err(DataSourceError::ShuttingDown),
            }
        }
    }
}
