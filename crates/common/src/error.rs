use serde::{Deserialize, Serialize};

use crate::codec::CodecError;
use crate::config::ConfigError;
use crate::delegation::DelegationError;
use crate::linked_data::CarError;
use crate::network::NetworkError;
use crate::resource::ResourceError;
use crate::unixfs::UnixFsError;

/// Everything an upload or retrieval can fail with.
///
/// Component errors fold into one of these at the pipeline boundary;
///  anything we cannot classify becomes [`PipelineError::Unknown`].
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Path(#[from] ResourceError),
    #[error(transparent)]
    Delegation(#[from] DelegationError),
    #[error("{0}")]
    Config(String),
    #[error("HTTP error {status}: {status_text}")]
    Http { status: u16, status_text: String },
    #[error("operation aborted")]
    Aborted,
    #[error("{0}")]
    Format(String),
    #[error("{0}")]
    Transport(String),
    #[error("{0}")]
    Content(String),
    #[error("unknown error")]
    Unknown { cause: Option<String> },
}

/// Error shape handed back to callers: `{name, message, cause}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub name: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl PipelineError {
    pub fn not_initialized() -> Self {
        PipelineError::Config("client not initialized".to_string())
    }

    pub fn unknown(cause: impl ToString) -> Self {
        PipelineError::Unknown {
            cause: Some(cause.to_string()),
        }
    }

    /// Stable name for the error class
    pub fn name(&self) -> &'static str {
        match self {
            PipelineError::Path(_) => "PathParseError",
            PipelineError::Delegation(_) => "DelegationError",
            PipelineError::Config(_) => "ConfigError",
            PipelineError::Http { .. } => "HttpError",
            PipelineError::Aborted => "AbortError",
            PipelineError::Format(_) => "FormatError",
            PipelineError::Transport(_) => "TransportError",
            PipelineError::Content(_) => "ContentError",
            PipelineError::Unknown { .. } => "UnknownError",
        }
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        let cause = match self {
            PipelineError::Path(e) => Some(e.input.clone()),
            PipelineError::Http { status, .. } => Some(status.to_string()),
            PipelineError::Unknown { cause } => cause.clone(),
            _ => None,
        };
        ErrorEnvelope {
            name: self.name().to_string(),
            message: self.to_string(),
            cause,
        }
    }

    /// Classify an opaque error, keeping any structure it still carries.
    pub fn normalize(error: anyhow::Error) -> Self {
        let error = match error.downcast::<PipelineError>() {
            Ok(e) => return e,
            Err(error) => error,
        };
        let error = match error.downcast::<NetworkError>() {
            Ok(e) => return e.into(),
            Err(error) => error,
        };
        let error = match error.downcast::<ResourceError>() {
            Ok(e) => return e.into(),
            Err(error) => error,
        };
        let error = match error.downcast::<DelegationError>() {
            Ok(e) => return e.into(),
            Err(error) => error,
        };
        let error = match error.downcast::<UnixFsError>() {
            Ok(e) => return e.into(),
            Err(error) => error,
        };
        let error = match error.downcast::<CodecError>() {
            Ok(e) => return e.into(),
            Err(error) => error,
        };
        PipelineError::unknown(format!("{:#}", error))
    }
}

impl From<CodecError> for PipelineError {
    fn from(e: CodecError) -> Self {
        PipelineError::Format(e.to_string())
    }
}

impl From<ConfigError> for PipelineError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::Delegation(e) => PipelineError::Delegation(e),
            other => PipelineError::Config(other.to_string()),
        }
    }
}

impl From<CarError> for PipelineError {
    fn from(e: CarError) -> Self {
        PipelineError::Content(e.to_string())
    }
}

impl From<UnixFsError> for PipelineError {
    fn from(e: UnixFsError) -> Self {
        let message = e.to_string();
        match e {
            UnixFsError::InvalidName(_) => PipelineError::Format(message),
            _ => PipelineError::Content(message),
        }
    }
}

impl From<NetworkError> for PipelineError {
    fn from(e: NetworkError) -> Self {
        match e {
            NetworkError::Transport(message) => PipelineError::Transport(message),
            NetworkError::Aborted => PipelineError::Aborted,
            NetworkError::Unauthorized(message) => {
                PipelineError::Delegation(DelegationError::Rejected(message))
            }
            NetworkError::Other(error) => PipelineError::normalize(error),
        }
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(e: reqwest::Error) -> Self {
        PipelineError::Transport(e.to_string())
    }
}

impl From<tokio::task::JoinError> for PipelineError {
    fn from(e: tokio::task::JoinError) -> Self {
        PipelineError::unknown(e)
    }
}

impl From<anyhow::Error> for PipelineError {
    fn from(e: anyhow::Error) -> Self {
        PipelineError::normalize(e)
    }
}
