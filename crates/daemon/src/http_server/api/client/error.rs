use reqwest::StatusCode;

use common::prelude::ErrorEnvelope;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
    #[error("HTTP status {0}: {1}")]
    HttpStatus(StatusCode, String),
    /// The daemon answered with an error envelope
    #[error("{}: {}", .envelope.name, .envelope.message)]
    Tool {
        status: StatusCode,
        envelope: ErrorEnvelope,
    },
}

impl ApiError {
    pub fn envelope(&self) -> Option<&ErrorEnvelope> {
        match self {
            ApiError::Tool { envelope, .. } => Some(envelope),
            _ => None,
        }
    }
}
