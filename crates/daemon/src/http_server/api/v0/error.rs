use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use common::delegation::DelegationError;
use common::prelude::{ErrorEnvelope, PipelineError};

/// Wire shape of every failed tool call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorEnvelope,
}

/// A pipeline failure on its way out of a handler.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ToolError(#[from] PipelineError);

impl ToolError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            PipelineError::Path(_) | PipelineError::Format(_) | PipelineError::Config(_) => {
                StatusCode::BAD_REQUEST
            }
            PipelineError::Delegation(DelegationError::Required) => StatusCode::UNAUTHORIZED,
            PipelineError::Delegation(DelegationError::Rejected(_)) => StatusCode::FORBIDDEN,
            PipelineError::Delegation(_) => StatusCode::BAD_REQUEST,
            PipelineError::Http { .. }
            | PipelineError::Transport(_)
            | PipelineError::Content(_) => StatusCode::BAD_GATEWAY,
            PipelineError::Aborted => StatusCode::SERVICE_UNAVAILABLE,
            PipelineError::Unknown { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for ToolError {
    fn from(rejection: JsonRejection) -> Self {
        ToolError(PipelineError::Format(rejection.body_text()))
    }
}

impl IntoResponse for ToolError {
    fn into_response(self) -> Response {
        let status = self.status();
        let envelope = self.0.envelope();
        if status.is_server_error() {
            tracing::error!(name = %envelope.name, message = %envelope.message, cause = ?envelope.cause, "tool call failed");
        } else {
            tracing::warn!(name = %envelope.name, message = %envelope.message, "tool call rejected");
        }
        (status, Json(ErrorBody { error: envelope })).into_response()
    }
}
