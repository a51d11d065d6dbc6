// HTTP-facing error taxonomy for the relay routes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::relay::stderr::ToolFailure;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("missing query parameter `{0}`")]
    MissingParam(&'static str),

    #[error("invalid YouTube URL or video id: {0}")]
    InvalidVideo(String),

    #[error("yt-dlp is not installed")]
    BinaryUnavailable,

    #[error("yt-dlp failed: {0}")]
    Tool(ToolFailure),

    #[error("yt-dlp produced no output within {0} seconds")]
    Timeout(u64),

    #[error("upstream request failed: {0}")]
    Upstream(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl RelayError {
    /// Recover a typed error from backend plumbing; anything else is an upstream failure.
    pub fn from_backend(err: anyhow::Error) -> Self {
        match err.downcast::<RelayError>() {
            Ok(relay) => relay,
            Err(other) => RelayError::Upstream(format!("{:#}", other)),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::MissingParam(_) | RelayError::InvalidVideo(_) => StatusCode::BAD_REQUEST,
            RelayError::BinaryUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            RelayError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            RelayError::Tool(_) | RelayError::Upstream(_) | RelayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        (
            self.status(),
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
