use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Why a webhook delivery was refused. Each variant maps to one HTTP status.
#[derive(Debug, thiserror::Error)]
pub enum Rejection {
    #[error("Endpoint Not Registered")]
    UnknownEndpoint,

    #[error("Invalid Signature")]
    InvalidSignature,

    #[error("Missing Event Header")]
    MissingEvent,

    #[error("Unsupported Event: {0}")]
    UnsupportedEvent(String),

    #[error("Missing Payload")]
    MissingPayload,

    #[error("Invalid JSON Payload")]
    InvalidJson(#[source] serde_json::Error),
}

impl Rejection {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::UnknownEndpoint => StatusCode::NOT_FOUND,
            Self::InvalidSignature => StatusCode::FORBIDDEN,
            Self::MissingEvent
            | Self::UnsupportedEvent(_)
            | Self::MissingPayload
            | Self::InvalidJson(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}
