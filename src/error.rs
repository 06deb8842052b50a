use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Upstream answered with a non-200 status. Error codes go back to the client
    /// as-is; anything outside 4xx/5xx becomes 502.
    #[error("upstream returned {status}")]
    Upstream { status: u16 },

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("upstream body is not valid json: {0}")]
    Decode(String),
}

impl GatewayError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn network(err: impl std::fmt::Display) -> Self {
        Self::Network(err.to_string())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Upstream { status } => StatusCode::from_u16(*status)
                .ok()
                .filter(|code| code.is_client_error() || code.is_server_error())
                .unwrap_or(StatusCode::BAD_GATEWAY),
            Self::Network(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Decode(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Upstream { .. } => "upstream_error",
            Self::Network(_) => "network_error",
            Self::Validation(_) => "validation_error",
            Self::Decode(_) => "decode_error",
        }
    }

    fn detail(&self) -> String {
        match self {
            Self::Upstream { .. } => "Source error".to_owned(),
            Self::Network(_) => "Network error".to_owned(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = serde_json::json!({
            "status": status.as_u16(),
            "error": self.kind(),
            "detail": self.detail(),
        });
        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
