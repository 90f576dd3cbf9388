use reqwest::StatusCode;
use thiserror::Error;

/// Failure of a call against the backend REST API.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("backend returned {status}: {message}")]
    Status {
        status: StatusCode,
        // `error` field of the response body, empty when absent
        message: String,
    },

    #[error("unexpected response body: {0}")]
    Decode(String),

    #[error("credential is not a valid header value")]
    InvalidHeader,
}

impl ApiError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Transport(e) => e.status(),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }

    /// Text to show the user: the backend's own message when it sent one.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ApiError::Status { message, .. } if !message.trim().is_empty() => message.clone(),
            _ => fallback.to_string(),
        }
    }
}

/// Failure of the live price push connection.
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid handshake request: {0}")]
    InvalidRequest(String),

    #[error("socket.io handshake failed: {0}")]
    Handshake(String),
}
