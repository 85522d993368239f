use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("invalid master endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("invalid client config: {0}")]
    Config(String),

    #[error("http request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{method} {url} failed with status {status}")]
    UnexpectedStatus {
        method: String,
        url: String,
        status: u16,
    },

    #[error("bad reply from {url}: {reason}")]
    Malformed { url: String, reason: String },
}

impl ClientError {
    /// HTTP status of a rejected request, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::UnexpectedStatus { status, .. } => Some(*status),
            ClientError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
