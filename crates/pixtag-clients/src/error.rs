//! Errors shared by the remote API clients

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl ClientError {
    /// True when the remote answered but the payload was unusable
    pub fn is_malformed(&self) -> bool {
        matches!(self, ClientError::Malformed(_))
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::Malformed(e.to_string())
    }
}
