use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),
    /// The vendor rejected the bearer token (HTTP 401). Callers refresh and retry.
    #[error("Access token expired: {0}")]
    TokenExpired(String),
    #[error("API request failed with status {status}: {message}")]
    Api { status: u16, message: String },
    #[error("JSON parse error: {0}")]
    JsonParse(String),
    #[error("Unexpected data shape: {0}")]
    UnexpectedShape(String),
}

impl FetchError {
    /// Only transport failures are worth retrying as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Network(_))
    }
}
