use thiserror::Error;

/// Errors that can occur while talking to the remote test-run API.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("API returned error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl From<reqwest::Error> for ReportError {
    fn from(err: reqwest::Error) -> Self {
        ReportError::Network(err.to_string())
    }
}
