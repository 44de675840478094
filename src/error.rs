//! Error types for the widget.

use thiserror::Error;

/// Widget error type.
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed before a status was received.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Endpoint answered with a non-success status.
    #[error("HTTP error! status: {0}")]
    Status(u16),

    /// Endpoint answered 2xx but the payload carried an `error` field.
    #[error("{0}")]
    Server(String),

    /// Invalid endpoint URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Storage file could not be read or written.
    #[error("Storage error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for widget operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display_matches_transcript_text() {
        assert_eq!(Error::Status(503).to_string(), "HTTP error! status: 503");
    }

    #[test]
    fn test_server_error_is_shown_verbatim() {
        let err = Error::Server("Model overloaded".into());
        assert_eq!(err.to_string(), "Model overloaded");
    }
}
