//! Chat error types.

use thiserror::Error;

/// Errors that can occur while talking to the chat backend.
///
/// None of these reach the user: the session answers every failure with a
/// local fallback reply.
#[derive(Debug, Error)]
pub enum ChatError {
    /// HTTP request failed before a response arrived.
    #[error("Chat request failed: {0}")]
    RequestFailed(String),

    /// The backend answered with a non-success status.
    #[error("API request failed with status {status}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body, for logs.
        body: String,
    },

    /// The response did not have the expected shape.
    #[error("Unexpected API response format: {0}")]
    UnexpectedResponse(String),

    /// Request timed out.
    #[error("Chat request timed out after {0}ms")]
    Timeout(u64),

    /// Backend is unreachable.
    #[error("Chat backend unavailable: {0}")]
    Unavailable(String),

    /// No usable credential is set.
    #[error("Chat backend is not configured")]
    NotConfigured,
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ChatError::Timeout(0)
        } else if err.is_connect() {
            ChatError::Unavailable(err.to_string())
        } else if err.is_decode() {
            ChatError::UnexpectedResponse(err.to_string())
        } else {
            ChatError::RequestFailed(err.to_string())
        }
    }
}
