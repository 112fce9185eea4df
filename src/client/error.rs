//! Client Error Types
//!
//! Failures surfaced by the session socket, the connection state machine,
//! and the REST write path. Transport problems are surfaced as state, not
//! panics; everything here is recoverable except an exhausted reconnect
//! budget, which the state machine reports through its own state enum.

use thiserror::Error;

/// Client-side error type
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport failure: refused connection, abnormal close, broken pipe
    #[error("transport error: {0}")]
    Transport(String),

    /// The transport did not open within the configured timeout
    #[error("connect timeout")]
    ConnectTimeout,

    /// The server refused the request on authorization grounds
    #[error("denied: {0}")]
    Denied(String),

    /// The entity does not exist (locally or on the server)
    #[error("not found")]
    NotFound,

    /// Non-success REST response that is not a denial
    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Encoding or decoding failure
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::ConnectTimeout
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Serialization(err.to_string())
    }
}
