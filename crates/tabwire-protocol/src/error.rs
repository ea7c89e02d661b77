//! Protocol client error types.

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

/// Errors raised by the remote debugging client.
#[derive(Debug, Error)]
pub enum CdpError {
    /// Failed to open the debugging socket.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// WebSocket read or write error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// The socket carrying the request is gone.
    #[error("Connection closed")]
    ConnectionClosed,

    /// HTTP error (for endpoint discovery).
    #[error("HTTP error: {0}")]
    Http(String),

    /// The browser answered with an `error` reply.
    #[error("CDP error: {message} (code: {code})")]
    Protocol {
        code: i64,
        message: String,
        data: Option<String>,
        /// The untouched `error` object from the reply frame.
        raw: Value,
    },

    /// A `result` or `params` payload did not match its decoder.
    #[error("Failed to decode {method}: {message}")]
    Decode { method: String, message: String },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Client-side deadline elapsed before a reply arrived.
    #[error("Timeout: {method} did not reply within {timeout:?}")]
    Timeout { method: String, timeout: Duration },

    /// `create_session` called while a session is attached or attaching.
    #[error("Session already attached")]
    AlreadyAttached,

    /// Target-scoped command sent with no attached session.
    #[error("Session not attached")]
    NotAttached,

    /// No attachable page target.
    #[error("No page target found")]
    NoTargetFound,

    /// Invalid response.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl CdpError {
    /// Build a protocol error from the `error` object of a reply frame.
    pub fn from_error_payload(raw: Value) -> Self {
        let code = raw.get("code").and_then(Value::as_i64).unwrap_or_default();
        let message = raw
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown protocol error")
            .to_string();
        let data = raw.get("data").map(|d| match d.as_str() {
            Some(s) => s.to_string(),
            None => d.to_string(),
        });

        CdpError::Protocol {
            code,
            message,
            data,
            raw,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, CdpError::Timeout { .. })
    }
}
