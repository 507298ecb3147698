//! CDP Session - the RPC capability every handle calls into
//!
//! Design: a trait seam instead of a concrete client. Sessions are shared by
//! all execution contexts and handles derived from one browser connection;
//! handles only borrow them through an `Arc`.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CdpError {
    #[error("CDP protocol error: {code} - {message}")]
    Protocol { code: i64, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Request timeout")]
    Timeout,

    #[error("Connection closed")]
    Closed,
}

impl CdpError {
    /// Convenience constructor for the generic server error code
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            code: -32000,
            message: message.into(),
        }
    }

    /// Protocol error message, if this is a protocol error
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Protocol { message, .. } => Some(message),
            _ => None,
        }
    }
}

/// Result type for CDP operations
pub type Result<T> = std::result::Result<T, CdpError>;

/// A target-bound session able to issue protocol commands
///
/// Fail fast - no retries, no queuing. Retry policy belongs to whoever
/// implements the transport.
#[async_trait]
pub trait CdpSession: Send + Sync {
    /// Send a command and wait for its result payload
    async fn send(&self, method: &str, params: Option<Value>) -> Result<Value>;
}
