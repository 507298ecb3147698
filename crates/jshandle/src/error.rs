//! Error taxonomy for handle operations
//!
//! Flat enum, one variant per failure a caller can act on. Protocol errors
//! that mean "the context is gone" are folded into `ContextDestroyed` at the
//! point where they are received.

use std::time::Duration;
use thiserror::Error;

use crate::cdp::CdpError;
use dom::DomError;

pub type Result<T> = std::result::Result<T, HandleError>;

#[derive(Error, Debug)]
pub enum HandleError {
    #[error("Execution context was destroyed, most likely because of a navigation")]
    ContextDestroyed,

    #[error("Handle is disposed")]
    HandleDisposed,

    #[error("Node is either not clickable or not an HTMLElement")]
    NotClickable,

    #[error("Unsupported xpath expression: {0}")]
    UnsupportedExpression(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Operation unsupported in this environment: {0}")]
    EnvironmentUnsupported(String),

    #[error("Value is not serializable: {0}")]
    NotSerializable(String),

    #[error("{0}")]
    DetachedElement(String),

    #[error("Frame backing this element is gone")]
    StaleFrame,

    #[error("Failed to find element matching selector \"{0}\"")]
    ElementNotFound(String),

    #[error("Evaluation failed: {0}")]
    Evaluation(String),

    #[error("Waiting failed: {0:?} exceeded")]
    Timeout(Duration),

    #[error("Assertion failed: {0}")]
    Assertion(String),

    #[error("CDP error: {0}")]
    Cdp(#[from] CdpError),

    #[error("DOM error: {0}")]
    Dom(DomError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HandleError {
    /// Whether the failure means the handle or its context can no longer be used
    pub fn is_context_destroyed(&self) -> bool {
        matches!(self, Self::ContextDestroyed | Self::HandleDisposed)
    }
}

impl From<DomError> for HandleError {
    fn from(err: DomError) -> Self {
        match err {
            DomError::NotSerializable(msg) => Self::NotSerializable(msg),
            other => Self::Dom(other),
        }
    }
}
