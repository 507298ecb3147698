//! Error types for remote value decoding and geometry
//!
//! Simple, flat error hierarchy. No over-engineering.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DomError>;

#[derive(Debug, Error)]
pub enum DomError {
    #[error("Invalid quad: expected 8 coordinates, got {0}")]
    InvalidQuad(usize),

    #[error("Value is not serializable: {0}")]
    NotSerializable(String),
}
