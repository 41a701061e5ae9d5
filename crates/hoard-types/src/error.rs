use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("unknown item category: {0}")]
    UnknownCategory(String),

    #[error("unknown permission level: {0}")]
    UnknownPermission(String),
}
