use std::io;
use std::path::PathBuf;

/// Errors produced by the persistence gateway.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error in {path}: {reason}")]
    Serialization { path: PathBuf, reason: String },

    /// An I/O operation exceeded the configured timeout.
    #[error("{operation} timed out after {after_ms}ms")]
    Timeout { operation: String, after_ms: u64 },

    /// The store was shut down and accepts no more writes.
    #[error("document store is shut down")]
    ShutDown,

    /// The document was deleted and accepts no more writes.
    #[error("document {0} was deleted")]
    Deleted(String),

    /// The writer task ended before answering.
    #[error("writer for {0} stopped before completing the request")]
    WriterGone(String),
}

pub type PersistResult<T> = std::result::Result<T, PersistError>;
