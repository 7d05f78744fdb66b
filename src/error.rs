//! Error types for the cloudfs library.

use thiserror::Error;

/// Main error type for cloudfs operations.
#[derive(Error, Debug)]
pub enum CloudFsError {
    /// A resource (or its parent) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Creation conflict: the target already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Malformed input: bad path text, negative seek, empty names.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation is not supported by this core (e.g. truncate).
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    /// Relativize/compare across paths whose roots differ.
    #[error("paths have incompatible roots")]
    IncompatibleRoots,

    /// A path from a different backend was passed to this filesystem.
    #[error("path belongs to a different filesystem")]
    IncompatiblePathType,

    /// The watch service has been closed.
    #[error("watch service is closed")]
    ClosedService,

    /// The watch key has been cancelled or its service closed.
    #[error("watch key is no longer valid")]
    InvalidKey,

    /// The channel has been closed.
    #[error("channel is closed")]
    ClosedChannel,

    /// Network/transport failure during a range read, upload, or commit.
    #[error("transfer failed: {0}")]
    Transfer(String),
}

/// Result type alias for cloudfs operations.
pub type Result<T> = std::result::Result<T, CloudFsError>;
