//! Backend-agnostic core for filesystems over remote storage services.
//!
//! The crate separates *what a storage service can do* (the capability
//! traits in [`backend`]) from *how filesystem semantics are built on
//! top of it*: an immutable path algebra, a resource tree walker, a
//! seekable byte channel over range downloads and size-tiered uploads,
//! and a polling change-notification engine.
//!
//! # Features
//!
//! * Immutable, normalizing remote paths ([`CloudPath`])
//! * Name-by-name resolution against the remote tree ([`walker`])
//! * Seekable read/write channels without local spooling
//!   ([`RemoteChannel`])
//! * Emulated directory watching with event coalescing
//!   ([`PollingWatchService`])
//! * A uniform filesystem facade over any backend
//!   ([`CloudFileSystem`])
//!
//! # Example
//!
//! ```
//! use cloudfs::{CloudPath, PathContext};
//!
//! let ctx = PathContext::new("demo://store", "/home/alice");
//! let path = CloudPath::parse(&ctx, "docs/../notes.txt").unwrap();
//! assert_eq!(path.to_absolute().to_string(), "/home/alice/notes.txt");
//! ```

pub mod backend;
pub mod channel;
pub mod config;
pub mod error;
pub mod fs;
pub mod path;
pub mod resource;
pub mod walker;
pub mod watch;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{
    ListingBackend, MutationBackend, StorageBackend, TransferBackend, TreeBackend, UploadSession,
    UploadTarget,
};
pub use channel::{RemoteChannel, CHUNKED_UPLOAD_THRESHOLD};
pub use config::CloudFsConfig;
pub use error::{CloudFsError, Result};
pub use fs::{CloudFileSystem, OpenMode};
pub use path::{CloudPath, PathContext};
pub use resource::{
    Attributes, DirectoryEntry, FileHandleInfo, ObjectInfo, Resource, ResourceKind,
};
pub use watch::{EventKind, PollingWatchService, WatchEvent, WatchKey};
