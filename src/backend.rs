//! Capability traits a storage backend supplies to plug into the core.
//!
//! These are abstract transfer and tree primitives, not wire formats:
//! authentication, REST/SSH plumbing and retry policy all live behind
//! these traits, in the backend implementation.

use async_trait::async_trait;

use crate::error::Result;
use crate::path::CloudPath;
use crate::resource::{DirectoryEntry, ObjectInfo, Resource};

/// Where an upload lands: a brand-new child of a folder, or a new
/// version of an existing object.
#[derive(Debug, Clone)]
pub enum UploadTarget {
    /// Create a new object under this parent folder.
    NewChild {
        /// Backend id of the parent folder
        parent_id: String,
    },
    /// Upload a new version of this existing object.
    Existing {
        /// Backend id of the existing object
        id: String,
    },
}

/// Minimal "get root / list children" capability driving the tree walker.
#[async_trait]
pub trait TreeBackend: Send + Sync {
    /// The root resource of the backend.
    async fn root(&self) -> Result<Resource>;

    /// Direct children of a folder resource (name and kind at minimum).
    async fn children(&self, folder: &Resource) -> Result<Vec<Resource>>;
}

/// Range-limited download and size-tiered upload primitives.
#[async_trait]
pub trait TransferBackend: Send + Sync {
    /// Download the inclusive byte range `[start, end]` of an object.
    async fn download_range(&self, id: &str, start: u64, end: u64) -> Result<Vec<u8>>;

    /// Upload a whole payload in one request.
    async fn upload_single_shot(
        &self,
        target: &UploadTarget,
        name: &str,
        data: &[u8],
    ) -> Result<ObjectInfo>;

    /// Open a chunked upload session sized to the payload.
    async fn open_upload_session(
        &self,
        target: &UploadTarget,
        name: &str,
        total_size: u64,
    ) -> Result<Box<dyn UploadSession>>;
}

/// A chunked upload in progress: parts are transferred at the session's
/// part size, then the session is committed with an integrity digest of
/// the full payload.
#[async_trait]
pub trait UploadSession: Send {
    /// Part size dictated by the backend for this session. Every part
    /// except the last must be exactly this long.
    fn part_size(&self) -> u64;

    /// Upload one part starting at `offset` into the payload.
    async fn upload_part(&mut self, data: &[u8], offset: u64) -> Result<()>;

    /// Commit the session with the SHA-256 digest of the full payload.
    /// A rejected commit fails the upload; no partial state survives.
    async fn commit(self: Box<Self>, digest: &[u8]) -> Result<ObjectInfo>;
}

/// Directory-listing capability used by the polling watch engine to
/// snapshot a directory.
#[async_trait]
pub trait ListingBackend: Send + Sync {
    /// Names and last-modified times of a directory's entries.
    async fn list_directory(&self, dir: &CloudPath) -> Result<Vec<DirectoryEntry>>;
}

/// Structural mutations used by the consumer-facing surface.
#[async_trait]
pub trait MutationBackend: Send + Sync {
    /// Create a folder under a parent.
    async fn create_folder(&self, parent_id: &str, name: &str) -> Result<Resource>;

    /// Delete an object.
    async fn delete(&self, id: &str) -> Result<()>;

    /// Copy an object into a destination folder under a new name.
    async fn copy(&self, id: &str, dest_parent_id: &str, name: &str) -> Result<Resource>;

    /// Move an object into a destination folder under a new name.
    async fn move_to(&self, id: &str, dest_parent_id: &str, name: &str) -> Result<Resource>;
}

/// The full capability set a backend implements to drive every
/// operation of the consumer surface.
pub trait StorageBackend: TreeBackend + TransferBackend + ListingBackend + MutationBackend {}

impl<T> StorageBackend for T where
    T: TreeBackend + TransferBackend + ListingBackend + MutationBackend
{
}
