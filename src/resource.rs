//! Backend resource types and file-handle descriptors.

use serde::{Deserialize, Serialize};

/// Kind of a backend resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Regular file
    File,
    /// Folder/directory
    Folder,
}

impl ResourceKind {
    /// Check if this kind is a container (can have children).
    pub fn is_container(&self) -> bool {
        matches!(self, ResourceKind::Folder)
    }
}

/// A backend object (file or folder) identified opaquely.
///
/// Resources are created transiently while walking a path's name
/// segments to a backend identifier; they are never cached by the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// Backend-opaque identifier
    pub id: String,
    /// Resource name (one path segment)
    pub name: String,
    /// File or folder
    pub kind: ResourceKind,
    /// Size in bytes (0 for folders)
    pub size: u64,
}

impl Resource {
    /// Check if this resource is a file.
    pub fn is_file(&self) -> bool {
        self.kind == ResourceKind::File
    }

    /// Check if this resource is a folder.
    pub fn is_folder(&self) -> bool {
        self.kind.is_container()
    }
}

/// One entry of a directory listing, as reported by the listing
/// capability and consumed by the polling watch engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Entry name (one path segment)
    pub name: String,
    /// Last-modified time (Unix epoch seconds)
    pub modified: i64,
}

/// Describes whether a path currently maps to an existing remote object.
///
/// Produced by path resolution before a channel opens. A successful
/// write replaces the id and size wholesale, since remote writes can
/// mint a new object version with a new identifier.
#[derive(Debug, Clone)]
pub struct FileHandleInfo {
    /// Final name segment of the path
    pub name: String,
    /// Backend id of the existing object, if present
    pub id: Option<String>,
    /// Backend id of the parent folder, if it was resolved
    pub parent_id: Option<String>,
    /// Current remote size in bytes
    pub size: u64,
    /// Whether the path maps to an existing remote object
    pub present: bool,
}

/// What an upload capability reports back after a successful transfer.
#[derive(Debug, Clone)]
pub struct ObjectInfo {
    /// Backend id of the (possibly new) object version
    pub id: String,
    /// Object name
    pub name: String,
    /// Committed size in bytes
    pub size: u64,
}

/// Basic attributes of a remote object, as reported by `read_attributes`.
#[derive(Debug, Clone)]
pub struct Attributes {
    /// Object name
    pub name: String,
    /// Backend-opaque identifier
    pub id: String,
    /// File or folder
    pub kind: ResourceKind,
    /// Size in bytes (0 for folders)
    pub size: u64,
}
