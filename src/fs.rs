//! Consumer-facing filesystem surface.
//!
//! `CloudFileSystem` is what generic file-I/O call sites invoke. Every
//! operation resolves its path through the tree walker first; channels
//! and watch keys receive pre-resolved handles and never resolve paths
//! themselves.

use std::sync::Arc;

use log::debug;

use crate::backend::{StorageBackend, TransferBackend};
use crate::channel::RemoteChannel;
use crate::config::CloudFsConfig;
use crate::error::{CloudFsError, Result};
use crate::path::{CloudPath, PathContext};
use crate::resource::{Attributes, FileHandleInfo, Resource};
use crate::walker;
use crate::watch::{EventKind, PollingWatchService, WatchKey};

/// How a byte channel is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// The file must exist.
    Read,
    /// An absent file is created by the first write; its parent must
    /// exist.
    Write,
}

/// Result of resolving a path to its parent folder and target resource.
struct Lookup {
    parent: Option<Resource>,
    target: Option<Resource>,
    name: String,
}

/// A filesystem over one remote storage backend.
///
/// Constructed explicitly from the backend, the path context and a
/// config; there is no global state. Cheap to share behind an `Arc`.
pub struct CloudFileSystem<B: StorageBackend + 'static> {
    backend: Arc<B>,
    ctx: Arc<PathContext>,
    config: CloudFsConfig,
}

impl<B: StorageBackend + 'static> CloudFileSystem<B> {
    /// Create a filesystem over `backend`.
    pub fn new(backend: Arc<B>, ctx: Arc<PathContext>, config: CloudFsConfig) -> Self {
        Self {
            backend,
            ctx,
            config,
        }
    }

    /// The path context of this filesystem.
    pub fn context(&self) -> &Arc<PathContext> {
        &self.ctx
    }

    /// The active configuration.
    pub fn config(&self) -> &CloudFsConfig {
        &self.config
    }

    /// Parse path text against this filesystem's context.
    pub fn path(&self, text: &str) -> Result<CloudPath> {
        CloudPath::parse(&self.ctx, text)
    }

    fn check_same_fs(&self, path: &CloudPath) -> Result<()> {
        if path.context().backend_tag() != self.ctx.backend_tag() {
            return Err(CloudFsError::IncompatiblePathType);
        }
        Ok(())
    }

    fn absolutize(&self, path: &CloudPath) -> Result<CloudPath> {
        self.check_same_fs(path)?;
        Ok(path.to_absolute())
    }

    /// Resolve a path to its backend resource, if it exists.
    pub async fn resolve(&self, path: &CloudPath) -> Result<Option<Resource>> {
        let abs = self.absolutize(path)?;
        walker::walk(&*self.backend, abs.name_components()).await
    }

    /// Resolve a path's parent folder and the resource itself.
    async fn locate(&self, abs: &CloudPath) -> Result<Lookup> {
        let segments = abs.name_components();
        let (parent, name) = match walker::walk_to_parent(&*self.backend, segments).await? {
            Some((parent, name)) => (parent, name.to_string()),
            None => {
                return Ok(Lookup {
                    parent: None,
                    target: None,
                    name: segments.last().cloned().unwrap_or_default(),
                })
            }
        };
        let target = self
            .backend
            .children(&parent)
            .await?
            .into_iter()
            .find(|child| child.name == name);
        Ok(Lookup {
            parent: Some(parent),
            target,
            name,
        })
    }

    /// Whether a path maps to an existing remote object.
    pub async fn exists(&self, path: &CloudPath) -> Result<bool> {
        Ok(self.resolve(path).await?.is_some())
    }

    /// Whether a path maps to an existing folder.
    pub async fn is_directory(&self, path: &CloudPath) -> Result<bool> {
        Ok(self
            .resolve(path)
            .await?
            .map(|r| r.is_folder())
            .unwrap_or(false))
    }

    /// Read basic attributes of an object.
    pub async fn read_attributes(&self, path: &CloudPath) -> Result<Attributes> {
        let resource = self
            .resolve(path)
            .await?
            .ok_or_else(|| CloudFsError::NotFound(path.to_string()))?;
        Ok(Attributes {
            name: resource.name,
            id: resource.id,
            kind: resource.kind,
            size: resource.size,
        })
    }

    /// Create a directory.
    ///
    /// Fails with `AlreadyExists` when the path maps to any existing
    /// object and with `NotFound` when the parent chain is missing.
    pub async fn create_dir(&self, path: &CloudPath) -> Result<()> {
        let abs = self.absolutize(path)?;
        if abs.is_root() {
            return Err(CloudFsError::AlreadyExists(abs.to_string()));
        }
        let lookup = self.locate(&abs).await?;
        if lookup.target.is_some() {
            return Err(CloudFsError::AlreadyExists(abs.to_string()));
        }
        let parent = lookup
            .parent
            .ok_or_else(|| CloudFsError::NotFound(abs.to_string()))?;
        debug!("create_dir {}", abs);
        self.backend.create_folder(&parent.id, &lookup.name).await?;
        Ok(())
    }

    /// Delete a file or directory.
    pub async fn delete(&self, path: &CloudPath) -> Result<()> {
        let abs = self.absolutize(path)?;
        let resource = self
            .resolve(&abs)
            .await?
            .ok_or_else(|| CloudFsError::NotFound(abs.to_string()))?;
        debug!("delete {}", abs);
        self.backend.delete(&resource.id).await
    }

    /// Copy an object to a new path on the same filesystem.
    pub async fn copy(&self, src: &CloudPath, dst: &CloudPath) -> Result<()> {
        let (source, parent, name) = self.prepare_transfer(src, dst).await?;
        debug!("copy {} -> {}", src, dst);
        self.backend.copy(&source.id, &parent.id, &name).await?;
        Ok(())
    }

    /// Move (or rename) an object to a new path on the same filesystem.
    pub async fn rename(&self, src: &CloudPath, dst: &CloudPath) -> Result<()> {
        let (source, parent, name) = self.prepare_transfer(src, dst).await?;
        debug!("rename {} -> {}", src, dst);
        self.backend.move_to(&source.id, &parent.id, &name).await?;
        Ok(())
    }

    /// Shared source/destination validation for copy and move.
    async fn prepare_transfer(
        &self,
        src: &CloudPath,
        dst: &CloudPath,
    ) -> Result<(Resource, Resource, String)> {
        let src_abs = self.absolutize(src)?;
        let dst_abs = self.absolutize(dst)?;
        let source = self
            .resolve(&src_abs)
            .await?
            .ok_or_else(|| CloudFsError::NotFound(src_abs.to_string()))?;
        let lookup = self.locate(&dst_abs).await?;
        if lookup.target.is_some() {
            return Err(CloudFsError::AlreadyExists(dst_abs.to_string()));
        }
        let parent = lookup
            .parent
            .ok_or_else(|| CloudFsError::NotFound(dst_abs.to_string()))?;
        Ok((source, parent, lookup.name))
    }

    /// List a directory as child paths.
    pub async fn read_dir(&self, path: &CloudPath) -> Result<Vec<CloudPath>> {
        let abs = self.absolutize(path)?;
        let resource = self
            .resolve(&abs)
            .await?
            .ok_or_else(|| CloudFsError::NotFound(abs.to_string()))?;
        if !resource.is_folder() {
            return Err(CloudFsError::InvalidArgument(format!(
                "{} is not a directory",
                abs
            )));
        }
        let mut paths = Vec::new();
        for child in self.backend.children(&resource).await? {
            paths.push(abs.resolve(&CloudPath::parse(&self.ctx, &child.name)?));
        }
        Ok(paths)
    }

    /// Open a seekable byte channel on a file path.
    ///
    /// In `Read` mode the file must exist. In `Write` mode an absent
    /// file's parent must exist; the object itself is created by the
    /// first write.
    pub async fn new_byte_channel(&self, path: &CloudPath, mode: OpenMode) -> Result<RemoteChannel> {
        let abs = self.absolutize(path)?;
        if abs.is_root() {
            return Err(CloudFsError::InvalidArgument(
                "cannot open a channel on the root".to_string(),
            ));
        }
        let lookup = self.locate(&abs).await?;
        let info = match lookup.target {
            Some(resource) => {
                if resource.is_folder() {
                    return Err(CloudFsError::InvalidArgument(format!(
                        "{} is a directory",
                        abs
                    )));
                }
                FileHandleInfo {
                    name: resource.name,
                    id: Some(resource.id),
                    parent_id: lookup.parent.map(|p| p.id),
                    size: resource.size,
                    present: true,
                }
            }
            None => {
                if mode == OpenMode::Read {
                    return Err(CloudFsError::NotFound(abs.to_string()));
                }
                let parent = lookup
                    .parent
                    .ok_or_else(|| CloudFsError::NotFound(abs.to_string()))?;
                FileHandleInfo {
                    name: lookup.name,
                    id: None,
                    parent_id: Some(parent.id),
                    size: 0,
                    present: false,
                }
            }
        };
        let transfer: Arc<dyn TransferBackend> = self.backend.clone();
        Ok(RemoteChannel::new(transfer, info))
    }

    /// Read a whole file into memory through a channel.
    pub async fn read_to_vec(&self, path: &CloudPath) -> Result<Vec<u8>> {
        let channel = self.new_byte_channel(path, OpenMode::Read).await?;
        let mut out = Vec::new();
        let mut buf = vec![0u8; self.config.read_buffer_size];
        while let Some(n) = channel.read(&mut buf).await? {
            out.extend_from_slice(&buf[..n]);
        }
        Ok(out)
    }

    /// Write a whole payload to a file path through a channel.
    pub async fn write_all(&self, path: &CloudPath, data: &[u8]) -> Result<()> {
        let channel = self.new_byte_channel(path, OpenMode::Write).await?;
        channel.write(data).await?;
        Ok(())
    }

    /// Register a watch on a directory.
    ///
    /// Validates that the path resolves to a folder, then hands the
    /// pre-resolved directory to the polling service.
    pub async fn watch(
        &self,
        service: &PollingWatchService,
        path: &CloudPath,
        kinds: &[EventKind],
    ) -> Result<Arc<WatchKey>> {
        let abs = self.absolutize(path)?;
        let resource = self
            .resolve(&abs)
            .await?
            .ok_or_else(|| CloudFsError::NotFound(abs.to_string()))?;
        if !resource.is_folder() {
            return Err(CloudFsError::InvalidArgument(format!(
                "{} is not a directory",
                abs
            )));
        }
        service.register(&abs, kinds).await
    }
}
