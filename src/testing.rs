//! In-memory storage backend shared by the crate's tests.
//!
//! Implements every capability trait over a flat id-keyed node map, so
//! the core's components can be exercised without a wire.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::backend::{
    ListingBackend, MutationBackend, TransferBackend, TreeBackend, UploadSession, UploadTarget,
};
use crate::error::{CloudFsError, Result};
use crate::path::CloudPath;
use crate::resource::{DirectoryEntry, ObjectInfo, Resource, ResourceKind};

const ROOT_ID: &str = "root";

#[derive(Clone)]
struct MemNode {
    id: String,
    parent: Option<String>,
    name: String,
    kind: ResourceKind,
    data: Vec<u8>,
    modified: i64,
}

impl MemNode {
    fn to_resource(&self) -> Resource {
        Resource {
            id: self.id.clone(),
            name: self.name.clone(),
            kind: self.kind,
            size: self.data.len() as u64,
        }
    }
}

struct Inner {
    nodes: HashMap<String, MemNode>,
    next_id: u64,
    clock: i64,
}

impl Inner {
    fn mint_id(&mut self) -> String {
        self.next_id += 1;
        format!("n{}", self.next_id)
    }

    fn tick_clock(&mut self) -> i64 {
        self.clock += 1;
        self.clock
    }

    fn child_ids(&self, parent_id: &str) -> Vec<String> {
        let mut ids: Vec<&MemNode> = self
            .nodes
            .values()
            .filter(|n| n.parent.as_deref() == Some(parent_id))
            .collect();
        ids.sort_by(|a, b| a.name.cmp(&b.name));
        ids.into_iter().map(|n| n.id.clone()).collect()
    }

    fn child_by_name(&self, parent_id: &str, name: &str) -> Option<&MemNode> {
        self.nodes
            .values()
            .find(|n| n.parent.as_deref() == Some(parent_id) && n.name == name)
    }

    fn require_folder(&self, id: &str) -> Result<()> {
        match self.nodes.get(id) {
            Some(node) if node.kind == ResourceKind::Folder => Ok(()),
            Some(_) => Err(CloudFsError::InvalidArgument(format!(
                "{} is not a folder",
                id
            ))),
            None => Err(CloudFsError::NotFound(id.to_string())),
        }
    }

    fn remove_recursive(&mut self, id: &str) {
        for child in self.child_ids(id) {
            self.remove_recursive(&child);
        }
        self.nodes.remove(id);
    }

    fn store_object(&mut self, target: &UploadTarget, name: &str, data: &[u8]) -> Result<ObjectInfo> {
        let (parent, name) = match target {
            UploadTarget::NewChild { parent_id } => {
                self.require_folder(parent_id)?;
                (parent_id.clone(), name.to_string())
            }
            UploadTarget::Existing { id } => {
                let old = self
                    .nodes
                    .remove(id)
                    .ok_or_else(|| CloudFsError::NotFound(id.clone()))?;
                (old.parent.unwrap_or_else(|| ROOT_ID.to_string()), old.name)
            }
        };
        // Every write mints a fresh version id.
        let id = self.mint_id();
        let modified = self.tick_clock();
        self.nodes.insert(
            id.clone(),
            MemNode {
                id: id.clone(),
                parent: Some(parent),
                name: name.clone(),
                kind: ResourceKind::File,
                data: data.to_vec(),
                modified,
            },
        );
        Ok(ObjectInfo {
            id,
            name,
            size: data.len() as u64,
        })
    }

    fn copy_recursive(&mut self, id: &str, dest_parent: &str, name: &str) -> Result<String> {
        let source = self
            .nodes
            .get(id)
            .cloned()
            .ok_or_else(|| CloudFsError::NotFound(id.to_string()))?;
        let new_id = self.mint_id();
        let modified = self.tick_clock();
        self.nodes.insert(
            new_id.clone(),
            MemNode {
                id: new_id.clone(),
                parent: Some(dest_parent.to_string()),
                name: name.to_string(),
                kind: source.kind,
                data: source.data.clone(),
                modified,
            },
        );
        for child_id in self.child_ids(id) {
            let child_name = self.nodes[&child_id].name.clone();
            self.copy_recursive(&child_id, &new_id, &child_name)?;
        }
        Ok(new_id)
    }
}

/// In-memory implementation of the full backend capability set.
pub(crate) struct MemoryBackend {
    part_size: u64,
    inner: Arc<Mutex<Inner>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_part_size(8)
    }

    pub fn with_part_size(part_size: u64) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            ROOT_ID.to_string(),
            MemNode {
                id: ROOT_ID.to_string(),
                parent: None,
                name: String::new(),
                kind: ResourceKind::Folder,
                data: Vec::new(),
                modified: 0,
            },
        );
        Self {
            part_size,
            inner: Arc::new(Mutex::new(Inner {
                nodes,
                next_id: 0,
                clock: 0,
            })),
        }
    }

    pub fn root_id(&self) -> String {
        ROOT_ID.to_string()
    }

    pub fn put_folder(&self, parent_id: &str, name: &str) -> String {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.mint_id();
        let modified = inner.tick_clock();
        inner.nodes.insert(
            id.clone(),
            MemNode {
                id: id.clone(),
                parent: Some(parent_id.to_string()),
                name: name.to_string(),
                kind: ResourceKind::Folder,
                data: Vec::new(),
                modified,
            },
        );
        id
    }

    pub fn put_file(&self, parent_id: &str, name: &str, data: &[u8], modified: i64) -> String {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.mint_id();
        inner.nodes.insert(
            id.clone(),
            MemNode {
                id: id.clone(),
                parent: Some(parent_id.to_string()),
                name: name.to_string(),
                kind: ResourceKind::File,
                data: data.to_vec(),
                modified,
            },
        );
        id
    }

    pub fn set_modified(&self, id: &str, modified: i64) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(node) = inner.nodes.get_mut(id) {
            node.modified = modified;
        }
    }

    pub fn remove_by_name(&self, parent_id: &str, name: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(id) = inner.child_by_name(parent_id, name).map(|n| n.id.clone()) {
            inner.remove_recursive(&id);
        }
    }

    pub fn find_child(&self, parent_id: &str, name: &str) -> Option<Resource> {
        let inner = self.inner.lock().unwrap();
        inner.child_by_name(parent_id, name).map(|n| n.to_resource())
    }

    pub fn read_all(&self, id: &str) -> Vec<u8> {
        let inner = self.inner.lock().unwrap();
        inner.nodes.get(id).map(|n| n.data.clone()).unwrap_or_default()
    }

    fn resolve_folder(&self, dir: &CloudPath) -> Result<String> {
        let inner = self.inner.lock().unwrap();
        let mut current = ROOT_ID.to_string();
        for segment in dir.name_components() {
            match inner.child_by_name(&current, segment) {
                Some(node) if node.kind == ResourceKind::Folder => current = node.id.clone(),
                _ => return Err(CloudFsError::NotFound(dir.to_string())),
            }
        }
        Ok(current)
    }
}

#[async_trait]
impl TreeBackend for MemoryBackend {
    async fn root(&self) -> Result<Resource> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.nodes[ROOT_ID].to_resource())
    }

    async fn children(&self, folder: &Resource) -> Result<Vec<Resource>> {
        let inner = self.inner.lock().unwrap();
        inner.require_folder(&folder.id)?;
        Ok(inner
            .child_ids(&folder.id)
            .iter()
            .map(|id| inner.nodes[id].to_resource())
            .collect())
    }
}

#[async_trait]
impl TransferBackend for MemoryBackend {
    async fn download_range(&self, id: &str, start: u64, end: u64) -> Result<Vec<u8>> {
        let inner = self.inner.lock().unwrap();
        let node = inner
            .nodes
            .get(id)
            .ok_or_else(|| CloudFsError::NotFound(id.to_string()))?;
        if start > end || end >= node.data.len() as u64 {
            return Err(CloudFsError::Transfer(format!(
                "range [{}, {}] out of bounds for {} bytes",
                start,
                end,
                node.data.len()
            )));
        }
        Ok(node.data[start as usize..=end as usize].to_vec())
    }

    async fn upload_single_shot(
        &self,
        target: &UploadTarget,
        name: &str,
        data: &[u8],
    ) -> Result<ObjectInfo> {
        let mut inner = self.inner.lock().unwrap();
        inner.store_object(target, name, data)
    }

    async fn open_upload_session(
        &self,
        target: &UploadTarget,
        name: &str,
        total_size: u64,
    ) -> Result<Box<dyn UploadSession>> {
        if let UploadTarget::NewChild { parent_id } = target {
            self.inner.lock().unwrap().require_folder(parent_id)?;
        }
        Ok(Box::new(MemUploadSession {
            inner: Arc::clone(&self.inner),
            target: target.clone(),
            name: name.to_string(),
            total_size,
            part_size: self.part_size,
            buffer: Vec::new(),
        }))
    }
}

struct MemUploadSession {
    inner: Arc<Mutex<Inner>>,
    target: UploadTarget,
    name: String,
    total_size: u64,
    part_size: u64,
    buffer: Vec<u8>,
}

#[async_trait]
impl UploadSession for MemUploadSession {
    fn part_size(&self) -> u64 {
        self.part_size
    }

    async fn upload_part(&mut self, data: &[u8], offset: u64) -> Result<()> {
        if offset != self.buffer.len() as u64 {
            return Err(CloudFsError::Transfer(format!(
                "part at offset {} does not follow {} buffered bytes",
                offset,
                self.buffer.len()
            )));
        }
        let at_end = offset + data.len() as u64 == self.total_size;
        if data.len() as u64 != self.part_size && !at_end {
            return Err(CloudFsError::Transfer(format!(
                "non-final part of {} bytes, session part size is {}",
                data.len(),
                self.part_size
            )));
        }
        self.buffer.extend_from_slice(data);
        Ok(())
    }

    async fn commit(self: Box<Self>, digest: &[u8]) -> Result<ObjectInfo> {
        if self.buffer.len() as u64 != self.total_size {
            return Err(CloudFsError::Transfer(format!(
                "committed {} of {} bytes",
                self.buffer.len(),
                self.total_size
            )));
        }
        let expected = Sha256::digest(&self.buffer);
        if digest != expected.as_slice() {
            return Err(CloudFsError::Transfer("payload digest mismatch".to_string()));
        }
        let mut inner = self.inner.lock().unwrap();
        inner.store_object(&self.target, &self.name, &self.buffer)
    }
}

#[async_trait]
impl ListingBackend for MemoryBackend {
    async fn list_directory(&self, dir: &CloudPath) -> Result<Vec<DirectoryEntry>> {
        let folder_id = self.resolve_folder(dir)?;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .child_ids(&folder_id)
            .iter()
            .map(|id| {
                let node = &inner.nodes[id];
                DirectoryEntry {
                    name: node.name.clone(),
                    modified: node.modified,
                }
            })
            .collect())
    }
}

#[async_trait]
impl MutationBackend for MemoryBackend {
    async fn create_folder(&self, parent_id: &str, name: &str) -> Result<Resource> {
        {
            let inner = self.inner.lock().unwrap();
            inner.require_folder(parent_id)?;
            if inner.child_by_name(parent_id, name).is_some() {
                return Err(CloudFsError::AlreadyExists(name.to_string()));
            }
        }
        let id = self.put_folder(parent_id, name);
        let inner = self.inner.lock().unwrap();
        Ok(inner.nodes[&id].to_resource())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.nodes.contains_key(id) {
            return Err(CloudFsError::NotFound(id.to_string()));
        }
        inner.remove_recursive(id);
        Ok(())
    }

    async fn copy(&self, id: &str, dest_parent_id: &str, name: &str) -> Result<Resource> {
        let mut inner = self.inner.lock().unwrap();
        inner.require_folder(dest_parent_id)?;
        if inner.child_by_name(dest_parent_id, name).is_some() {
            return Err(CloudFsError::AlreadyExists(name.to_string()));
        }
        let new_id = inner.copy_recursive(id, dest_parent_id, name)?;
        Ok(inner.nodes[&new_id].to_resource())
    }

    async fn move_to(&self, id: &str, dest_parent_id: &str, name: &str) -> Result<Resource> {
        let mut inner = self.inner.lock().unwrap();
        inner.require_folder(dest_parent_id)?;
        if inner.child_by_name(dest_parent_id, name).is_some() {
            return Err(CloudFsError::AlreadyExists(name.to_string()));
        }
        let node = inner
            .nodes
            .get_mut(id)
            .ok_or_else(|| CloudFsError::NotFound(id.to_string()))?;
        node.parent = Some(dest_parent_id.to_string());
        node.name = name.to_string();
        let resource = node.to_resource();
        Ok(resource)
    }
}
