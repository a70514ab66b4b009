use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use bytes::Bytes;

use crate::digest::OciDigest;
use crate::error::{Error, Result};
use crate::models::Descriptor;

/// A push/fetch/tag-capable blob store used as the source or the
/// destination of a copy operation. Owned exclusively by the operation
/// that created it.
pub trait ContentStore {
    /// Store the exact bytes described by `descriptor`.
    fn push(&mut self, descriptor: &Descriptor, content: &[u8]) -> Result<()>;
    /// Retrieve the bytes for a previously pushed descriptor.
    fn fetch(&self, descriptor: &Descriptor) -> Result<Bytes>;
    /// Make a descriptor resolvable under a name.
    fn tag(&mut self, descriptor: &Descriptor, reference: &str) -> Result<()>;
    /// Resolve a name tagged earlier.
    fn resolve(&self, reference: &str) -> Option<Descriptor>;
}

/// In-memory store used to stage blobs for a push.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: HashMap<OciDigest, Bytes>,
    tags: HashMap<String, Descriptor>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ContentStore for MemoryStore {
    fn push(&mut self, descriptor: &Descriptor, content: &[u8]) -> Result<()> {
        self.blobs
            .insert(descriptor.digest.clone(), Bytes::copy_from_slice(content));
        Ok(())
    }

    fn fetch(&self, descriptor: &Descriptor) -> Result<Bytes> {
        self.blobs
            .get(&descriptor.digest)
            .cloned()
            .ok_or_else(|| Error::BlobNotFound(descriptor.digest.to_string()))
    }

    fn tag(&mut self, descriptor: &Descriptor, reference: &str) -> Result<()> {
        self.tags.insert(reference.to_string(), descriptor.clone());
        Ok(())
    }

    fn resolve(&self, reference: &str) -> Option<Descriptor> {
        self.tags.get(reference).cloned()
    }
}

/// Filesystem-backed store rooted at a directory.
///
/// Blobs carrying a title annotation materialize at that relative path
/// under the root; untitled blobs (configs, manifests) are kept in a
/// memory fallback so pulls leave only artifact files on disk.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    fallback: HashMap<OciDigest, Bytes>,
    paths: HashMap<OciDigest, PathBuf>,
    tags: HashMap<String, Descriptor>,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            fallback: HashMap::new(),
            paths: HashMap::new(),
            tags: HashMap::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a title annotation to a path under the root, rejecting
    /// absolute paths and `..` traversal.
    fn title_path(&self, title: &str) -> Result<PathBuf> {
        let relative = Path::new(title);
        let safe = relative.components().all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(Error::InvalidPath {
                file: relative.to_path_buf(),
                root: self.root.clone(),
            });
        }
        Ok(self.root.join(relative))
    }
}

impl ContentStore for FileStore {
    fn push(&mut self, descriptor: &Descriptor, content: &[u8]) -> Result<()> {
        match descriptor.title() {
            Some(title) => {
                let path = self.title_path(title)?;
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&path, content)?;
                self.paths.insert(descriptor.digest.clone(), path);
            }
            None => {
                self.fallback
                    .insert(descriptor.digest.clone(), Bytes::copy_from_slice(content));
            }
        }
        Ok(())
    }

    fn fetch(&self, descriptor: &Descriptor) -> Result<Bytes> {
        if let Some(path) = self.paths.get(&descriptor.digest) {
            return Ok(Bytes::from(fs::read(path)?));
        }
        self.fallback
            .get(&descriptor.digest)
            .cloned()
            .ok_or_else(|| Error::BlobNotFound(descriptor.digest.to_string()))
    }

    fn tag(&mut self, descriptor: &Descriptor, reference: &str) -> Result<()> {
        self.tags.insert(reference.to_string(), descriptor.clone());
        Ok(())
    }

    fn resolve(&self, reference: &str) -> Option<Descriptor> {
        self.tags.get(reference).cloned()
    }
}
