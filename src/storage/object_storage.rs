use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Content type {0} is not allowed in this bucket")]
    ContentTypeNotAllowed(String),

    #[error("Object of {size} bytes exceeds the bucket limit of {max} bytes")]
    TooLarge { size: usize, max: usize },

    #[error("Invalid object key {0}")]
    InvalidKey(String),

    #[error("Storage I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

/// Restrictions a bucket applies to every object written to it.
#[derive(Clone, Debug)]
pub struct BucketPolicy {
    pub allowed_content_types: Vec<String>,
    pub max_size_bytes: usize,
}

impl BucketPolicy {
    pub fn check(&self, content_type: &str, size: usize) -> Result<(), StorageError> {
        if !self
            .allowed_content_types
            .iter()
            .any(|allowed| allowed == content_type)
        {
            return Err(StorageError::ContentTypeNotAllowed(content_type.to_string()));
        }
        if size > self.max_size_bytes {
            return Err(StorageError::TooLarge {
                size,
                max: self.max_size_bytes,
            });
        }
        Ok(())
    }
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Stores the object under `key` and returns its public url.
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<String, StorageError>;

    /// Keys under the prefix, most recently written first.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    /// Deletes the objects, ignoring keys that do not exist.
    async fn remove(&self, keys: &[String]) -> Result<(), StorageError>;

    fn public_url(&self, key: &str) -> String;

    fn policy(&self) -> &BucketPolicy;
}

/// A bucket stored as a directory on the local filesystem.
pub struct FsObjectStorage {
    root: PathBuf,
    public_base_url: String,
    policy: BucketPolicy,
}

impl FsObjectStorage {
    pub fn new<P: AsRef<Path>, S: Into<String>>(
        root: P,
        public_base_url: S,
        policy: BucketPolicy,
    ) -> Self {
        FsObjectStorage {
            root: root.as_ref().to_path_buf(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            policy,
        }
    }

    /// Resolves a key to a path inside the bucket, refusing anything that escapes it.
    fn object_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let is_plain = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !is_plain {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStorage for FsObjectStorage {
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<String, StorageError> {
        self.policy.check(content_type, bytes.len())?;
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, bytes).await?;
        debug!("Stored {} ({} bytes) at {:?}", key, bytes.len(), path);
        Ok(self.public_url(key))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let dir = self.object_path(prefix.trim_end_matches('/'))?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(err) => return Err(err.into()),
        };

        let mut objects = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            let modified = metadata.modified().ok();
            objects.push((modified, name));
        }
        // Newest first, names break ties since avatar keys embed a timestamp.
        objects.sort_by(|a, b| b.cmp(a));

        let prefix = prefix.trim_end_matches('/');
        Ok(objects
            .into_iter()
            .map(|(_, name)| format!("{}/{}", prefix, name))
            .collect())
    }

    async fn remove(&self, keys: &[String]) -> Result<(), StorageError> {
        for key in keys {
            let path = self.object_path(key)?;
            match fs::remove_file(&path).await {
                Ok(()) => debug!("Removed {}", key),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }

    fn policy(&self) -> &BucketPolicy {
        &self.policy
    }
}
