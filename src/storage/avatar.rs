use super::object_storage::{BucketPolicy, ObjectStorage, StorageError};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{info, warn};

pub const AVATAR_CONTENT_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp", "image/gif"];
pub const DEFAULT_AVATAR_MAX_SIZE_BYTES: usize = 5 * 1024 * 1024;

pub fn avatar_bucket_policy(max_size_bytes: usize) -> BucketPolicy {
    BucketPolicy {
        allowed_content_types: AVATAR_CONTENT_TYPES.iter().map(|s| s.to_string()).collect(),
        max_size_bytes,
    }
}

/// Stores user avatars, one current image per user.
pub struct AvatarService {
    storage: Arc<dyn ObjectStorage>,
}

impl AvatarService {
    pub fn new(storage: Arc<dyn ObjectStorage>) -> Self {
        AvatarService { storage }
    }

    /// Replaces the user's avatar with `bytes` and returns its public url.
    /// The content type is sniffed from the bytes. Older avatars are removed only
    /// once the new one is stored.
    pub async fn upload_avatar(&self, user_id: usize, bytes: &[u8]) -> Result<String, StorageError> {
        let kind = infer::get(bytes)
            .ok_or_else(|| StorageError::ContentTypeNotAllowed("unknown".to_string()))?;
        self.storage.policy().check(kind.mime_type(), bytes.len())?;

        let millis = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let key = format!("{}/{}.{}", user_id, millis, kind.extension());
        let url = self.storage.put(&key, bytes, kind.mime_type()).await?;
        info!("User {} uploaded avatar {}", user_id, key);

        match self.storage.list(&user_id.to_string()).await {
            Ok(existing) => {
                let stale: Vec<String> = existing.into_iter().filter(|k| *k != key).collect();
                if !stale.is_empty() {
                    if let Err(err) = self.storage.remove(&stale).await {
                        warn!("Could not delete old avatars of user {}: {}", user_id, err);
                    }
                }
            }
            Err(err) => warn!("Could not list avatars of user {}: {}", user_id, err),
        }
        Ok(url)
    }

    pub async fn latest_avatar_url(&self, user_id: usize) -> Result<Option<String>, StorageError> {
        let keys = self.storage.list(&user_id.to_string()).await?;
        Ok(keys.first().map(|key| self.storage.public_url(key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FsObjectStorage;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::TempDir;

    const PNG_HEADER: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
    const GIF_HEADER: &[u8] = b"GIF89a\x01\x00\x01\x00\x00\x00\x00";

    fn service(dir: &TempDir, max: usize) -> AvatarService {
        AvatarService::new(Arc::new(FsObjectStorage::new(
            dir.path(),
            "http://media/avatars",
            avatar_bucket_policy(max),
        )))
    }

    #[tokio::test]
    async fn upload_replaces_previous_avatar() {
        let dir = TempDir::new().unwrap();
        let avatars = service(&dir, DEFAULT_AVATAR_MAX_SIZE_BYTES);

        let first = avatars.upload_avatar(4, PNG_HEADER).await.unwrap();
        assert!(first.starts_with("http://media/avatars/4/"));
        assert!(first.ends_with(".png"));

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = avatars.upload_avatar(4, GIF_HEADER).await.unwrap();
        assert!(second.ends_with(".gif"));

        assert_eq!(avatars.latest_avatar_url(4).await.unwrap(), Some(second));
        assert_eq!(std::fs::read_dir(dir.path().join("4")).unwrap().count(), 1);
        assert_eq!(avatars.latest_avatar_url(5).await.unwrap(), None);
    }

    /// Filesystem bucket whose writes can be switched off.
    struct FlakyStorage {
        inner: FsObjectStorage,
        fail_puts: AtomicBool,
    }

    #[async_trait]
    impl ObjectStorage for FlakyStorage {
        async fn put(
            &self,
            key: &str,
            bytes: &[u8],
            content_type: &str,
        ) -> Result<String, StorageError> {
            if self.fail_puts.load(Ordering::SeqCst) {
                return Err(StorageError::Io(std::io::Error::other("disk full")));
            }
            self.inner.put(key, bytes, content_type).await
        }

        async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
            self.inner.list(prefix).await
        }

        async fn remove(&self, keys: &[String]) -> Result<(), StorageError> {
            self.inner.remove(keys).await
        }

        fn public_url(&self, key: &str) -> String {
            self.inner.public_url(key)
        }

        fn policy(&self) -> &BucketPolicy {
            self.inner.policy()
        }
    }

    #[tokio::test]
    async fn failed_upload_keeps_previous_avatar() {
        let dir = TempDir::new().unwrap();
        let storage = Arc::new(FlakyStorage {
            inner: FsObjectStorage::new(
                dir.path(),
                "http://media/avatars",
                avatar_bucket_policy(DEFAULT_AVATAR_MAX_SIZE_BYTES),
            ),
            fail_puts: AtomicBool::new(false),
        });
        let avatars = AvatarService::new(storage.clone());

        let first = avatars.upload_avatar(4, PNG_HEADER).await.unwrap();
        storage.fail_puts.store(true, Ordering::SeqCst);

        assert!(matches!(
            avatars.upload_avatar(4, GIF_HEADER).await,
            Err(StorageError::Io(_))
        ));
        assert_eq!(avatars.latest_avatar_url(4).await.unwrap(), Some(first));
        assert_eq!(std::fs::read_dir(dir.path().join("4")).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn rejects_non_images_and_oversize_files() {
        let dir = TempDir::new().unwrap();
        let avatars = service(&dir, 10);

        assert!(matches!(
            avatars.upload_avatar(1, b"just some text").await,
            Err(StorageError::ContentTypeNotAllowed(_))
        ));
        assert!(matches!(
            avatars.upload_avatar(1, b"%PDF-1.4 not an image").await,
            Err(StorageError::ContentTypeNotAllowed(t)) if t == "application/pdf"
        ));
        assert!(matches!(
            avatars.upload_avatar(1, PNG_HEADER).await,
            Err(StorageError::TooLarge { size: 12, max: 10 })
        ));
    }
}
