use crate::services::storage::{PhotoStorage, StorageError, validate_key};
use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;
use url::Url;

/// Stores artifacts as plain files below `root`.
pub struct LocalPhotoStorage {
    root: PathBuf,
}

impl LocalPhotoStorage {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(key.split('/').fold(self.root.clone(), |p, seg| p.join(seg)))
    }
}

async fn count_files(dir: &Path) -> Result<usize, StorageError> {
    let mut count = 0;
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let mut entries = fs::read_dir(&current).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                pending.push(entry.path());
            } else {
                count += 1;
            }
        }
    }

    Ok(count)
}

#[async_trait]
impl PhotoStorage for LocalPhotoStorage {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn put(&self, key: &str, bytes: Bytes, _content_type: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::write(&path, &bytes).await?;
        debug!(path = %path.display(), size = bytes.len(), "Stored file");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, StorageError> {
        let path = self.path_for(key)?;
        match fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize, StorageError> {
        let dir = self.path_for(prefix.trim_end_matches('/'))?;
        if !fs::try_exists(&dir).await? {
            return Ok(0);
        }

        let removed = count_files(&dir).await?;
        fs::remove_dir_all(&dir).await?;
        debug!(path = %dir.display(), removed, "Removed directory");
        Ok(removed)
    }

    async fn presigned_url(&self, _key: &str) -> Result<Option<Url>, StorageError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::storage::{original_key, thumbnail_key, user_prefix};

    #[tokio::test]
    async fn test_put_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalPhotoStorage::new(dir.path());
        let key = original_key("a@b.com", "one.jpg");

        storage
            .put(&key, Bytes::from_static(b"jpeg"), "image/jpeg")
            .await
            .unwrap();
        assert!(dir.path().join("photos/a_at_b_dot_com/one.jpg").exists());
        assert_eq!(storage.get(&key).await.unwrap(), Bytes::from_static(b"jpeg"));

        storage.delete(&key).await.unwrap();
        assert!(matches!(
            storage.get(&key).await,
            Err(StorageError::NotFound(_))
        ));

        // Deleting again is fine
        storage.delete(&key).await.unwrap();
        assert!(storage.presigned_url(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_prefix_removes_user_tree() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalPhotoStorage::new(dir.path());

        for name in ["a.jpg", "b.jpg"] {
            storage
                .put(&original_key("a@b.com", name), Bytes::from_static(b"x"), "image/jpeg")
                .await
                .unwrap();
            storage
                .put(&thumbnail_key("a@b.com", name), Bytes::from_static(b"t"), "image/jpeg")
                .await
                .unwrap();
        }
        storage
            .put(&original_key("c@d.com", "c.jpg"), Bytes::from_static(b"x"), "image/jpeg")
            .await
            .unwrap();

        let removed = storage.delete_prefix(&user_prefix("a@b.com")).await.unwrap();
        assert_eq!(removed, 4);
        assert!(!dir.path().join("photos/a_at_b_dot_com").exists());
        assert!(storage.get(&original_key("c@d.com", "c.jpg")).await.is_ok());

        assert_eq!(storage.delete_prefix(&user_prefix("a@b.com")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalPhotoStorage::new(dir.path());
        assert!(matches!(
            storage.get("photos/../../etc/passwd").await,
            Err(StorageError::InvalidKey(_))
        ));
    }
}
