//! Artifact storage on an `object_store` backend.
//!
//! Supported bucket URLs:
//! - `s3://bucket/prefix` - Amazon S3 or a compatible service
//! - `file:///path/to/dir` - local filesystem
//! - `memory://` - in-process store for tests and demos
//!
//! S3 credentials and region come from the standard `AWS_*` environment
//! variables. `AWS_ENDPOINT` points the client at MinIO and friends.

use crate::services::storage::{PhotoStorage, StorageError, validate_key};
use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path as ObjectPath;
use object_store::signer::Signer;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub struct ObjectPhotoStorage {
    store: Arc<dyn ObjectStore>,
    /// Set for S3, which can sign download URLs and keeps content types.
    signer: Option<Arc<AmazonS3>>,
    prefix: String,
    presign_expiry: Duration,
}

impl ObjectPhotoStorage {
    pub fn from_url(bucket_url: &str, presign_expiry: Duration) -> Result<Self, StorageError> {
        let url = Url::parse(bucket_url)
            .map_err(|e| StorageError::Config(format!("Invalid bucket URL '{bucket_url}': {e}")))?;

        match url.scheme() {
            "s3" => Self::s3(&url, presign_expiry),
            "file" => Self::local(&url),
            "memory" => Ok(Self::in_memory()),
            scheme => Err(StorageError::Config(format!(
                "Unsupported bucket URL scheme '{scheme}'. Supported: s3, file, memory"
            ))),
        }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(object_store::memory::InMemory::new()),
            signer: None,
            prefix: String::new(),
            presign_expiry: Duration::ZERO,
        }
    }

    fn s3(url: &Url, presign_expiry: Duration) -> Result<Self, StorageError> {
        let bucket = url
            .host_str()
            .ok_or_else(|| StorageError::Config("S3 URL must include bucket name as host".into()))?;

        let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);
        if std::env::var("AWS_ENDPOINT").is_ok() {
            builder = builder.with_virtual_hosted_style_request(false);
        }

        let s3 = Arc::new(
            builder
                .build()
                .map_err(|e| StorageError::Config(format!("Failed to create S3 store: {e}")))?,
        );

        Ok(Self {
            store: s3.clone(),
            signer: Some(s3),
            prefix: url.path().trim_matches('/').to_string(),
            presign_expiry,
        })
    }

    fn local(url: &Url) -> Result<Self, StorageError> {
        let path = url.path();
        std::fs::create_dir_all(path)?;

        let store = object_store::local::LocalFileSystem::new_with_prefix(path)
            .map_err(|e| StorageError::Config(format!("Failed to create local file store: {e}")))?;

        Ok(Self {
            store: Arc::new(store),
            signer: None,
            prefix: String::new(),
            presign_expiry: Duration::ZERO,
        })
    }

    fn object_path(&self, key: &str) -> Result<ObjectPath, StorageError> {
        validate_key(key)?;
        if self.prefix.is_empty() {
            Ok(ObjectPath::from(key))
        } else {
            Ok(ObjectPath::from(format!("{}/{key}", self.prefix)))
        }
    }
}

#[async_trait]
impl PhotoStorage for ObjectPhotoStorage {
    fn name(&self) -> &'static str {
        "object"
    }

    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<(), StorageError> {
        let path = self.object_path(key)?;
        let size = bytes.len();
        let payload = PutPayload::from(bytes);

        // The local filesystem backend rejects attributes
        if self.signer.is_some() {
            let mut attributes = Attributes::new();
            attributes.insert(Attribute::ContentType, content_type.to_string().into());
            let opts = PutOptions {
                attributes,
                ..Default::default()
            };
            self.store.put_opts(&path, payload, opts).await?;
        } else {
            self.store.put(&path, payload).await?;
        }

        debug!(%path, size, "Uploaded object");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, StorageError> {
        let path = self.object_path(key)?;
        let result = self.store.get(&path).await?;
        Ok(result.bytes().await?)
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.object_path(key)?;
        match self.store.delete(&path).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize, StorageError> {
        let prefix = self.object_path(prefix.trim_end_matches('/'))?;
        let objects: Vec<_> = self.store.list(Some(&prefix)).try_collect().await?;

        for meta in &objects {
            match self.store.delete(&meta.location).await {
                Ok(()) | Err(object_store::Error::NotFound { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }

        debug!(%prefix, removed = objects.len(), "Removed objects");
        Ok(objects.len())
    }

    async fn presigned_url(&self, key: &str) -> Result<Option<Url>, StorageError> {
        let Some(signer) = &self.signer else {
            return Ok(None);
        };

        let path = self.object_path(key)?;
        let url = signer
            .signed_url(reqwest::Method::GET, &path, self.presign_expiry)
            .await?;
        Ok(Some(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::storage::{original_key, thumbnail_key, user_prefix};

    #[tokio::test]
    async fn test_memory_backend_roundtrip() {
        let storage = ObjectPhotoStorage::from_url("memory://", Duration::from_secs(60)).unwrap();
        let key = original_key("a@b.com", "one.png");

        storage
            .put(&key, Bytes::from_static(b"png"), "image/png")
            .await
            .unwrap();
        assert_eq!(storage.get(&key).await.unwrap(), Bytes::from_static(b"png"));
        assert!(storage.presigned_url(&key).await.unwrap().is_none());

        storage.delete(&key).await.unwrap();
        assert!(matches!(
            storage.get(&key).await,
            Err(StorageError::NotFound(_))
        ));
        storage.delete(&key).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_prefix_only_touches_owner() {
        let storage = ObjectPhotoStorage::in_memory();
        let put = |key: String| {
            let storage = &storage;
            async move {
                storage
                    .put(&key, Bytes::from_static(b"x"), "image/jpeg")
                    .await
                    .unwrap();
            }
        };

        put(original_key("a@b.com", "1.jpg")).await;
        put(thumbnail_key("a@b.com", "1.jpg")).await;
        put(original_key("a@b.community", "2.jpg")).await;

        let removed = storage.delete_prefix(&user_prefix("a@b.com")).await.unwrap();
        assert_eq!(removed, 2);
        assert!(
            storage
                .get(&original_key("a@b.community", "2.jpg"))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_file_backend() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("file://{}", dir.path().display());
        let storage = ObjectPhotoStorage::from_url(&url, Duration::from_secs(60)).unwrap();
        let key = thumbnail_key("x@y.org", "t.jpg");

        storage
            .put(&key, Bytes::from_static(b"thumb"), "image/jpeg")
            .await
            .unwrap();
        assert!(dir.path().join("photos/x_at_y_dot_org/thumbnails/t.jpg").exists());

        storage.delete(&key).await.unwrap();
        storage.delete(&key).await.unwrap();
    }

    #[test]
    fn test_rejects_unknown_scheme() {
        assert!(matches!(
            ObjectPhotoStorage::from_url("ftp://bucket", Duration::from_secs(1)),
            Err(StorageError::Config(_))
        ));
        assert!(ObjectPhotoStorage::from_url("not a url", Duration::from_secs(1)).is_err());
    }
}
