//! Domain service for photo uploads and the per-user album.

use bytes::Bytes;
use std::str::FromStr;
use thiserror::Error;
use url::Url;

use crate::models::photo::{Photo, PhotoMetadataUpdate};
use crate::models::user::User;
use crate::services::storage::StorageError;

#[derive(Debug, Error)]
pub enum PhotoError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Photo not found")]
    NotFound,

    #[error("Unsupported or corrupt image: {0}")]
    InvalidImage(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for PhotoError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<StorageError> for PhotoError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(_) => Self::NotFound,
            other => Self::Storage(other.to_string()),
        }
    }
}

/// Which stored artifact to serve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FileMode {
    #[default]
    Original,
    Thumbnail,
}

impl FromStr for FileMode {
    type Err = PhotoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "original" => Ok(Self::Original),
            "thumbnail" | "thumb" => Ok(Self::Thumbnail),
            other => Err(PhotoError::Validation(format!(
                "Unknown file mode '{other}', expected 'original' or 'thumbnail'"
            ))),
        }
    }
}

/// An uploaded file plus the optional form fields sent with it.
///
/// Form values win over whatever the file's EXIF block says.
#[derive(Debug, Clone, Default)]
pub struct UploadPhoto {
    pub filename: String,
    pub bytes: Bytes,
    pub tags: Option<String>,
    pub description: Option<String>,
    pub taken_date: Option<String>,
    pub geotag_lat: Option<f64>,
    pub geotag_lng: Option<f64>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub city: Option<String>,
    pub nation: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone)]
pub enum PhotoContent {
    /// Client should fetch the object directly from storage.
    Redirect(Url),
    Bytes { bytes: Bytes, content_type: String },
}

#[async_trait::async_trait]
pub trait PhotoService: Send + Sync {
    /// Stores the original and its thumbnail, then records the row.
    ///
    /// # Errors
    ///
    /// Returns [`PhotoError::Validation`] for a bad filename, extension or empty body,
    /// and [`PhotoError::InvalidImage`] when the bytes cannot be decoded.
    async fn upload(&self, user: &User, upload: UploadPhoto) -> Result<Photo, PhotoError>;

    /// Lists the user's photos, newest upload first.
    async fn list(&self, user: &User) -> Result<Vec<Photo>, PhotoError>;

    async fn get(&self, user: &User, id: i32) -> Result<Photo, PhotoError>;

    async fn update(
        &self,
        user: &User,
        id: i32,
        update: PhotoMetadataUpdate,
    ) -> Result<Photo, PhotoError>;

    /// Removes both stored artifacts and the row.
    async fn delete(&self, user: &User, id: i32) -> Result<(), PhotoError>;

    async fn open(&self, user: &User, id: i32, mode: FileMode) -> Result<PhotoContent, PhotoError>;

    /// Deletes a user's stored files and account. Photo rows follow by cascade.
    async fn remove_user(&self, user: &User) -> Result<usize, PhotoError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_mode_parse() {
        assert_eq!("original".parse::<FileMode>().unwrap(), FileMode::Original);
        assert_eq!("Thumbnail".parse::<FileMode>().unwrap(), FileMode::Thumbnail);
        assert!("preview".parse::<FileMode>().is_err());
    }

    #[test]
    fn test_storage_not_found_maps_to_not_found() {
        let err = PhotoError::from(StorageError::NotFound("k".into()));
        assert!(matches!(err, PhotoError::NotFound));
        let err = PhotoError::from(StorageError::Backend("down".into()));
        assert!(matches!(err, PhotoError::Storage(_)));
    }
}
