//! `SeaORM` implementation of the `PhotoService` trait.

use crate::clients::geocoding::GeocodingClient;
use crate::config::StorageConfig;
use crate::db::Store;
use crate::models::photo::{NewPhoto, Photo, PhotoMetadataUpdate};
use crate::models::user::User;
use crate::services::image::{
    Thumbnail, allowed_file_ext, content_type_for, extract_exif, file_extension,
    is_valid_latitude, is_valid_longitude, make_thumbnail, secure_filename,
};
use crate::services::photo_service::{
    FileMode, PhotoContent, PhotoError, PhotoService, UploadPhoto,
};
use crate::services::storage::{PhotoStorage, original_key, thumbnail_key, user_prefix};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tracing::{info, warn};

pub struct SeaOrmPhotoService {
    store: Store,
    storage: Arc<dyn PhotoStorage>,
    geocoder: Option<GeocodingClient>,
    config: StorageConfig,
}

impl SeaOrmPhotoService {
    #[must_use]
    pub fn new(
        store: Store,
        storage: Arc<dyn PhotoStorage>,
        geocoder: Option<GeocodingClient>,
        config: StorageConfig,
    ) -> Self {
        Self {
            store,
            storage,
            geocoder,
            config,
        }
    }

    async fn find(&self, user: &User, id: i32) -> Result<Photo, PhotoError> {
        self.store
            .get_photo_for_user(user.id, id)
            .await?
            .ok_or(PhotoError::NotFound)
    }

    /// Remove both artifacts, logging rather than failing on errors.
    async fn discard_artifacts(&self, original: &str, thumbnail: &str) {
        for key in [thumbnail, original] {
            if let Err(e) = self.storage.delete(key).await {
                warn!(key, error = %e, "Failed to remove stored artifact");
            }
        }
    }
}

fn check_coordinates(lat: Option<f64>, lng: Option<f64>) -> Result<(), PhotoError> {
    if lat.is_some_and(|v| !is_valid_latitude(v)) {
        return Err(PhotoError::Validation("Latitude must be between -90 and 90".into()));
    }
    if lng.is_some_and(|v| !is_valid_longitude(v)) {
        return Err(PhotoError::Validation("Longitude must be between -180 and 180".into()));
    }
    Ok(())
}

/// Normalize a client-supplied capture time to RFC 3339.
fn parse_taken_date(raw: Option<String>) -> Result<Option<String>, PhotoError> {
    raw.map(|value| {
        chrono::DateTime::parse_from_rfc3339(value.trim())
            .map(|dt| dt.to_rfc3339())
            .map_err(|_| {
                PhotoError::Validation(format!(
                    "taken_date must be an RFC 3339 timestamp, got '{value}'"
                ))
            })
    })
    .transpose()
}

#[async_trait]
impl PhotoService for SeaOrmPhotoService {
    async fn upload(&self, user: &User, upload: UploadPhoto) -> Result<Photo, PhotoError> {
        let filename_orig = secure_filename(&upload.filename);
        if filename_orig.is_empty() {
            return Err(PhotoError::Validation("Invalid filename".into()));
        }
        if !allowed_file_ext(&filename_orig, &self.config.allowed_extensions) {
            return Err(PhotoError::Validation(format!(
                "File extension not allowed. Allowed: {}",
                self.config.allowed_extensions.join(", ")
            )));
        }
        if upload.bytes.is_empty() {
            return Err(PhotoError::Validation("Uploaded file is empty".into()));
        }
        check_coordinates(upload.geotag_lat, upload.geotag_lng)?;
        let taken_date = parse_taken_date(upload.taken_date)?;

        let ext = file_extension(&filename_orig).unwrap_or_default();
        let filename = format!("{}.{ext}", uuid::Uuid::new_v4());

        let (max_w, max_h) = (self.config.thumbnail_width, self.config.thumbnail_height);
        let source = upload.bytes.clone();
        let (exif, thumbnail) = tokio::task::spawn_blocking(move || {
            let exif = extract_exif(&source);
            let thumbnail = make_thumbnail(&source, max_w, max_h);
            (exif, thumbnail)
        })
        .await
        .map_err(|e| PhotoError::Internal(format!("Image task panicked: {e}")))?;

        let Thumbnail {
            jpeg,
            source_width,
            source_height,
        } = thumbnail.map_err(|e| PhotoError::InvalidImage(e.to_string()))?;

        // EXIF values are advisory; out-of-range ones are dropped
        let geotag_lat = upload
            .geotag_lat
            .or(exif.latitude.filter(|v| is_valid_latitude(*v)));
        let geotag_lng = upload
            .geotag_lng
            .or(exif.longitude.filter(|v| is_valid_longitude(*v)));

        let original = original_key(&user.email, &filename);
        let thumb = thumbnail_key(&user.email, &filename);

        self.storage
            .put(&original, upload.bytes.clone(), &content_type_for(&filename_orig))
            .await?;
        if let Err(e) = self
            .storage
            .put(&thumb, Bytes::from(jpeg), "image/jpeg")
            .await
        {
            self.discard_artifacts(&original, &thumb).await;
            return Err(e.into());
        }

        let (mut city, mut nation, mut address) = (upload.city, upload.nation, upload.address);
        if let (Some(geocoder), Some(lat), Some(lng)) = (&self.geocoder, geotag_lat, geotag_lng)
            && city.is_none()
            && nation.is_none()
            && address.is_none()
        {
            match geocoder.reverse(lat, lng).await {
                Ok(Some(place)) => {
                    city = place.city;
                    nation = place.nation;
                    address = place.address;
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, lat, lng, "Reverse geocoding failed"),
            }
        }

        let row = NewPhoto {
            user_id: user.id,
            tags: upload.tags,
            description: upload.description,
            filename_orig,
            filename,
            filesize: i64::try_from(upload.bytes.len()).unwrap_or(i64::MAX),
            geotag_lat,
            geotag_lng,
            taken_date: taken_date.or(exif.taken_date),
            make: upload.make.or(exif.make),
            model: upload.model.or(exif.model),
            width: i32::try_from(source_width).ok(),
            height: i32::try_from(source_height).ok(),
            city,
            nation,
            address,
        };

        let photo = match self.store.insert_photo(row).await {
            Ok(photo) => photo,
            Err(e) => {
                self.discard_artifacts(&original, &thumb).await;
                return Err(e.into());
            }
        };

        metrics::counter!("cloudalbum_photos_uploaded_total").increment(1);
        info!(
            user_id = user.id,
            photo_id = photo.id,
            filename = %photo.filename,
            size = photo.filesize,
            "Photo uploaded"
        );

        Ok(photo)
    }

    async fn list(&self, user: &User) -> Result<Vec<Photo>, PhotoError> {
        Ok(self.store.list_photos_for_user(user.id).await?)
    }

    async fn get(&self, user: &User, id: i32) -> Result<Photo, PhotoError> {
        self.find(user, id).await
    }

    async fn update(
        &self,
        user: &User,
        id: i32,
        update: PhotoMetadataUpdate,
    ) -> Result<Photo, PhotoError> {
        self.store
            .update_photo_metadata(user.id, id, update)
            .await?
            .ok_or(PhotoError::NotFound)
    }

    async fn delete(&self, user: &User, id: i32) -> Result<(), PhotoError> {
        let photo = self.find(user, id).await?;

        self.storage
            .delete(&thumbnail_key(&user.email, &photo.filename))
            .await?;
        self.storage
            .delete(&original_key(&user.email, &photo.filename))
            .await?;

        if !self.store.delete_photo(user.id, id).await? {
            return Err(PhotoError::NotFound);
        }

        info!(user_id = user.id, photo_id = id, "Photo deleted");
        Ok(())
    }

    async fn open(&self, user: &User, id: i32, mode: FileMode) -> Result<PhotoContent, PhotoError> {
        let photo = self.find(user, id).await?;

        let (key, content_type) = match mode {
            FileMode::Original => (
                original_key(&user.email, &photo.filename),
                content_type_for(&photo.filename),
            ),
            FileMode::Thumbnail => (
                thumbnail_key(&user.email, &photo.filename),
                "image/jpeg".to_string(),
            ),
        };

        if let Some(url) = self.storage.presigned_url(&key).await? {
            return Ok(PhotoContent::Redirect(url));
        }

        let bytes = self.storage.get(&key).await?;
        Ok(PhotoContent::Bytes {
            bytes,
            content_type,
        })
    }

    async fn remove_user(&self, user: &User) -> Result<usize, PhotoError> {
        let removed = self.storage.delete_prefix(&user_prefix(&user.email)).await?;

        if !self.store.delete_user(user.id).await? {
            return Err(PhotoError::Validation(format!(
                "User {} no longer exists",
                user.email
            )));
        }

        info!(user_id = user.id, email = %user.email, removed, "User removed");
        Ok(removed)
    }
}
