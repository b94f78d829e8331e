use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};

use crate::entities::photos;
use crate::models::photo::{NewPhoto, Photo, PhotoMetadataUpdate};

impl From<photos::Model> for Photo {
    fn from(model: photos::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            tags: model.tags,
            description: model.description,
            filename_orig: model.filename_orig,
            filename: model.filename,
            filesize: model.filesize,
            geotag_lat: model.geotag_lat,
            geotag_lng: model.geotag_lng,
            upload_date: model.upload_date,
            taken_date: model.taken_date,
            make: model.make,
            model: model.model,
            width: model.width,
            height: model.height,
            city: model.city,
            nation: model.nation,
            address: model.address,
        }
    }
}

pub struct PhotoRepository {
    conn: DatabaseConnection,
}

impl PhotoRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn insert(&self, photo: NewPhoto) -> Result<Photo> {
        let active = photos::ActiveModel {
            user_id: Set(photo.user_id),
            tags: Set(photo.tags),
            description: Set(photo.description),
            filename_orig: Set(photo.filename_orig),
            filename: Set(photo.filename),
            filesize: Set(photo.filesize),
            geotag_lat: Set(photo.geotag_lat),
            geotag_lng: Set(photo.geotag_lng),
            upload_date: Set(chrono::Utc::now().to_rfc3339()),
            taken_date: Set(photo.taken_date),
            make: Set(photo.make),
            model: Set(photo.model),
            width: Set(photo.width),
            height: Set(photo.height),
            city: Set(photo.city),
            nation: Set(photo.nation),
            address: Set(photo.address),
            ..Default::default()
        };

        let model = active
            .insert(&self.conn)
            .await
            .context("Failed to insert photo")?;

        Ok(Photo::from(model))
    }

    /// Fetch a photo only if it belongs to `user_id`.
    pub async fn get_for_user(&self, user_id: i32, id: i32) -> Result<Option<Photo>> {
        let photo = photos::Entity::find_by_id(id)
            .filter(photos::Column::UserId.eq(user_id))
            .one(&self.conn)
            .await
            .context("Failed to query photo")?;

        Ok(photo.map(Photo::from))
    }

    /// Newest upload first.
    pub async fn list_for_user(&self, user_id: i32) -> Result<Vec<Photo>> {
        let rows = photos::Entity::find()
            .filter(photos::Column::UserId.eq(user_id))
            .order_by_desc(photos::Column::UploadDate)
            .order_by_desc(photos::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list photos")?;

        Ok(rows.into_iter().map(Photo::from).collect())
    }

    pub async fn update_metadata(
        &self,
        user_id: i32,
        id: i32,
        update: PhotoMetadataUpdate,
    ) -> Result<Option<Photo>> {
        let Some(model) = photos::Entity::find_by_id(id)
            .filter(photos::Column::UserId.eq(user_id))
            .one(&self.conn)
            .await?
        else {
            return Ok(None);
        };

        if update.is_empty() {
            return Ok(Some(Photo::from(model)));
        }

        let mut active: photos::ActiveModel = model.into();
        if let Some(tags) = update.tags {
            active.tags = Set(Some(tags));
        }
        if let Some(description) = update.description {
            active.description = Set(Some(description));
        }
        if let Some(city) = update.city {
            active.city = Set(Some(city));
        }
        if let Some(nation) = update.nation {
            active.nation = Set(Some(nation));
        }
        if let Some(address) = update.address {
            active.address = Set(Some(address));
        }

        let model = active
            .update(&self.conn)
            .await
            .context("Failed to update photo")?;

        Ok(Some(Photo::from(model)))
    }

    pub async fn delete(&self, user_id: i32, id: i32) -> Result<bool> {
        let result = photos::Entity::delete_many()
            .filter(photos::Column::Id.eq(id))
            .filter(photos::Column::UserId.eq(user_id))
            .exec(&self.conn)
            .await
            .context("Failed to delete photo")?;

        Ok(result.rows_affected > 0)
    }

    pub async fn count_for_user(&self, user_id: i32) -> Result<u64> {
        let count = photos::Entity::find()
            .filter(photos::Column::UserId.eq(user_id))
            .count(&self.conn)
            .await?;

        Ok(count)
    }
}
