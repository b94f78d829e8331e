use axum::{
    Extension, Json,
    extract::{Multipart, Path, Query, State, multipart::MultipartError},
    http::{StatusCode, header},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

use super::validation::{parse_coordinate, validate_photo_id};
use super::{ApiError, ApiResponse, AppState, MessageResponse, PhotoDto, PhotoListDto};
use crate::models::photo::PhotoMetadataUpdate;
use crate::models::user::User;
use crate::services::{FileMode, PhotoContent, UploadPhoto};

#[derive(Debug, Deserialize)]
pub struct FileQuery {
    pub mode: Option<String>,
}

fn multipart_error(err: &MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::validation(format!("Malformed multipart body: {}", err.body_text()))
    }
}

fn non_blank(fields: &mut HashMap<String, String>, name: &str) -> Option<String> {
    fields
        .remove(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// POST /photos
///
/// Multipart form with a `file` part plus optional text fields:
/// `tags`, `description`, `taken_date`, `geotag_lat`, `geotag_lng`,
/// `make`, `model`, `city`, `nation`, `address`.
pub async fn upload_photo(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut file = None;
    let mut fields = HashMap::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(&e))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == "file" {
            let filename = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await.map_err(|e| multipart_error(&e))?;
            file = Some((filename, bytes));
        } else {
            let value = field.text().await.map_err(|e| multipart_error(&e))?;
            fields.insert(name, value);
        }
    }

    let Some((filename, bytes)) = file else {
        return Err(ApiError::validation("No file part in the request"));
    };
    if filename.is_empty() {
        return Err(ApiError::validation("No selected file"));
    }

    let geotag_lat = parse_coordinate("geotag_lat", fields.get("geotag_lat").map(String::as_str))?;
    let geotag_lng = parse_coordinate("geotag_lng", fields.get("geotag_lng").map(String::as_str))?;

    let upload = UploadPhoto {
        filename,
        bytes,
        tags: non_blank(&mut fields, "tags"),
        description: non_blank(&mut fields, "description"),
        taken_date: non_blank(&mut fields, "taken_date"),
        geotag_lat,
        geotag_lng,
        make: non_blank(&mut fields, "make"),
        model: non_blank(&mut fields, "model"),
        city: non_blank(&mut fields, "city"),
        nation: non_blank(&mut fields, "nation"),
        address: non_blank(&mut fields, "address"),
    };

    let photo = state.photos().upload(&user, upload).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(PhotoDto::from(photo))),
    ))
}

/// GET /photos
pub async fn list_photos(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Json<ApiResponse<PhotoListDto>>, ApiError> {
    let photos: Vec<PhotoDto> = state
        .photos()
        .list(&user)
        .await?
        .into_iter()
        .map(PhotoDto::from)
        .collect();

    Ok(Json(ApiResponse::success(PhotoListDto {
        total: photos.len(),
        photos,
    })))
}

/// GET /photos/{id}
pub async fn get_photo(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<PhotoDto>>, ApiError> {
    let id = validate_photo_id(id)?;
    let photo = state.photos().get(&user, id).await?;
    Ok(Json(ApiResponse::success(PhotoDto::from(photo))))
}

/// PUT /photos/{id}
pub async fn update_photo(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(id): Path<i32>,
    Json(update): Json<PhotoMetadataUpdate>,
) -> Result<Json<ApiResponse<PhotoDto>>, ApiError> {
    let id = validate_photo_id(id)?;
    let photo = state.photos().update(&user, id, update).await?;
    Ok(Json(ApiResponse::success(PhotoDto::from(photo))))
}

/// DELETE /photos/{id}
pub async fn delete_photo(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let id = validate_photo_id(id)?;
    state.photos().delete(&user, id).await?;
    Ok(Json(ApiResponse::success(MessageResponse {
        message: format!("Photo {id} deleted"),
    })))
}

/// GET /photos/{id}/file?mode=original|thumbnail
///
/// Redirects to a presigned URL when the storage backend supports one,
/// otherwise streams the bytes.
pub async fn get_photo_file(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(id): Path<i32>,
    Query(query): Query<FileQuery>,
) -> Result<Response, ApiError> {
    let id = validate_photo_id(id)?;
    let mode = match query.mode.as_deref() {
        Some(mode) => mode.parse::<FileMode>()?,
        None => FileMode::default(),
    };

    match state.photos().open(&user, id, mode).await? {
        PhotoContent::Redirect(url) => Ok(Redirect::temporary(url.as_str()).into_response()),
        PhotoContent::Bytes {
            bytes,
            content_type,
        } => Ok((
            [
                (header::CONTENT_TYPE, content_type),
                (header::CACHE_CONTROL, "private, max-age=3600".to_string()),
            ],
            bytes,
        )
            .into_response()),
    }
}
