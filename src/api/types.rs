use serde::{Deserialize, Serialize};

use crate::models::photo::Photo;
use crate::models::user::{Tokens, User};
use crate::services::SignupResult;
use crate::services::image::sizeof_fmt;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct UserDto {
    pub id: i32,
    pub email: String,
    pub username: String,
    pub created_at: String,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SignupDto {
    pub email: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub confirmed: bool,
}

impl From<SignupResult> for SignupDto {
    fn from(result: SignupResult) -> Self {
        Self {
            email: result.email,
            username: result.username,
            user_id: result.user_id,
            external_id: result.external_id,
            confirmed: result.confirmed,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokensDto {
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub token_type: String,
}

impl From<Tokens> for TokensDto {
    fn from(tokens: Tokens) -> Self {
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            token_type: "Bearer".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PhotoDto {
    pub id: i32,
    pub tags: Option<String>,
    pub description: Option<String>,
    pub filename_orig: String,
    pub filename: String,
    pub filesize: i64,
    pub filesize_human: String,
    pub geotag_lat: Option<f64>,
    pub geotag_lng: Option<f64>,
    pub upload_date: String,
    pub taken_date: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub city: Option<String>,
    pub nation: Option<String>,
    pub address: Option<String>,
}

impl From<Photo> for PhotoDto {
    fn from(photo: Photo) -> Self {
        Self {
            id: photo.id,
            filesize_human: sizeof_fmt(u64::try_from(photo.filesize).unwrap_or_default()),
            tags: photo.tags,
            description: photo.description,
            filename_orig: photo.filename_orig,
            filename: photo.filename,
            filesize: photo.filesize,
            geotag_lat: photo.geotag_lat,
            geotag_lng: photo.geotag_lng,
            upload_date: photo.upload_date,
            taken_date: photo.taken_date,
            make: photo.make,
            model: photo.model,
            width: photo.width,
            height: photo.height,
            city: photo.city,
            nation: photo.nation,
            address: photo.address,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PhotoListDto {
    pub total: usize,
    pub photos: Vec<PhotoDto>,
}
