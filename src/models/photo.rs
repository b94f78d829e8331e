use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    pub id: i32,
    pub user_id: i32,
    pub tags: Option<String>,
    pub description: Option<String>,
    pub filename_orig: String,
    pub filename: String,
    pub filesize: i64,
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

/// Row data for a freshly uploaded photo; `id` and `upload_date` are assigned on insert.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewPhoto {
    pub user_id: i32,
    pub tags: Option<String>,
    pub description: Option<String>,
    pub filename_orig: String,
    pub filename: String,
    pub filesize: i64,
    pub geotag_lat: Option<f64>,
    pub geotag_lng: Option<f64>,
    pub taken_date: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub city: Option<String>,
    pub nation: Option<String>,
    pub address: Option<String>,
}

/// Editable photo fields. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PhotoMetadataUpdate {
    pub tags: Option<String>,
    pub description: Option<String>,
    pub city: Option<String>,
    pub nation: Option<String>,
    pub address: Option<String>,
}

impl PhotoMetadataUpdate {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.tags.is_none()
            && self.description.is_none()
            && self.city.is_none()
            && self.nation.is_none()
            && self.address.is_none()
    }
}
