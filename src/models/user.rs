use serde::{Deserialize, Serialize};

/// Marker stored in `password_hash` for accounts owned by an external provider.
pub const EXTERNAL_PASSWORD_MARKER: &str = "!external";

/// User data without credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i32,
    pub email: String,
    pub username: String,
    pub external_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Bearer credentials handed out at sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
}
