//! Photo artifact storage.
//!
//! Originals and thumbnails are addressed by slash-separated keys namespaced
//! per user:
//!
//! - `photos/<normalized-email>/<filename>`
//! - `photos/<normalized-email>/thumbnails/<filename>`
//!
//! The email encoding is reversible, so distinct accounts never share a
//! directory.

use bytes::Bytes;
use thiserror::Error;
use url::Url;

const ROOT: &str = "photos";
const THUMBNAIL_DIR: &str = "thumbnails";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage configuration error: {0}")]
    Config(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Object store error: {0}")]
    Backend(String),
}

impl From<object_store::Error> for StorageError {
    fn from(err: object_store::Error) -> Self {
        match err {
            object_store::Error::NotFound { path, .. } => Self::NotFound(path),
            other => Self::Backend(other.to_string()),
        }
    }
}

#[async_trait::async_trait]
pub trait PhotoStorage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] when nothing is stored under `key`.
    async fn get(&self, key: &str) -> Result<Bytes, StorageError>;

    /// Removing a missing object succeeds.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Removes every object under `prefix` and returns how many were deleted.
    async fn delete_prefix(&self, prefix: &str) -> Result<usize, StorageError>;

    /// A time-limited direct download link, or `None` when the backend cannot sign.
    async fn presigned_url(&self, key: &str) -> Result<Option<Url>, StorageError>;
}

/// Map an email to a path-safe directory name.
///
/// `@` becomes `_at_` and `.` becomes `_dot_`. A literal `_` is doubled and
/// any other byte outside `[A-Za-z0-9+-]` becomes `_xHH_`, which keeps the
/// mapping one-to-one.
#[must_use]
pub fn email_normalize(email: &str) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(email.len() + 8);
    for c in email.chars() {
        match c {
            '@' => out.push_str("_at_"),
            '.' => out.push_str("_dot_"),
            '_' => out.push_str("__"),
            c if c.is_ascii_alphanumeric() || c == '+' || c == '-' => out.push(c),
            c => {
                let mut buf = [0u8; 4];
                for byte in c.encode_utf8(&mut buf).bytes() {
                    let _ = write!(out, "_x{byte:02x}_");
                }
            }
        }
    }
    out
}

#[must_use]
pub fn user_prefix(email: &str) -> String {
    format!("{ROOT}/{}", email_normalize(email))
}

#[must_use]
pub fn original_key(email: &str, filename: &str) -> String {
    format!("{}/{filename}", user_prefix(email))
}

#[must_use]
pub fn thumbnail_key(email: &str, filename: &str) -> String {
    format!("{}/{THUMBNAIL_DIR}/{filename}", user_prefix(email))
}

/// Reject keys that could escape the storage root.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..");

    if bad {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_normalize() {
        assert_eq!(
            email_normalize("john.doe@example.co.kr"),
            "john_dot_doe_at_example_dot_co_dot_kr"
        );
        assert_eq!(email_normalize("a_b@x.com"), "a__b_at_x_dot_com");
        assert_eq!(email_normalize("a/b@x.com"), "a_x2f_b_at_x_dot_com");
    }

    #[test]
    fn test_lookalike_emails_get_distinct_prefixes() {
        let emails = [
            "a.b@x.com",
            "a_dot_b@x.com",
            "a_b@x.com",
            "a__b@x.com",
            "a/b@x.com",
            "a_x2f_b@x.com",
            "a@x.com",
        ];
        for (i, a) in emails.iter().enumerate() {
            for b in &emails[i + 1..] {
                let (pa, pb) = (user_prefix(a), user_prefix(b));
                assert_ne!(pa, pb, "{a} and {b} collide");
                assert!(!pa.starts_with(&format!("{pb}/")), "{a} nests under {b}");
                assert!(!pb.starts_with(&format!("{pa}/")), "{b} nests under {a}");
            }
            assert!(validate_key(&original_key(a, "x.jpg")).is_ok());
        }
    }

    #[test]
    fn test_key_layout() {
        assert_eq!(
            original_key("a@b.com", "x.jpg"),
            "photos/a_at_b_dot_com/x.jpg"
        );
        assert_eq!(
            thumbnail_key("a@b.com", "x.jpg"),
            "photos/a_at_b_dot_com/thumbnails/x.jpg"
        );
        assert!(thumbnail_key("a@b.com", "x.jpg").starts_with(&user_prefix("a@b.com")));
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("photos/a_at_b/x.jpg").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("/etc/passwd").is_err());
        assert!(validate_key("photos/../secret").is_err());
        assert!(validate_key("photos//x.jpg").is_err());
        assert!(validate_key("photos\\x.jpg").is_err());
    }
}
