//! Identity gateway: sign-up, sign-in, token resolution and sign-out.
//!
//! Two backends implement [`IdentityProvider`]: local accounts stored with
//! Argon2id hashes, and an external Cognito user pool. Both resolve an access
//! token to a row in the local `users` table so photos always have an owner.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

use crate::clients::cognito::CognitoError;
use crate::models::user::{Tokens, User};

/// Errors specific to identity operations.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("User already exists")]
    Conflict,

    #[error("User does not exist")]
    UserNotFound,

    #[error("Password is mismatched or invalid user")]
    InvalidCredentials,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Identity provider error: {0}")]
    Provider(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for IdentityError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<validator::ValidationErrors> for IdentityError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<CognitoError> for IdentityError {
    fn from(err: CognitoError) -> Self {
        match err.code() {
            Some("UsernameExistsException" | "AliasExistsException") => Self::Conflict,
            Some("UserNotFoundException") => Self::UserNotFound,
            Some("NotAuthorizedException") => Self::InvalidCredentials,
            Some(
                "InvalidPasswordException"
                | "InvalidParameterException"
                | "CodeMismatchException"
                | "UserNotConfirmedException"
                | "ChallengeRequired",
            ) => Self::Validation(err.to_string()),
            _ => Self::Provider(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,

    #[validate(length(min = 1, max = 50, message = "Username must be 1-50 characters"))]
    pub username: String,

    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SigninRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,

    #[validate(length(min = 1, max = 128, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RefreshRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,

    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,
}

/// Outcome of a sign-up.
#[derive(Debug, Clone, Serialize)]
pub struct SignupResult {
    pub email: String,
    pub username: String,
    /// Local row id, when the account was created locally.
    pub user_id: Option<i32>,
    /// Provider subject, when the account lives in an external pool.
    pub external_id: Option<String>,
    pub confirmed: bool,
}

#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Short backend name for logs and health output.
    fn name(&self) -> &'static str;

    /// Creates an account.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Conflict`] if the email is already registered.
    async fn signup(&self, request: SignupRequest) -> Result<SignupResult, IdentityError>;

    /// Verifies credentials and returns bearer tokens.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::UserNotFound`] or [`IdentityError::InvalidCredentials`].
    async fn signin(&self, request: SigninRequest) -> Result<Tokens, IdentityError>;

    /// Exchanges a refresh token for a new access token.
    async fn refresh(&self, request: RefreshRequest) -> Result<Tokens, IdentityError>;

    /// Resolves an access token to the local user row.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Unauthorized`] for unknown, expired or revoked tokens.
    async fn authenticate(&self, access_token: &str) -> Result<User, IdentityError>;

    /// Invalidates every token of the caller.
    async fn signout(&self, access_token: &str) -> Result<(), IdentityError>;

    async fn list_users(&self) -> Result<Vec<User>, IdentityError>;

    async fn get_user(&self, id: i32) -> Result<User, IdentityError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signup_validation() {
        let ok = SignupRequest {
            email: "user@example.com".to_string(),
            username: "user".to_string(),
            password: "Password1!".to_string(),
        };
        assert!(ok.validate().is_ok());

        let bad_email = SignupRequest {
            email: "not-an-email".to_string(),
            ..ok.clone()
        };
        let err = IdentityError::from(bad_email.validate().unwrap_err());
        assert!(err.to_string().contains("Invalid email address"));

        let short_password = SignupRequest {
            password: "short".to_string(),
            ..ok.clone()
        };
        assert!(short_password.validate().is_err());

        let empty_username = SignupRequest {
            username: String::new(),
            ..ok.clone()
        };
        assert!(empty_username.validate().is_err());

        let long_username = SignupRequest {
            username: "x".repeat(51),
            ..ok
        };
        assert!(long_username.validate().is_err());
    }

    #[test]
    fn test_signin_validation() {
        let empty_password = SigninRequest {
            email: "user@example.com".to_string(),
            password: String::new(),
        };
        assert!(empty_password.validate().is_err());
    }

    #[test]
    fn test_cognito_error_mapping() {
        let service = |code: &str| CognitoError::Service {
            code: code.to_string(),
            message: "boom".to_string(),
        };

        assert!(matches!(
            IdentityError::from(service("UsernameExistsException")),
            IdentityError::Conflict
        ));
        assert!(matches!(
            IdentityError::from(service("UserNotFoundException")),
            IdentityError::UserNotFound
        ));
        assert!(matches!(
            IdentityError::from(service("NotAuthorizedException")),
            IdentityError::InvalidCredentials
        ));
        assert!(matches!(
            IdentityError::from(service("InvalidPasswordException")),
            IdentityError::Validation(_)
        ));
        assert!(matches!(
            IdentityError::from(service("InternalErrorException")),
            IdentityError::Provider(_)
        ));
        assert_eq!(
            IdentityError::InvalidCredentials.to_string(),
            "Password is mismatched or invalid user"
        );
    }
}
