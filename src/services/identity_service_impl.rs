//! Local accounts backed by the `users` table.

use crate::config::SecurityConfig;
use crate::db::Store;
use crate::models::user::{Tokens, User};
use crate::services::identity_service::{
    IdentityError, IdentityProvider, RefreshRequest, SigninRequest, SignupRequest, SignupResult,
};
use async_trait::async_trait;
use tracing::{debug, info};
use validator::Validate;

pub struct LocalIdentityService {
    store: Store,
    security: SecurityConfig,
}

impl LocalIdentityService {
    #[must_use]
    pub const fn new(store: Store, security: SecurityConfig) -> Self {
        Self { store, security }
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityService {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn signup(&self, request: SignupRequest) -> Result<SignupResult, IdentityError> {
        request.validate()?;

        let user = self
            .store
            .create_user(
                &request.email,
                &request.username,
                &request.password,
                &self.security,
            )
            .await?
            .ok_or(IdentityError::Conflict)?;

        info!(user_id = user.id, email = %user.email, "User signed up");

        Ok(SignupResult {
            email: user.email,
            username: user.username,
            user_id: Some(user.id),
            external_id: None,
            confirmed: true,
        })
    }

    async fn signin(&self, request: SigninRequest) -> Result<Tokens, IdentityError> {
        request.validate()?;

        if self.store.get_user_by_email(&request.email).await?.is_none() {
            return Err(IdentityError::UserNotFound);
        }

        let user = self
            .store
            .verify_user_password(&request.email, &request.password)
            .await?
            .ok_or(IdentityError::InvalidCredentials)?;

        let tokens = self.store.issue_tokens(user.id).await?;
        debug!(user_id = user.id, "Issued access token");

        Ok(tokens)
    }

    async fn refresh(&self, request: RefreshRequest) -> Result<Tokens, IdentityError> {
        request.validate()?;

        let user = self
            .store
            .get_user_by_email(&request.email)
            .await?
            .ok_or(IdentityError::Unauthorized)?;

        self.store
            .refresh_tokens(user.id, &request.refresh_token)
            .await?
            .ok_or(IdentityError::Unauthorized)
    }

    async fn authenticate(&self, access_token: &str) -> Result<User, IdentityError> {
        self.store
            .get_user_by_token(access_token)
            .await?
            .ok_or(IdentityError::Unauthorized)
    }

    async fn signout(&self, access_token: &str) -> Result<(), IdentityError> {
        let user = self.authenticate(access_token).await?;
        self.store.revoke_tokens(user.id).await?;
        info!(user_id = user.id, "User signed out");
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<User>, IdentityError> {
        Ok(self.store.list_users().await?)
    }

    async fn get_user(&self, id: i32) -> Result<User, IdentityError> {
        self.store
            .get_user_by_id(id)
            .await?
            .ok_or(IdentityError::UserNotFound)
    }
}
