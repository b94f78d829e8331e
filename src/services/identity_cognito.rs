//! Identity backed by a Cognito user pool.
//!
//! Users sign in with their email as the Cognito username. The first request
//! carrying a valid access token mirrors the account into the local `users`
//! table so photo rows can reference it.

use crate::clients::cognito::{CognitoClient, GetUserOutput};
use crate::db::Store;
use crate::models::user::{Tokens, User};
use crate::services::identity_service::{
    IdentityError, IdentityProvider, RefreshRequest, SigninRequest, SignupRequest, SignupResult,
};
use async_trait::async_trait;
use tracing::{info, warn};
use validator::Validate;

pub struct CognitoIdentityService {
    client: CognitoClient,
    store: Store,
}

impl CognitoIdentityService {
    #[must_use]
    pub const fn new(client: CognitoClient, store: Store) -> Self {
        Self { client, store }
    }
}

/// Pull `(sub, email, display name)` out of a `GetUser` response.
fn profile_of(output: &GetUserOutput) -> Result<(String, String, String), IdentityError> {
    let sub = output
        .attribute("sub")
        .unwrap_or(output.username.as_str())
        .to_string();
    let email = output
        .attribute("email")
        .map(str::to_string)
        .ok_or_else(|| IdentityError::Provider("Cognito user has no email attribute".into()))?;
    let name = output
        .attribute("name")
        .map_or_else(|| email.clone(), str::to_string);

    Ok((sub, email, name))
}

#[async_trait]
impl IdentityProvider for CognitoIdentityService {
    fn name(&self) -> &'static str {
        "cognito"
    }

    async fn signup(&self, request: SignupRequest) -> Result<SignupResult, IdentityError> {
        request.validate()?;

        let output = self
            .client
            .sign_up(&request.email, &request.password, &request.username)
            .await?;

        info!(email = %request.email, sub = %output.user_sub, "User enrolled in Cognito user pool");

        Ok(SignupResult {
            email: request.email,
            username: request.username,
            user_id: None,
            external_id: Some(output.user_sub),
            confirmed: output.user_confirmed,
        })
    }

    async fn signin(&self, request: SigninRequest) -> Result<Tokens, IdentityError> {
        request.validate()?;

        let result = self
            .client
            .initiate_auth(&request.email, &request.password)
            .await
            .map_err(|e| {
                warn!(email = %request.email, error = %e, "Cognito sign-in failed");
                IdentityError::from(e)
            })?;

        Ok(Tokens {
            access_token: result.access_token,
            refresh_token: result.refresh_token,
        })
    }

    async fn refresh(&self, request: RefreshRequest) -> Result<Tokens, IdentityError> {
        request.validate()?;

        let result = self
            .client
            .refresh_auth(&request.email, &request.refresh_token)
            .await?;

        // REFRESH_TOKEN_AUTH does not rotate the refresh token
        Ok(Tokens {
            access_token: result.access_token,
            refresh_token: result
                .refresh_token
                .or(Some(request.refresh_token)),
        })
    }

    async fn authenticate(&self, access_token: &str) -> Result<User, IdentityError> {
        let output = self.client.get_user(access_token).await.map_err(|e| {
            match IdentityError::from(e) {
                IdentityError::InvalidCredentials | IdentityError::UserNotFound => {
                    IdentityError::Unauthorized
                }
                other => other,
            }
        })?;

        let (sub, email, name) = profile_of(&output)?;
        let user = self.store.upsert_external_user(&sub, &email, &name).await?;

        Ok(user)
    }

    async fn signout(&self, access_token: &str) -> Result<(), IdentityError> {
        self.client.global_sign_out(access_token).await?;
        info!("Cognito tokens revoked");
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
