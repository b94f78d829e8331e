use anyhow::{Context, Result};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    SqlErr,
};
use tokio::task;

use crate::config::SecurityConfig;
use crate::entities::users;
use crate::models::user::{EXTERNAL_PASSWORD_MARKER, Tokens, User};

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            email: model.email,
            username: model.username,
            external_id: model.external_id,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Insert a local account. Returns `None` when the email is already registered.
    pub async fn create(
        &self,
        email: &str,
        username: &str,
        password: &str,
        security: &SecurityConfig,
    ) -> Result<Option<User>> {
        if self.get_by_email(email).await?.is_some() {
            return Ok(None);
        }

        let password = password.to_string();
        let security = security.clone();
        let password_hash = task::spawn_blocking(move || hash_password(&password, Some(&security)))
            .await
            .context("Password hashing task panicked")??;

        let now = chrono::Utc::now().to_rfc3339();
        let active = users::ActiveModel {
            email: Set(email.to_string()),
            username: Set(username.to_string()),
            password_hash: Set(password_hash),
            external_id: Set(None),
            access_token: Set(None),
            refresh_token: Set(None),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        match active.insert(&self.conn).await {
            Ok(model) => Ok(Some(User::from(model))),
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                Ok(None)
            }
            Err(e) => Err(e).context("Failed to insert user"),
        }
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.conn)
            .await
            .context("Failed to query user by email")?;

        Ok(user.map(User::from))
    }

    pub async fn get_by_id(&self, id: i32) -> Result<Option<User>> {
        let user = users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")?;

        Ok(user.map(User::from))
    }

    pub async fn get_by_external_id(&self, external_id: &str) -> Result<Option<User>> {
        let user = users::Entity::find()
            .filter(users::Column::ExternalId.eq(external_id))
            .one(&self.conn)
            .await
            .context("Failed to query user by external ID")?;

        Ok(user.map(User::from))
    }

    pub async fn get_by_access_token(&self, token: &str) -> Result<Option<User>> {
        let user = users::Entity::find()
            .filter(users::Column::AccessToken.eq(token))
            .one(&self.conn)
            .await
            .context("Failed to query user by access token")?;

        Ok(user.map(User::from))
    }

    pub async fn list(&self) -> Result<Vec<User>> {
        let rows = users::Entity::find()
            .order_by_asc(users::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list users")?;

        Ok(rows.into_iter().map(User::from).collect())
    }

    /// Mirror an account owned by the external provider into the local table.
    ///
    /// Looks the row up by subject first, then by email so a local account that
    /// later signs in through the provider keeps its photos.
    pub async fn upsert_external(
        &self,
        external_id: &str,
        email: &str,
        username: &str,
    ) -> Result<User> {
        let existing = match users::Entity::find()
            .filter(users::Column::ExternalId.eq(external_id))
            .one(&self.conn)
            .await?
        {
            Some(model) => Some(model),
            None => {
                users::Entity::find()
                    .filter(users::Column::Email.eq(email))
                    .one(&self.conn)
                    .await?
            }
        };

        let now = chrono::Utc::now().to_rfc3339();

        if let Some(model) = existing {
            let unchanged = model.external_id.as_deref() == Some(external_id)
                && model.email == email
                && model.username == username;
            if unchanged {
                return Ok(User::from(model));
            }

            let mut active: users::ActiveModel = model.into();
            active.external_id = Set(Some(external_id.to_string()));
            active.email = Set(email.to_string());
            active.username = Set(username.to_string());
            active.updated_at = Set(now);
            let model = active
                .update(&self.conn)
                .await
                .context("Failed to update external user")?;
            return Ok(User::from(model));
        }

        let active = users::ActiveModel {
            email: Set(email.to_string()),
            username: Set(username.to_string()),
            password_hash: Set(EXTERNAL_PASSWORD_MARKER.to_string()),
            external_id: Set(Some(external_id.to_string())),
            access_token: Set(None),
            refresh_token: Set(None),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = active
            .insert(&self.conn)
            .await
            .context("Failed to insert external user")?;
        Ok(User::from(model))
    }

    /// Verify password for a user.
    /// Argon2 runs on the blocking pool; accounts managed externally never match.
    pub async fn verify_password(&self, email: &str, password: &str) -> Result<Option<User>> {
        let user = users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.conn)
            .await
            .context("Failed to query user for password verification")?;

        let Some(user) = user else {
            return Ok(None);
        };

        if user.password_hash == EXTERNAL_PASSWORD_MARKER {
            return Ok(None);
        }

        let password_hash = user.password_hash.clone();
        let password = password.to_string();

        let is_valid = task::spawn_blocking(move || {
            let parsed_hash = PasswordHash::new(&password_hash)
                .map_err(|e| anyhow::anyhow!("Invalid password hash format: {e}"))?;

            Ok::<bool, anyhow::Error>(
                Argon2::default()
                    .verify_password(password.as_bytes(), &parsed_hash)
                    .is_ok(),
            )
        })
        .await
        .context("Password verification task panicked")??;

        Ok(is_valid.then(|| User::from(user)))
    }

    /// Return the user's live tokens, minting a fresh pair if none exist.
    pub async fn issue_tokens(&self, user_id: i32) -> Result<Tokens> {
        let user = users::Entity::find_by_id(user_id)
            .one(&self.conn)
            .await
            .context("Failed to query user for token issue")?
            .ok_or_else(|| anyhow::anyhow!("User not found: {user_id}"))?;

        if let (Some(access_token), Some(refresh_token)) =
            (user.access_token.clone(), user.refresh_token.clone())
        {
            return Ok(Tokens {
                access_token,
                refresh_token: Some(refresh_token),
            });
        }

        let tokens = Tokens {
            access_token: generate_token(),
            refresh_token: Some(generate_token()),
        };

        let mut active: users::ActiveModel = user.into();
        active.access_token = Set(Some(tokens.access_token.clone()));
        active.refresh_token = Set(tokens.refresh_token.clone());
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());
        active.update(&self.conn).await?;

        Ok(tokens)
    }

    /// Rotate the access token when `refresh_token` belongs to `user_id`.
    pub async fn refresh_tokens(&self, user_id: i32, refresh_token: &str) -> Result<Option<Tokens>> {
        let user = users::Entity::find_by_id(user_id)
            .filter(users::Column::RefreshToken.eq(refresh_token))
            .one(&self.conn)
            .await
            .context("Failed to query user by refresh token")?;

        let Some(user) = user else {
            return Ok(None);
        };

        let tokens = Tokens {
            access_token: generate_token(),
            refresh_token: Some(refresh_token.to_string()),
        };

        let mut active: users::ActiveModel = user.into();
        active.access_token = Set(Some(tokens.access_token.clone()));
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());
        active.update(&self.conn).await?;

        Ok(Some(tokens))
    }

    pub async fn revoke_tokens(&self, user_id: i32) -> Result<()> {
        let Some(user) = users::Entity::find_by_id(user_id).one(&self.conn).await? else {
            return Ok(());
        };

        let mut active: users::ActiveModel = user.into();
        active.access_token = Set(None);
        active.refresh_token = Set(None);
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());
        active.update(&self.conn).await?;

        Ok(())
    }

    /// Delete a user; photo rows go with it through the foreign key cascade.
    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = users::Entity::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("Failed to delete user")?;

        Ok(result.rows_affected > 0)
    }
}

/// Hash a password using Argon2id with optional custom params.
/// If config is None, uses the crate defaults.
pub fn hash_password(password: &str, config: Option<&SecurityConfig>) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let argon2 = if let Some(cfg) = config {
        let params = Params::new(
            cfg.argon2_memory_cost_kib,
            cfg.argon2_time_cost,
            cfg.argon2_parallelism,
            None,
        )
        .map_err(|e| anyhow::anyhow!("Invalid Argon2 params: {e}"))?;
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
    } else {
        Argon2::default()
    };

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;

    Ok(hash.to_string())
}

/// Generate a random bearer token (64 character hex string)
#[must_use]
pub fn generate_token() -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();

    bytes.iter().fold(String::with_capacity(64), |mut acc, b| {
        use std::fmt::Write;
        let _ = write!(acc, "{b:02x}");
        acc
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_token_shape() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_password_verifies() {
        let config = SecurityConfig {
            argon2_memory_cost_kib: 1024,
            argon2_time_cost: 1,
            argon2_parallelism: 1,
        };
        let hash = hash_password("Password1!", Some(&config)).unwrap();
        let parsed = PasswordHash::new(&hash).unwrap();
        assert!(
            Argon2::default()
                .verify_password(b"Password1!", &parsed)
                .is_ok()
        );
        assert!(Argon2::default().verify_password(b"wrong", &parsed).is_err());
    }
}
