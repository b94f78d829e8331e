use crate::config::SecurityConfig;
use crate::models::photo::{NewPhoto, Photo, PhotoMetadataUpdate};
use crate::models::user::{Tokens, User};
use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod migrator;
pub mod repositories;

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    fn photo_repo(&self) -> repositories::photo::PhotoRepository {
        repositories::photo::PhotoRepository::new(self.conn.clone())
    }

    // Users

    pub async fn create_user(
        &self,
        email: &str,
        username: &str,
        password: &str,
        security: &SecurityConfig,
    ) -> Result<Option<User>> {
        self.user_repo()
            .create(email, username, password, security)
            .await
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.user_repo().get_by_email(email).await
    }

    pub async fn get_user_by_id(&self, id: i32) -> Result<Option<User>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn get_user_by_token(&self, token: &str) -> Result<Option<User>> {
        self.user_repo().get_by_access_token(token).await
    }

    pub async fn get_user_by_external_id(&self, external_id: &str) -> Result<Option<User>> {
        self.user_repo().get_by_external_id(external_id).await
    }

    pub async fn upsert_external_user(
        &self,
        external_id: &str,
        email: &str,
        username: &str,
    ) -> Result<User> {
        self.user_repo()
            .upsert_external(external_id, email, username)
            .await
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        self.user_repo().list().await
    }

    pub async fn delete_user(&self, id: i32) -> Result<bool> {
        self.user_repo().delete(id).await
    }

    pub async fn verify_user_password(&self, email: &str, password: &str) -> Result<Option<User>> {
        self.user_repo().verify_password(email, password).await
    }

    pub async fn issue_tokens(&self, user_id: i32) -> Result<Tokens> {
        self.user_repo().issue_tokens(user_id).await
    }

    pub async fn refresh_tokens(
        &self,
        user_id: i32,
        refresh_token: &str,
    ) -> Result<Option<Tokens>> {
        self.user_repo().refresh_tokens(user_id, refresh_token).await
    }

    pub async fn revoke_tokens(&self, user_id: i32) -> Result<()> {
        self.user_repo().revoke_tokens(user_id).await
    }

    // Photos

    pub async fn insert_photo(&self, photo: NewPhoto) -> Result<Photo> {
        self.photo_repo().insert(photo).await
    }

    pub async fn get_photo_for_user(&self, user_id: i32, id: i32) -> Result<Option<Photo>> {
        self.photo_repo().get_for_user(user_id, id).await
    }

    pub async fn list_photos_for_user(&self, user_id: i32) -> Result<Vec<Photo>> {
        self.photo_repo().list_for_user(user_id).await
    }

    pub async fn update_photo_metadata(
        &self,
        user_id: i32,
        id: i32,
        update: PhotoMetadataUpdate,
    ) -> Result<Option<Photo>> {
        self.photo_repo().update_metadata(user_id, id, update).await
    }

    pub async fn delete_photo(&self, user_id: i32, id: i32) -> Result<bool> {
        self.photo_repo().delete(user_id, id).await
    }

    pub async fn count_photos_for_user(&self, user_id: i32) -> Result<u64> {
        self.photo_repo().count_for_user(user_id).await
    }
}
