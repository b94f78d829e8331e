use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::info;

use crate::clients::cognito::CognitoClient;
use crate::clients::geocoding::GeocodingClient;
use crate::config::{Config, IdentityProviderKind, StorageBackendKind};
use crate::db::Store;
use crate::services::{
    CognitoIdentityService, IdentityProvider, LocalIdentityService, LocalPhotoStorage,
    ObjectPhotoStorage, PhotoService, PhotoStorage, SeaOrmPhotoService,
};

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<RwLock<Config>>,

    pub store: Store,

    pub identity: Arc<dyn IdentityProvider>,

    pub storage: Arc<dyn PhotoStorage>,

    pub photos: Arc<dyn PhotoService>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let identity = build_identity(&config, &store)?;
        let storage = build_storage(&config)?;
        let geocoder = GeocodingClient::from_config(&config.geocoding)?;

        info!(
            identity = identity.name(),
            storage = storage.name(),
            geocoding = geocoder.is_some(),
            "Backends initialized"
        );

        let photos: Arc<dyn PhotoService> = Arc::new(SeaOrmPhotoService::new(
            store.clone(),
            storage.clone(),
            geocoder,
            config.storage.clone(),
        ));

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            store,
            identity,
            storage,
            photos,
        })
    }
}

fn build_identity(config: &Config, store: &Store) -> anyhow::Result<Arc<dyn IdentityProvider>> {
    Ok(match config.identity.provider {
        IdentityProviderKind::Local => Arc::new(LocalIdentityService::new(
            store.clone(),
            config.security.clone(),
        )),
        IdentityProviderKind::Cognito => {
            let client = CognitoClient::new(&config.identity.cognito)
                .map_err(|e| anyhow::anyhow!("Failed to build Cognito client: {e}"))?;
            Arc::new(CognitoIdentityService::new(client, store.clone()))
        }
    })
}

fn build_storage(config: &Config) -> anyhow::Result<Arc<dyn PhotoStorage>> {
    Ok(match config.storage.backend {
        StorageBackendKind::Local => {
            std::fs::create_dir_all(&config.storage.upload_folder)?;
            Arc::new(LocalPhotoStorage::new(&config.storage.upload_folder))
        }
        StorageBackendKind::Object => {
            let bucket_url = config
                .storage
                .bucket_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("storage.bucket_url is required for the object backend"))?;
            Arc::new(ObjectPhotoStorage::from_url(
                bucket_url,
                Duration::from_secs(config.storage.presign_expiry_seconds),
            )?)
        }
    })
}
