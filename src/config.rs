use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub storage: StorageConfig,

    pub identity: IdentityConfig,

    pub geocoding: GeocodingConfig,

    pub observability: ObservabilityConfig,

    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/cloudalbum.db".to_string(),
            log_level: "info".to_string(),
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,

    pub cors_allowed_origins: Vec<String>,

    /// Whether to set the Secure flag on session cookies.
    /// Set to false for local development without HTTPS.
    pub secure_cookies: bool,

    /// Largest accepted upload body, in megabytes.
    pub max_upload_mb: usize,

    /// Session inactivity timeout in minutes.
    pub session_idle_minutes: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            cors_allowed_origins: vec!["*".to_string()],
            secure_cookies: true,
            max_upload_mb: 20,
            session_idle_minutes: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    Local,
    Object,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackendKind,

    /// Root directory for the local backend.
    pub upload_folder: String,

    /// Object store location for the object backend:
    /// `s3://bucket/prefix`, `file:///path` or `memory://`.
    pub bucket_url: Option<String>,

    /// Lifetime of presigned GET URLs.
    pub presign_expiry_seconds: u64,

    pub thumbnail_width: u32,

    pub thumbnail_height: u32,

    pub allowed_extensions: Vec<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackendKind::Local,
            upload_folder: "./uploads".to_string(),
            bucket_url: None,
            presign_expiry_seconds: 3600,
            thumbnail_width: 300,
            thumbnail_height: 200,
            allowed_extensions: ["png", "jpg", "jpeg", "gif", "webp"]
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityProviderKind {
    Local,
    Cognito,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub provider: IdentityProviderKind,

    pub cognito: CognitoConfig,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            provider: IdentityProviderKind::Local,
            cognito: CognitoConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CognitoConfig {
    pub region: String,

    pub pool_id: String,

    pub client_id: String,

    pub client_secret: String,

    /// Overrides `https://cognito-idp.<region>.amazonaws.com/`, for emulators.
    pub endpoint: Option<String>,

    pub request_timeout_seconds: u64,
}

impl Default for CognitoConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            pool_id: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            endpoint: None,
            request_timeout_seconds: 10,
        }
    }
}

impl CognitoConfig {
    #[must_use]
    pub fn endpoint_url(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| format!("https://cognito-idp.{}.amazonaws.com/", self.region))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodingConfig {
    /// Google Maps API key. Reverse geocoding is disabled when unset.
    pub api_key: Option<String>,

    pub base_url: String,

    pub request_timeout_seconds: u64,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://maps.googleapis.com/maps/api/geocode/json".to_string(),
            request_timeout_seconds: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Argon2 memory cost in KiB (default: 8192 = 8MB)
    pub argon2_memory_cost_kib: u32,

    /// Argon2 time cost (iterations)
    pub argon2_time_cost: u32,

    /// Argon2 parallelism (default: 1)
    pub argon2_parallelism: u32,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            argon2_memory_cost_kib: 8192,
            argon2_time_cost: 3,
            argon2_parallelism: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub loki_enabled: bool,

    pub loki_url: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            identity: IdentityConfig::default(),
            geocoding: GeocodingConfig::default(),
            observability: ObservabilityConfig::default(),
            security: SecurityConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let paths = Self::config_paths();

        let mut config = None;
        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                config = Some(Self::load_from_path(path)?);
                break;
            }
        }

        let mut config = config.unwrap_or_else(|| {
            info!("No config file found, using defaults");
            Self::default()
        });
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Applies `CLOUDALBUM_*` variables on top of the file configuration.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("CLOUDALBUM_DATABASE_PATH") {
            self.general.database_path = v;
        }
        if let Some(v) = lookup("CLOUDALBUM_PORT") {
            self.server.port = v
                .parse()
                .with_context(|| format!("Invalid CLOUDALBUM_PORT: {v}"))?;
        }
        if let Some(v) = lookup("CLOUDALBUM_STORAGE_BACKEND") {
            self.storage.backend = match v.to_ascii_lowercase().as_str() {
                "local" => StorageBackendKind::Local,
                "object" | "s3" => StorageBackendKind::Object,
                other => anyhow::bail!("Unknown storage backend: {other}"),
            };
        }
        if let Some(v) = lookup("CLOUDALBUM_UPLOAD_FOLDER") {
            self.storage.upload_folder = v;
        }
        if let Some(v) = lookup("CLOUDALBUM_BUCKET_URL") {
            self.storage.bucket_url = Some(v);
        }
        if let Some(v) = lookup("CLOUDALBUM_IDENTITY_PROVIDER") {
            self.identity.provider = match v.to_ascii_lowercase().as_str() {
                "local" => IdentityProviderKind::Local,
                "cognito" => IdentityProviderKind::Cognito,
                other => anyhow::bail!("Unknown identity provider: {other}"),
            };
        }
        if let Some(v) = lookup("CLOUDALBUM_COGNITO_POOL_ID") {
            self.identity.cognito.pool_id = v;
        }
        if let Some(v) = lookup("CLOUDALBUM_COGNITO_CLIENT_ID") {
            self.identity.cognito.client_id = v;
        }
        if let Some(v) = lookup("CLOUDALBUM_COGNITO_CLIENT_SECRET") {
            self.identity.cognito.client_secret = v;
        }
        if let Some(v) = lookup("CLOUDALBUM_GMAPS_KEY") {
            self.geocoding.api_key = Some(v);
        }
        Ok(())
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("cloudalbum").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".cloudalbum").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.storage.thumbnail_width == 0 || self.storage.thumbnail_height == 0 {
            anyhow::bail!("Thumbnail dimensions must be greater than zero");
        }

        if self.storage.allowed_extensions.is_empty() {
            anyhow::bail!("At least one allowed file extension is required");
        }

        match self.storage.backend {
            StorageBackendKind::Local if self.storage.upload_folder.is_empty() => {
                anyhow::bail!("storage.upload_folder cannot be empty for the local backend");
            }
            StorageBackendKind::Object
                if self.storage.bucket_url.as_deref().unwrap_or("").is_empty() =>
            {
                anyhow::bail!("storage.bucket_url must be set for the object backend");
            }
            _ => {}
        }

        if self.identity.provider == IdentityProviderKind::Cognito {
            let cognito = &self.identity.cognito;
            if cognito.pool_id.is_empty() || cognito.client_id.is_empty() {
                anyhow::bail!("Cognito pool_id and client_id are required");
            }
        }

        if self.server.max_upload_mb == 0 {
            anyhow::bail!("server.max_upload_mb must be greater than zero");
        }

        Ok(())
    }
}
