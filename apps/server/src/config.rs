//! # Server Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     SHOPKEEP_SERVER__PORT=8080                                         │
//! │     SHOPKEEP_EMAIL__API_KEY=re_...                                     │
//! │                                                                         │
//! │  2. TOML Config File (optional)                                        │
//! │     ./shopkeep.toml, or the path in SHOPKEEP_CONFIG                    │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     AppConfig::default()                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//!
//! [database]
//! path = "/var/lib/shopkeep/shop.db"
//! max_connections = 5
//!
//! [media]
//! dir = "/var/lib/shopkeep/media"
//! max_bytes = 5242880
//!
//! [email]
//! api_base = "https://api.resend.com"
//! api_key = "re_..."
//! from = "Loja <loja@example.com>"
//!
//! [digest]
//! enabled = true
//! hour_utc = 21
//! recipients = "dona@example.com"
//! ```

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use shopkeep_core::DEFAULT_STORE_ID;
use shopkeep_db::DbConfig;
use tracing::debug;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "shopkeep.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub store: StoreConfig,
    pub media: MediaConfig,
    pub email: EmailConfig,
    pub digest: DigestConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file; defaults to the platform data directory.
    pub path: Option<PathBuf>,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Root directory for product photos and logos.
    pub dir: PathBuf,
    /// Largest accepted upload.
    pub max_bytes: usize,
}

/// Transactional email API (Resend-compatible).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub api_base: String,
    pub api_key: Option<String>,
    pub from: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestConfig {
    pub enabled: bool,
    /// Hour of day (UTC) the digest is sent.
    pub hour_utc: u32,
    /// Used when the store settings have no recipients. Comma separated.
    pub recipients: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                path: None,
                max_connections: 5,
            },
            store: StoreConfig {
                id: DEFAULT_STORE_ID.to_string(),
            },
            media: MediaConfig {
                dir: PathBuf::from("media"),
                max_bytes: 5 * 1024 * 1024,
            },
            email: EmailConfig {
                api_base: "https://api.resend.com".to_string(),
                api_key: None,
                from: None,
            },
            digest: DigestConfig {
                enabled: false,
                hour_utc: 21,
                recipients: String::new(),
            },
        }
    }
}

impl AppConfig {
    /// Loads configuration from `SHOPKEEP_CONFIG` (or `./shopkeep.toml`) and
    /// the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let file = std::env::var("SHOPKEEP_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(CONFIG_FILE));
        Self::load_from(&file)
    }

    /// Loads configuration with `file` as the (optional) TOML layer.
    pub fn load_from(file: &Path) -> Result<Self, ConfigError> {
        debug!(file = %file.display(), "Loading configuration");

        let config: AppConfig = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::from(file).required(false))
            .add_source(
                config::Environment::with_prefix("SHOPKEEP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must not be 0".to_string()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        if self.store.id.trim().is_empty() {
            return Err(ConfigError::Invalid("store.id must not be empty".to_string()));
        }
        if self.media.max_bytes == 0 {
            return Err(ConfigError::Invalid("media.max_bytes must be positive".to_string()));
        }
        if self.digest.hour_utc > 23 {
            return Err(ConfigError::Invalid("digest.hour_utc must be 0-23".to_string()));
        }
        Ok(())
    }

    /// `host:port` to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Database file path, falling back to the platform data directory.
    ///
    /// - **macOS**: `~/Library/Application Support/com.shopkeep.shopkeep/shopkeep.db`
    /// - **Windows**: `%APPDATA%\shopkeep\shopkeep\data\shopkeep.db`
    /// - **Linux**: `~/.local/share/shopkeep/shopkeep.db`
    pub fn database_path(&self) -> PathBuf {
        if let Some(path) = &self.database.path {
            return path.clone();
        }
        match ProjectDirs::from("com", "shopkeep", "shopkeep") {
            Some(dirs) => dirs.data_dir().join("shopkeep.db"),
            None => PathBuf::from("shopkeep.db"),
        }
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database_path())
            .max_connections(self.database.max_connections)
            .store_id(self.store.id.clone())
    }

    /// Whether the email API can be used at all.
    pub fn email_enabled(&self) -> bool {
        self.email.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
            && self.email.from.as_deref().is_some_and(|f| !f.trim().is_empty())
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
