//! ABOUTME: Central configuration management for the P8FS memory substrate
//! ABOUTME: Handles TOML parsing, validation, and `P8FS_`-prefixed environment overrides

use serde::{Deserialize, Serialize};
use std::env as std_env;
use std::path::Path;
use tracing::debug;

pub mod dreaming;
pub mod embeddings;
pub mod ingest;
pub mod storage;

pub use dreaming::DreamingConfig;
pub use embeddings::{EmbeddingProviderKind, EmbeddingsConfig};
pub use ingest::IngestConfig;
pub use storage::{Dialect, KvConfig, StorageConfig};

/// Environment variable prefix for all overrides (kept for documentation).
#[allow(dead_code)]
const ENV_PREFIX: &str = "P8FS_";

const CONFIG_SEARCH_PATHS: &[&str] =
    &["p8fs.toml", ".p8fs.toml", "config/p8fs.toml", ".config/p8fs.toml"];

/// Top-level configuration for every p8fs-* binary and worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct P8fsConfig {
    pub storage: StorageConfig,
    pub kv: KvConfig,
    pub embeddings: EmbeddingsConfig,
    pub dreaming: DreamingConfig,
    pub ingest: IngestConfig,
}

impl Default for P8fsConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            kv: KvConfig::default(),
            embeddings: EmbeddingsConfig::default(),
            dreaming: DreamingConfig::default(),
            ingest: IngestConfig::default(),
        }
    }
}

impl P8fsConfig {
    /// Load configuration from a TOML file, applying environment overrides
    /// and validation in the same step.
    pub async fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::NotFound { path: path.display().to_string(), message: e.to_string() })?;
        Self::from_toml(&content)
    }

    /// Search [`CONFIG_SEARCH_PATHS`] in order and load the first match.
    pub async fn discover_and_load() -> Result<Self, ConfigError> {
        for candidate in CONFIG_SEARCH_PATHS {
            let path = Path::new(candidate);
            if tokio::fs::try_exists(path).await.unwrap_or(false) {
                debug!("loading configuration from {}", path.display());
                return Self::load_from_file(path).await;
            }
        }
        debug!("no configuration file found, using defaults with environment overrides");
        let mut config = Self::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(content)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `P8FS_`-prefixed environment variable overrides.
    ///
    /// Unlike the source workspace's generalized `EnvRegistry`, this reads a
    /// fixed, small set of variables directly: the surface is one config
    /// struct with five sections rather than a pluggable script-engine
    /// configuration tree.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(v) = std_env::var("P8FS_STORAGE_CONNECTION_STRING") {
            debug!("overriding storage.connection_string from environment");
            self.storage.connection_string = v;
        }
        if let Ok(v) = std_env::var("P8FS_STORAGE_DIALECT") {
            self.storage.dialect = match v.to_lowercase().as_str() {
                "postgres" | "postgresql" => Dialect::Postgres,
                "mysql" | "tidb" => Dialect::MySql,
                other => {
                    return Err(ConfigError::Environment {
                        message: format!("unknown P8FS_STORAGE_DIALECT: {other}"),
                    })
                }
            };
        }
        if let Ok(v) = std_env::var("P8FS_STORAGE_MAX_POOL_SIZE") {
            self.storage.max_pool_size = v.parse().map_err(|_| ConfigError::Environment {
                message: "P8FS_STORAGE_MAX_POOL_SIZE must be an integer".to_string(),
            })?;
        }
        if let Ok(v) = std_env::var("P8FS_KV_DATA_DIR") {
            self.kv.data_dir = v;
        }
        if let Ok(v) = std_env::var("P8FS_EMBEDDINGS_ENDPOINT") {
            self.embeddings.endpoint = v;
        }
        if let Ok(v) = std_env::var("P8FS_EMBEDDINGS_MODEL") {
            self.embeddings.model = v;
        }
        if let Ok(v) = std_env::var("P8FS_INGEST_WORKER_CONCURRENCY") {
            self.ingest.worker_concurrency = v.parse().map_err(|_| ConfigError::Environment {
                message: "P8FS_INGEST_WORKER_CONCURRENCY must be an integer".to_string(),
            })?;
        }
        Ok(())
    }

    /// Validate cross-field invariants the source invariants name explicitly.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.connection_string.trim().is_empty() {
            return Err(ConfigError::Validation {
                field: Some("storage.connection_string".to_string()),
                message: "connection string must not be empty".to_string(),
            });
        }
        if self.storage.max_pool_size == 0 || self.storage.max_pool_size > 100 {
            return Err(ConfigError::Validation {
                field: Some("storage.max_pool_size".to_string()),
                message: "pool size must be in 1..=100".to_string(),
            });
        }
        if self.dreaming.daily_affinity_hour_utc >= 24 {
            return Err(ConfigError::Validation {
                field: Some("dreaming.daily_affinity_hour_utc".to_string()),
                message: "hour must be 0..=23".to_string(),
            });
        }
        if !(0.0..1.0).contains(&self.dreaming.response_buffer_fraction) {
            return Err(ConfigError::Validation {
                field: Some("dreaming.response_buffer_fraction".to_string()),
                message: "must be in [0, 1)".to_string(),
            });
        }
        if self.ingest.worker_concurrency == 0 {
            return Err(ConfigError::Validation {
                field: Some("ingest.worker_concurrency".to_string()),
                message: "must be at least 1".to_string(),
            });
        }
        if self.embeddings.dimension == 0 {
            return Err(ConfigError::Validation {
                field: Some("embeddings.dimension".to_string()),
                message: "must be nonzero".to_string(),
            });
        }
        Ok(())
    }
}

/// Configuration errors (mirrors [`p8fs_core::P8fsError`]'s kinds for the
/// narrower set of failures that can occur before a tenant context exists).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration file not found: {path} - {message}")]
    NotFound { path: String, message: String },

    #[error("configuration validation failed in field '{field:?}': {message}")]
    Validation { field: Option<String>, message: String },

    #[error("environment variable error: {message}")]
    Environment { message: String },

    #[error("toml parsing error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl From<ConfigError> for p8fs_core::P8fsError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { message, .. } => p8fs_core::P8fsError::validation(message),
            ConfigError::NotFound { path, message } => {
                p8fs_core::P8fsError::not_found(format!("{path}: {message}"))
            }
            other => p8fs_core::P8fsError::internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_fails_validation_without_connection_string() {
        let config = P8fsConfig::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn from_toml_applies_values_and_validates() {
        let toml_src = r#"
            [storage]
            dialect = "postgres"
            connection_string = "postgres://localhost/p8fs"
            max_pool_size = 20

            [embeddings]
            provider = "http"
            endpoint = "http://localhost:9000/embed"
            dimension = 768
        "#;
        let config = P8fsConfig::from_toml(toml_src).expect("valid config");
        assert_eq!(config.storage.dialect, Dialect::Postgres);
        assert_eq!(config.storage.max_pool_size, 20);
        assert_eq!(config.embeddings.dimension, 768);
    }

    #[test]
    fn rejects_out_of_range_pool_size() {
        let toml_src = r#"
            [storage]
            connection_string = "postgres://localhost/p8fs"
            max_pool_size = 0
        "#;
        assert!(P8fsConfig::from_toml(toml_src).is_err());
    }

    #[test]
    fn rejects_unknown_dialect_env_override() {
        std_env::set_var("P8FS_STORAGE_DIALECT", "oracle");
        let mut config = P8fsConfig::default();
        config.storage.connection_string = "postgres://localhost/p8fs".to_string();
        let result = config.apply_env_overrides();
        std_env::remove_var("P8FS_STORAGE_DIALECT");
        assert!(result.is_err());
    }
}
