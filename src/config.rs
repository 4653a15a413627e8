use crate::cli::Cli;
use crate::schema_loader::DEFAULT_SCHEMA_SOURCES;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Trait for abstracting environment variable access
pub trait EnvProvider {
    fn get(&self, key: &str) -> Option<String>;
}

/// System environment variable provider for production use
pub struct SystemEnvProvider;

impl EnvProvider for SystemEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable error: {0}")]
    Environment(String),

    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub schemas: SchemaConfig,
    pub network: NetworkConfig,
}

/// HTTP service configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub bind: String,
    /// Largest accepted request body
    pub max_body_bytes: usize,
}

/// Schema set configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchemaConfig {
    /// Schema locations (URLs or local paths), in compilation order
    pub sources: Vec<String>,
    /// Where schema documents are staged while the set is compiled
    pub staging_dir: PathBuf,
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    /// HTTP request timeout in seconds
    pub timeout_seconds: u64,
    /// User agent sent when downloading schemas
    pub user_agent: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            sources: DEFAULT_SCHEMA_SOURCES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            staging_dir: dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("kml-validator"),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            user_agent: format!("kml-validator/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Configuration manager for loading and merging configurations
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration with precedence: file -> environment -> CLI
    pub async fn load_config(cli: &Cli) -> Result<Config> {
        let mut config = Config::default();

        if let Some(config_path) = &cli.config {
            config = Self::load_from_file(config_path).await?;
        } else if let Some(found_config) = Self::find_config_file().await? {
            config = found_config;
        }

        config = Self::apply_environment_overrides(config)?;
        config = Self::merge_with_cli(config, cli);

        Self::validate_config(&config)?;

        Ok(config)
    }

    /// Load configuration from a file (TOML or JSON)
    pub async fn load_from_file(path: &Path) -> Result<Config> {
        let content = tokio::fs::read_to_string(path).await?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(toml::from_str(&content)?),
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => {
                // Try to parse as TOML first, then JSON
                if let Ok(config) = toml::from_str::<Config>(&content) {
                    Ok(config)
                } else {
                    Ok(serde_json::from_str(&content)?)
                }
            }
        }
    }

    /// Find configuration file in standard locations
    pub async fn find_config_file() -> Result<Option<Config>> {
        let config_names = [
            "kml-validator.toml",
            "kml-validator.json",
            ".kml-validator.toml",
            ".kml-validator.json",
        ];

        for name in &config_names {
            let path = PathBuf::from(name);
            if path.exists() {
                tracing::debug!(path = %path.display(), "using configuration file");
                return Ok(Some(Self::load_from_file(&path).await?));
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let app_config_dir = config_dir.join("kml-validator");
            for name in &config_names {
                let path = app_config_dir.join(name);
                if path.exists() {
                    tracing::debug!(path = %path.display(), "using configuration file");
                    return Ok(Some(Self::load_from_file(&path).await?));
                }
            }
        }

        Ok(None)
    }

    /// Apply environment variable overrides using the system environment
    pub fn apply_environment_overrides(config: Config) -> Result<Config> {
        Self::apply_environment_overrides_with(&SystemEnvProvider, config)
    }

    /// Apply environment variable overrides with a custom environment provider
    pub fn apply_environment_overrides_with(
        env: &impl EnvProvider,
        mut config: Config,
    ) -> Result<Config> {
        if let Some(bind) = env.get("KML_VALIDATOR_BIND") {
            config.server.bind = bind;
        }

        if let Some(max_body) = env.get("KML_VALIDATOR_MAX_BODY_BYTES") {
            config.server.max_body_bytes = max_body.parse().map_err(|_| {
                ConfigError::Environment(format!(
                    "Invalid KML_VALIDATOR_MAX_BODY_BYTES value: {}",
                    max_body
                ))
            })?;
        }

        if let Some(schemas) = env.get("KML_VALIDATOR_SCHEMAS") {
            config.schemas.sources = schemas
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Some(staging_dir) = env.get("KML_VALIDATOR_STAGING_DIR") {
            config.schemas.staging_dir = PathBuf::from(staging_dir);
        }

        if let Some(timeout) = env.get("KML_VALIDATOR_TIMEOUT") {
            config.network.timeout_seconds = timeout.parse().map_err(|_| {
                ConfigError::Environment(format!(
                    "Invalid KML_VALIDATOR_TIMEOUT value: {}",
                    timeout
                ))
            })?;
        }

        Ok(config)
    }

    /// Merge CLI arguments with configuration (CLI takes precedence)
    pub fn merge_with_cli(mut config: Config, cli: &Cli) -> Config {
        if !cli.schemas.is_empty() {
            config.schemas.sources = cli.schemas.clone();
        }
        if let Some(staging_dir) = &cli.staging_dir {
            config.schemas.staging_dir = staging_dir.clone();
        }
        if let Some(timeout) = cli.timeout {
            config.network.timeout_seconds = timeout;
        }
        if let Some(bind) = cli.bind() {
            config.server.bind = bind.to_string();
        }

        config
    }

    /// Validate configuration values
    pub fn validate_config(config: &Config) -> Result<()> {
        if config.schemas.sources.is_empty() {
            return Err(ConfigError::Validation(
                "At least one schema source must be configured".to_string(),
            ));
        }

        if config.server.max_body_bytes == 0 {
            return Err(ConfigError::Validation(
                "Request body limit must be greater than 0".to_string(),
            ));
        }

        if config.network.timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "Timeout must be greater than 0".to_string(),
            ));
        }

        if config.server.bind.trim().is_empty() {
            return Err(ConfigError::Validation(
                "Bind address must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}
