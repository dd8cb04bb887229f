//! Configuration Loader
//!
//! Layers built-in defaults, an optional TOML file, and `TASK_REWARDS__*`
//! environment variables into a validated [`EngineConfig`].

use super::error::{ConfigResult, ConfigurationError};
use super::EngineConfig;
use config::{Config, Environment, File, FileFormat};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const ENV_PREFIX: &str = "TASK_REWARDS";
const ENV_SEPARATOR: &str = "__";

/// Loaded configuration plus where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: EngineConfig,
    environment: String,
    config_file: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration, optionally reading a TOML file first
    pub fn load<P: AsRef<Path>>(config_file: Option<P>) -> ConfigResult<Arc<ConfigManager>> {
        let config_file = config_file.map(|p| p.as_ref().to_path_buf());
        let environment = Self::detect_environment();

        let defaults = Config::try_from(&EngineConfig::default())
            .map_err(|e| ConfigurationError::load_error("defaults", e))?;

        let mut builder = Config::builder().add_source(defaults);

        if let Some(path) = &config_file {
            debug!(path = %path.display(), "Adding configuration file source");
            builder = builder.add_source(
                File::from(path.as_path())
                    .format(FileFormat::Toml)
                    .required(true),
            );
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator(ENV_SEPARATOR)
                .separator(ENV_SEPARATOR)
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("access.blocked_countries"),
        );

        let config: EngineConfig = builder
            .build()
            .map_err(|e| {
                ConfigurationError::load_error(
                    config_file
                        .as_ref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| "environment".to_string()),
                    e,
                )
            })?
            .try_deserialize()?;

        config.validate()?;

        info!(
            environment = %environment,
            config_file = ?config_file,
            rate_limit_presets = config.rate_limits.presets.len(),
            cache_instances = config.cache.instances.len(),
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment,
            config_file,
        }))
    }

    /// Wrap an already-built configuration (tests, embedding)
    pub fn from_config(config: EngineConfig) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: Self::detect_environment(),
            config_file: None,
        }))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_file(&self) -> Option<&Path> {
        self.config_file.as_deref()
    }

    /// Current deployment environment name
    pub fn detect_environment() -> String {
        std::env::var("TASK_REWARDS_ENV")
            .or_else(|_| std::env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
    }
}
