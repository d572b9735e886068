use super::{
    defaults::DefaultsConfig, evolution::GaConfig, server::ServerConfig, traits::ConfigSection,
};
use crate::error::FeedmixError;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

/// Environment variable prefix, e.g. `FEEDMIX_SERVER__PORT=9000`.
pub const ENV_PREFIX: &str = "FEEDMIX";

pub const DEFAULT_CONFIG_FILE: &str = "feedmix.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub evolution: GaConfig,
    pub defaults: DefaultsConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), FeedmixError> {
        self.server.validate()?;
        self.evolution.validate()?;
        self.defaults.validate()?;
        Ok(())
    }

    /// Built-in defaults, then the TOML file (if present), then environment
    /// variables under `env_prefix`.
    pub fn load_layered<P: AsRef<Path>>(path: P, env_prefix: &str) -> Result<Self, FeedmixError> {
        let path = path.as_ref().to_string_lossy().into_owned();

        let config: AppConfig = Config::builder()
            .add_source(File::new(&path, FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix(env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }
}

pub struct ConfigManager {
    config: Arc<RwLock<AppConfig>>,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            config: Arc::new(RwLock::new(AppConfig::default())),
        }
    }

    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<(), FeedmixError> {
        let config = AppConfig::load_layered(path, ENV_PREFIX)?;
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;
        Ok(())
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), FeedmixError> {
        let toml_str = {
            let config = self.config.read().unwrap_or_else(PoisonError::into_inner);
            toml::to_string_pretty(&*config)?
        };
        std::fs::write(path, toml_str)?;
        Ok(())
    }

    pub fn get(&self) -> AppConfig {
        self.config.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("feedmix-{}-{}.toml", name, std::process::id()))
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = AppConfig::load_layered(temp_path("missing"), "FEEDMIX_TEST_MISSING").unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_file_then_env_layering() {
        let path = temp_path("layered");
        std::fs::write(
            &path,
            "[server]\nport = 6000\n\n[evolution]\npop_size = 40\nmax_gen = 50\n",
        )
        .unwrap();
        std::env::set_var("FEEDMIX_LAYERTEST_SERVER__PORT", "7000");

        let config = AppConfig::load_layered(&path, "FEEDMIX_LAYERTEST").unwrap();

        std::env::remove_var("FEEDMIX_LAYERTEST_SERVER__PORT");
        let _ = std::fs::remove_file(&path);

        assert_eq!(config.server.port, 7000);
        assert_eq!(config.evolution.population_size, 40);
        assert_eq!(config.evolution.max_generations, 50);
        assert_eq!(config.defaults, DefaultsConfig::default());
    }

    #[test]
    fn test_invalid_file_rejected() {
        let path = temp_path("invalid");
        std::fs::write(&path, "[evolution]\npop_size = 2\n").unwrap();

        let result = AppConfig::load_layered(&path, "FEEDMIX_TEST_INVALID");
        let _ = std::fs::remove_file(&path);

        assert!(matches!(result, Err(FeedmixError::Configuration(_))));
    }

    #[test]
    fn test_saved_file_reloads() {
        let source = temp_path("source");
        std::fs::write(&source, "[evolution]\npop_size = 64\n").unwrap();
        let manager = ConfigManager::new();
        manager.load(&source).unwrap();

        let path = temp_path("saved");
        manager.save_to_file(&path).unwrap();
        let reloaded = AppConfig::load_layered(&path, "FEEDMIX_TEST_SAVED").unwrap();
        let _ = std::fs::remove_file(&source);
        let _ = std::fs::remove_file(&path);

        assert_eq!(reloaded.evolution.population_size, 64);
        assert_eq!(reloaded, manager.get());
    }
}
