//! Application configuration
//!
//! Runtime knobs for the control surface, stored as TOML at
//! `~/.config/cadenza/config.toml`. Profiles live in their own JSON file
//! (see [`store`](crate::domain::store)); this file only carries settings.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, error, info, instrument};

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Sample rate the host graph runs at.
    pub sample_rate: u32,

    /// Number of points sampled for the plotted response curve.
    pub response_points: usize,

    /// LED count over the full meter travel.
    pub meter_span_units: u32,

    /// Render ticks per second.
    pub tick_hz: u32,

    /// Quiescence window for debounced profile saves, in milliseconds.
    pub write_quiescence_ms: u64,

    /// Profile file location.
    pub profile_path: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            response_points: 256,
            meter_span_units: 20,
            tick_hz: 30,
            write_quiescence_ms: 500,
            profile_path: PathBuf::from("profiles.json"),
        }
    }
}

impl AppConfig {
    #[instrument(skip(path))]
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = fs::read_to_string(path).await?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;

        debug!("Configuration loaded successfully");
        Ok(config)
    }

    #[instrument(skip(self, path))]
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        info!(path = %path.display(), "Saving configuration");

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let toml_str = toml::to_string_pretty(self)?;
        fs::write(path, toml_str).await?;

        debug!("Configuration saved successfully");
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(ConfigError::Invalid("sample_rate must be non-zero".into()));
        }
        if self.response_points == 0 {
            return Err(ConfigError::Invalid(
                "response_points must be non-zero".into(),
            ));
        }
        if self.tick_hz == 0 {
            return Err(ConfigError::Invalid("tick_hz must be non-zero".into()));
        }
        Ok(())
    }
}

/// Manages the main configuration file with corrupt-file fallback
pub struct ConfigManager {
    config_dir: PathBuf,
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new(config_dir: PathBuf) -> Self {
        let config_path = config_dir.join("config.toml");
        Self {
            config_dir,
            config_path,
        }
    }

    /// `~/.config/cadenza` on Linux and macOS, `%APPDATA%\cadenza` on
    /// Windows.
    pub fn default_config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("cadenza"))
            .ok_or_else(|| ConfigError::Invalid("Could not determine config directory".into()))
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load the configuration, creating a default file on first launch and
    /// falling back to defaults (with a backup) when the file is corrupt.
    #[instrument(skip(self))]
    pub async fn load(&self) -> AppConfig {
        if !self.config_path.exists() {
            info!(
                path = %self.config_path.display(),
                "Config file not found, creating default"
            );

            let config = AppConfig::default();
            if let Err(e) = config.save_to_file(&self.config_path).await {
                error!(
                    path = %self.config_path.display(),
                    error = %e,
                    "Failed to save default config"
                );
            }
            return config;
        }

        match AppConfig::load_from_file(&self.config_path).await {
            Ok(config) => config,
            Err(e) => {
                error!(
                    path = %self.config_path.display(),
                    error = %e,
                    "Failed to load config, using defaults"
                );

                let backup_path = self.config_path.with_extension("toml.corrupt");
                if let Err(copy_err) = fs::copy(&self.config_path, &backup_path).await {
                    error!(
                        path = %backup_path.display(),
                        error = %copy_err,
                        "Failed to back up corrupt config"
                    );
                }

                AppConfig::default()
            }
        }
    }

    #[instrument(skip(self, config))]
    pub async fn save(&self, config: &AppConfig) -> Result<()> {
        fs::create_dir_all(&self.config_dir).await?;
        config.save_to_file(&self.config_path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_serialization_round_trip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_validation_rejects_zeroes() {
        let mut config = AppConfig::default();
        config.tick_hz = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.sample_rate = 0;
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_manager_creates_default_on_first_launch() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::new(dir.path().to_path_buf());

        let config = manager.load().await;
        assert_eq!(config, AppConfig::default());
        assert!(manager.config_path().exists());
    }

    #[tokio::test]
    async fn test_manager_falls_back_on_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::new(dir.path().to_path_buf());
        fs::write(manager.config_path(), "sample_rate = \"many\"")
            .await
            .unwrap();

        let config = manager.load().await;
        assert_eq!(config, AppConfig::default());
        assert!(manager
            .config_path()
            .with_extension("toml.corrupt")
            .exists());
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::new(dir.path().to_path_buf());

        let mut config = AppConfig::default();
        config.tick_hz = 60;
        manager.save(&config).await.unwrap();

        let loaded = manager.load().await;
        assert_eq!(loaded.tick_hz, 60);
    }
}
