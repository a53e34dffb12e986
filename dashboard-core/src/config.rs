use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

/// Environment variable consulted when the config file carries no key.
pub const API_KEY_ENV: &str = "OPENWEATHER_API_KEY";

const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

/// Client configuration, stored on disk as TOML.
///
/// Example:
/// ```toml
/// api_key = "..."
/// cache_ttl_secs = 300
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// OpenWeather API key. May instead come from `OPENWEATHER_API_KEY`.
    pub api_key: Option<String>,

    /// Provider endpoint root. Only overridden in tests.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Freshness window for cached responses, in seconds.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_cache_ttl_secs() -> u64 {
    crate::cache::WeatherCache::DEFAULT_WINDOW_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

/// Errors from reading or writing the config file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine platform config directory")]
    NoConfigDir,

    #[error("Failed to read config file {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },

    #[error("Failed to parse config file {path}: {source}")]
    ParseToml { path: PathBuf, source: toml::de::Error },

    #[error("Failed to serialize configuration to TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Failed to write config file {path}: {source}")]
    Write { path: PathBuf, source: std::io::Error },
}

impl Config {
    /// Load config from disk, or return defaults if no file exists yet.
    /// `OPENWEATHER_API_KEY` in the environment overrides the stored key.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_file_path()?;

        let mut cfg = if path.exists() {
            let contents = fs::read_to_string(&path)
                .map_err(|source| ConfigError::Read { path: path.clone(), source })?;
            toml::from_str(&contents)
                .map_err(|source| ConfigError::ParseToml { path: path.clone(), source })?
        } else {
            Self::default()
        };

        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.is_empty() {
                cfg.api_key = Some(key);
            }
        }

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| ConfigError::Write { path: parent.to_path_buf(), source })?;
        }

        let toml = toml::to_string_pretty(self)?;
        fs::write(&path, toml).map_err(|source| ConfigError::Write { path, source })?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf, ConfigError> {
        let dirs = ProjectDirs::from("dev", "weather-dashboard", "dashboard-cli")
            .ok_or(ConfigError::NoConfigDir)?;

        Ok(dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_openweather_with_five_minute_window() {
        let cfg = Config::default();

        assert!(cfg.api_key.is_none());
        assert_eq!(cfg.base_url, "https://api.openweathermap.org/data/2.5");
        assert_eq!(cfg.cache_ttl_secs, 300);
    }

    #[test]
    fn minimal_toml_fills_in_defaults() {
        let cfg: Config = toml::from_str("api_key = \"KEY\"").expect("valid config");

        assert_eq!(cfg.api_key.as_deref(), Some("KEY"));
        assert_eq!(cfg.base_url, "https://api.openweathermap.org/data/2.5");
        assert_eq!(cfg.cache_ttl_secs, 300);
    }

    #[test]
    fn explicit_fields_override_defaults() {
        let cfg: Config = toml::from_str(
            "api_key = \"KEY\"\nbase_url = \"http://localhost:9999\"\ncache_ttl_secs = 60\n",
        )
        .expect("valid config");

        assert_eq!(cfg.base_url, "http://localhost:9999");
        assert_eq!(cfg.cache_ttl_secs, 60);
    }

    #[test]
    fn config_round_trips_through_toml() {
        let cfg = Config {
            api_key: Some("KEY".to_string()),
            base_url: "http://localhost:1234".to_string(),
            cache_ttl_secs: 120,
        };

        let toml = toml::to_string_pretty(&cfg).expect("serializes");
        let back: Config = toml::from_str(&toml).expect("parses");

        assert_eq!(back.api_key.as_deref(), Some("KEY"));
        assert_eq!(back.base_url, cfg.base_url);
        assert_eq!(back.cache_ttl_secs, 120);
    }
}
