//! Configuration loading for offline-cli.
//!
//! Configuration is loaded from a TOML file (default: `offline.toml` in the
//! working directory, if present).

use offline_first_client::ValidateOptions;
use offline_first_types::Platform;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "offline.toml";

/// Root configuration for offline-cli.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Application settings.
    #[serde(default)]
    pub app: AppConfig,
    /// File locations.
    #[serde(default)]
    pub paths: PathsConfig,
}

/// Application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Platform reported to actions (default: web).
    #[serde(default = "default_platform")]
    pub platform: Platform,
    /// Parameter validation options.
    #[serde(default)]
    pub validate: ValidateOptions,
}

/// File locations.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Directory for the outbox (default: platform data dir).
    pub data_dir: Option<PathBuf>,
    /// JSON file acting as the remote store (default: `<data_dir>/remote.json`).
    pub remote: Option<PathBuf>,
}

// Default value functions
fn default_platform() -> Platform {
    Platform::Web
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            platform: default_platform(),
            validate: ValidateOptions::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Load `explicit` if given, else `offline.toml` if it exists, else defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let local = Path::new(DEFAULT_CONFIG_FILE);
                if local.exists() {
                    Self::from_file(local)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Remote file inside `data_dir` unless configured elsewhere.
    pub fn remote_path(&self, data_dir: &Path) -> PathBuf {
        self.paths
            .remote
            .clone()
            .unwrap_or_else(|| data_dir.join("remote.json"))
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_config_is_web() {
        let config = Config::default();
        assert_eq!(config.app.platform, Platform::Web);
        assert!(config.app.validate.abort_early);
        assert!(config.paths.data_dir.is_none());
    }

    #[test]
    fn config_from_toml_string() {
        let toml = r#"
[app]
platform = "react-native"

[app.validate]
abortEarly = false
stripUnknown = true

[paths]
data_dir = "/data/outbox"
remote = "/data/remote.json"
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.app.platform, Platform::ReactNative);
        assert!(!config.app.validate.abort_early);
        assert!(config.app.validate.strip_unknown);
        assert_eq!(config.paths.data_dir, Some(PathBuf::from("/data/outbox")));
        assert_eq!(
            config.remote_path(Path::new("/ignored")),
            PathBuf::from("/data/remote.json")
        );
    }

    #[test]
    fn config_missing_sections_use_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.app.platform, Platform::Web);
        assert_eq!(
            config.remote_path(Path::new("/d")),
            PathBuf::from("/d/remote.json")
        );
    }

    #[test]
    fn unknown_platform_fails_to_parse() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("offline.toml");
        std::fs::write(&path, "[app]\nplatform = \"windows\"\n").unwrap();

        let err = Config::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn missing_explicit_file_is_a_read_error() {
        let dir = tempdir().unwrap();
        let err = Config::discover(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }
}
