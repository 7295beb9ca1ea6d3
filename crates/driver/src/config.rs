//! Driver configuration.
//!
//! Stored as JSON at `$XDG_CONFIG_HOME/panbridge/config.json`, falling
//! back to `~/.config/panbridge/config.json`. The API credentials can be
//! overridden with `PANBRIDGE_API_KEY` and `PANBRIDGE_API_SECRET`.

use std::fmt;
use std::path::{Path, PathBuf};

use panbridge_provider::ProviderConfig;
use panbridge_upload::UploadConfig;
use serde::{Deserialize, Serialize};

use crate::error::DriverError;

pub const API_KEY_ENV: &str = "PANBRIDGE_API_KEY";
pub const API_SECRET_ENV: &str = "PANBRIDGE_API_SECRET";

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub api_key: String,
    pub api_secret: String,
    /// Folder that stands for `/`.
    pub root_folder_id: String,
    pub provider: ProviderConfig,
    pub upload: UploadConfig,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_secret: String::new(),
            root_folder_id: "0".into(),
            provider: ProviderConfig::default(),
            upload: UploadConfig::default(),
        }
    }
}

impl fmt::Debug for DriverConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverConfig")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .field("root_folder_id", &self.root_folder_id)
            .field("provider", &self.provider)
            .field("upload", &self.upload)
            .finish()
    }
}

impl DriverConfig {
    /// Loads the configuration from `path`, or from the default location
    /// when `path` is `None`, then applies the environment overrides.
    ///
    /// A missing file at the default location yields the defaults; a
    /// missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, DriverError> {
        let mut config = match path {
            Some(path) => Self::read(path)?,
            None => match default_path() {
                Some(path) if path.exists() => Self::read(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self, DriverError> {
        let content = std::fs::read_to_string(path).map_err(|source| DriverError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&content).map_err(|source| DriverError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Writes the configuration to `path`, readable by the owner only.
    pub fn save(&self, path: &Path) -> Result<(), DriverError> {
        let io_err = |source| DriverError::ConfigIo {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let content = serde_json::to_string_pretty(self).map_err(|source| {
            DriverError::ConfigParse {
                path: path.to_path_buf(),
                source,
            }
        })?;
        std::fs::write(path, content).map_err(io_err)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
                .map_err(io_err)?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Replaces the credentials with non-empty values from `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(API_KEY_ENV).filter(|v| !v.is_empty()) {
            self.api_key = key;
        }
        if let Some(secret) = lookup(API_SECRET_ENV).filter(|v| !v.is_empty()) {
            self.api_secret = secret;
        }
    }

    pub fn validate(&self) -> Result<(), DriverError> {
        if self.api_key.trim().is_empty() || self.api_secret.trim().is_empty() {
            return Err(DriverError::Config(format!(
                "api_key and api_secret are required (or set {API_KEY_ENV} and {API_SECRET_ENV})"
            )));
        }
        if self.root_folder_id.trim().is_empty() {
            return Err(DriverError::Config("root_folder_id must not be empty".into()));
        }
        self.upload
            .validate()
            .map_err(|e| DriverError::Config(e.to_string()))
    }
}

/// Default configuration file location.
pub fn default_path() -> Option<PathBuf> {
    config_dir(
        std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from),
        std::env::var_os("HOME").map(PathBuf::from),
    )
    .map(|dir| dir.join("panbridge").join("config.json"))
}

fn config_dir(xdg: Option<PathBuf>, home: Option<PathBuf>) -> Option<PathBuf> {
    xdg.filter(|p| p.is_absolute())
        .or_else(|| home.map(|h| h.join(".config")))
}
