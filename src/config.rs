//! Application configuration with sensible defaults.
//!
//! [`DragnetConfig`] is loaded from a TOML file (conventionally
//! `dragnet.toml`). Every section is optional; missing fields fall back to
//! their defaults, so an empty file is a valid configuration.

use crate::error::ConfigError;
use crate::rate_limiter::RateLimitConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DragnetConfig {
    /// Directory scanned for plugin sub-directories.
    pub plugin_dir: PathBuf,
    /// Search behaviour.
    pub search: SearchSettings,
    /// Rate limiting defaults and clamp policy.
    pub rate_limit: RateLimitSettings,
    /// HTTP client settings for web-page plugins.
    pub http: HttpSettings,
}

impl Default for DragnetConfig {
    fn default() -> Self {
        Self {
            plugin_dir: PathBuf::from("plugins"),
            search: SearchSettings::default(),
            rate_limit: RateLimitSettings::default(),
            http: HttpSettings::default(),
        }
    }
}

/// Search coordinator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Deadline applied when a request does not carry its own timeout.
    pub default_timeout_secs: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            default_timeout_secs: 30,
        }
    }
}

/// Rate limiter settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    /// Limits applied to plugins that declare none, and the ceiling for the
    /// conservative clamp.
    pub default: RateLimitConfig,
    /// Never let a plugin ask for more than `default` allows.
    pub enforce_conservative: bool,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            default: RateLimitConfig::default(),
            enforce_conservative: true,
        }
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Custom User-Agent. If `None`, rotates through a built-in list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: 10,
            user_agent: None,
        }
    }
}

impl DragnetConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written.
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(write_err)
    }

    /// Validates this configuration.
    ///
    /// Checks:
    /// - `search.default_timeout_secs` must be greater than 0
    /// - `http.request_timeout_secs` must be greater than 0
    /// - `rate_limit.default` must itself be a valid limiter config
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.search.default_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "search.default_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.http.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "http.request_timeout_secs must be greater than 0".into(),
            ));
        }
        self.rate_limit
            .default
            .validate()
            .map_err(|reason| ConfigError::Invalid(format!("rate_limit.default: {reason}")))
    }
}
