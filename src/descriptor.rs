//! Plugin descriptor (`plugin.toml`).
//!
//! Every plugin directory must contain a `plugin.toml` file that describes
//! the plugin. The registry reads it during discovery and writes it back when
//! the plugin's status changes.
//!
//! # Example `plugin.toml`
//!
//! ```toml
//! name = "feed_5"
//! version = "1.0.0"
//! language = "python"
//! type = "crawler"
//! status = "running"
//!
//! [environment]
//! runtime = "python3"
//! dependencies = ["feedparser"]
//!
//! [communication]
//! protocol = "stdio"
//!
//! [rate_limits]
//! requests_per_minute = 10
//!
//! [settings]
//! urls = ["https://example.com/rss"]
//! ```
//!
//! Keys the host does not interpret (anything under `[settings]`, and extra
//! keys in `[environment]` or `[communication]`) are preserved through a
//! load/save cycle.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// File name of the descriptor inside a plugin directory.
pub const DESCRIPTOR_FILE: &str = "plugin.toml";

/// Entry file used when `environment.entry` is not declared.
pub const DEFAULT_ENTRY: &str = "main.py";

/// Lifecycle status of a registered plugin.
///
/// ```text
/// discovered ──► Running ◄──► Stopped
///                   │  ▲
///        unhealthy  ▼  │ healthy start
///                  Error
/// ```
///
/// Only `Running` plugins take part in searches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginStatus {
    /// Administratively stopped.
    #[default]
    Stopped,
    /// Eligible for dispatch.
    Running,
    /// The last start attempt failed its health check.
    Error,
}

impl PluginStatus {
    /// Returns `true` if the plugin should receive search requests.
    pub fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for PluginStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Stopped => "stopped",
            Self::Running => "running",
            Self::Error => "error",
        };
        f.write_str(label)
    }
}

/// `[environment]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Runtime the plugin needs (e.g. `python3`). Empty means none.
    #[serde(default)]
    pub runtime: String,
    /// Packages the plugin depends on. Informational; never installed by the host.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Entry file relative to the plugin directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,
    /// Keys this host does not interpret.
    #[serde(flatten)]
    pub extra: toml::Table,
}

impl EnvironmentConfig {
    /// The entry file, falling back to [`DEFAULT_ENTRY`].
    pub fn entry(&self) -> &str {
        self.entry.as_deref().unwrap_or(DEFAULT_ENTRY)
    }
}

/// `[communication]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommunicationConfig {
    /// Binding selector, e.g. `stdio` or `http`.
    pub protocol: String,
    /// Port for network-bound plugins.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Keys this host does not interpret.
    #[serde(flatten)]
    pub extra: toml::Table,
}

/// `[rate_limits]` section. Undeclared fields take the host default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RateLimitOverrides {
    /// Requests per minute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests_per_minute: Option<u32>,
    /// Burst capacity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub burst_size: Option<u32>,
    /// Minimum seconds between two requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_interval: Option<f64>,
}

/// Parsed contents of a `plugin.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    /// Unique plugin name. Sole identity in the registry.
    pub name: String,
    /// Plugin version string.
    pub version: String,
    /// Implementation language, informational.
    #[serde(default)]
    pub language: String,
    /// Plugin kind (e.g. `crawler`, `api`), informational.
    #[serde(rename = "type", default)]
    pub plugin_type: String,
    /// Persisted lifecycle status.
    #[serde(default)]
    pub status: PluginStatus,
    /// Runtime requirements.
    #[serde(default)]
    pub environment: EnvironmentConfig,
    /// How the host talks to the plugin.
    pub communication: CommunicationConfig,
    /// Optional rate limit declaration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limits: Option<RateLimitOverrides>,
    /// Plugin-specific settings, passed through to the capability.
    #[serde(default)]
    pub settings: toml::Table,
}

impl PluginDescriptor {
    /// Parses a descriptor from TOML text and validates it.
    ///
    /// `path` is only used for error reporting.
    pub fn from_toml_str(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let descriptor: Self = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Loads `plugin.toml` from a plugin directory.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::Read`] if the file cannot be read.
    /// - [`ConfigError::Parse`] if it is not a valid descriptor.
    /// - [`ConfigError::Invalid`] if a required field is empty or malformed.
    pub fn load(plugin_dir: &Path) -> Result<Self, ConfigError> {
        let path = Self::path_in(plugin_dir);
        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        Self::from_toml_str(&content, &path)
    }

    /// Writes this descriptor to `plugin.toml` in `plugin_dir`.
    pub fn save(&self, plugin_dir: &Path) -> Result<(), ConfigError> {
        let path = Self::path_in(plugin_dir);
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content).map_err(|source| ConfigError::Write { path, source })
    }

    /// Location of the descriptor file inside `plugin_dir`.
    pub fn path_in(plugin_dir: &Path) -> PathBuf {
        plugin_dir.join(DESCRIPTOR_FILE)
    }

    /// Validates required fields.
    ///
    /// The name must be non-empty and consist of ASCII letters, digits, `_`
    /// or `-`; version and protocol must be non-empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("`name` cannot be empty".to_owned()));
        }
        if !self
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(ConfigError::Invalid(format!(
                "`name` `{}` is invalid (use letters, digits, _ or -)",
                self.name
            )));
        }
        if self.version.trim().is_empty() {
            return Err(ConfigError::Invalid("`version` cannot be empty".to_owned()));
        }
        if self.communication.protocol.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "`communication.protocol` cannot be empty".to_owned(),
            ));
        }
        Ok(())
    }

    /// Returns `true` if both descriptors are identical apart from `status`.
    pub fn same_definition(&self, other: &Self) -> bool {
        let mut other = other.clone();
        other.status = self.status;
        *self == other
    }

    /// Cache key used by environment managers.
    pub fn env_key(&self) -> String {
        format!("{}_{}", self.name, self.version)
    }
}
