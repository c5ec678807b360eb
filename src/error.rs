//! Error types for the dragnet crate.
//!
//! Each concern gets its own enum so callers can tell which failures are
//! absorbed locally (discovery, dispatch, validation) and which reach an
//! administrative caller (config, registry).

use std::path::PathBuf;

/// A plugin candidate could not be registered during a discovery pass.
///
/// Discovery errors are isolated per candidate and never abort the scan.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// `plugin.toml` could not be read or parsed, or failed validation.
    #[error("malformed descriptor at {}: {reason}", path.display())]
    Malformed {
        /// Path of the offending descriptor file.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },

    /// The plugin's runtime environment could not be provided.
    #[error("environment for plugin {name} unavailable: {source}")]
    Environment {
        /// Plugin name.
        name: String,
        /// Underlying environment failure.
        #[source]
        source: EnvironmentError,
    },

    /// No binder is registered for the descriptor's protocol.
    #[error("plugin {name} declares unsupported protocol {protocol:?}")]
    MissingBinding {
        /// Plugin name.
        name: String,
        /// The protocol that had no binder.
        protocol: String,
    },

    /// A binder exists but refused the descriptor.
    #[error("could not bind plugin {name}: {reason}")]
    Binding {
        /// Plugin name.
        name: String,
        /// Why binding failed.
        reason: String,
    },

    /// Another candidate in the same pass already claimed this name.
    #[error("duplicate plugin name {name}")]
    DuplicateName {
        /// The contested name.
        name: String,
    },
}

/// A single plugin failed to serve one search request.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The plugin is not registered.
    #[error("plugin {plugin} is not registered")]
    NotFound {
        /// Requested plugin name.
        plugin: String,
    },

    /// The plugin's capability raised an error.
    #[error("plugin {plugin} failed: {source}")]
    Capability {
        /// Plugin name.
        plugin: String,
        /// What the capability reported.
        #[source]
        source: CapabilityError,
    },

    /// The plugin did not answer within the search deadline.
    #[error("plugin {plugin} timed out after {timeout_secs}s")]
    Timeout {
        /// Plugin name.
        plugin: String,
        /// The deadline that expired.
        timeout_secs: u64,
    },
}

/// Errors raised by a bound plugin capability.
#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    /// An HTTP request to the data source failed.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Source output could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// The plugin process could not be spawned or exited.
    #[error("process error: {0}")]
    Process(String),

    /// The plugin process violated the JSON-RPC protocol or reported an error.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A capability-level operation timed out.
    #[error("operation timed out after {timeout_secs}s")]
    Timeout {
        /// The timeout duration in seconds.
        timeout_secs: u64,
    },

    /// The capability does not support the requested operation or settings.
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl From<serde_json::Error> for CapabilityError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(format!("JSON error: {err}"))
    }
}

/// A raw plugin result is missing a required field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// `platform` was empty.
    #[error("result has no platform")]
    MissingPlatform,

    /// `content` was empty.
    #[error("result has no content")]
    MissingContent,
}

/// A configuration or descriptor document could not be read or written.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// File path.
        path: PathBuf,
        /// I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The file contents are not valid TOML for the expected shape.
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        /// File path.
        path: PathBuf,
        /// TOML failure.
        #[source]
        source: toml::de::Error,
    },

    /// The value could not be rendered as TOML.
    #[error("failed to serialize: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The file could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        /// File path.
        path: PathBuf,
        /// I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The document parsed but holds invalid values.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// The runtime environment a plugin declares could not be provided.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvironmentError {
    /// No interpreter matching the runtime was found on `PATH`.
    #[error("runtime {runtime:?} not found on PATH")]
    RuntimeNotFound {
        /// The declared runtime.
        runtime: String,
    },

    /// The runtime string is not something this host can provide.
    #[error("unsupported runtime {runtime:?}")]
    Unsupported {
        /// The declared runtime.
        runtime: String,
    },
}

/// Registry-level failures surfaced to administrative callers.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// No discovery pass has completed yet.
    #[error("plugin registry has not been discovered yet")]
    NotDiscovered,

    /// The named plugin is not registered.
    #[error("plugin {name} not found")]
    NotFound {
        /// Requested plugin name.
        name: String,
    },

    /// The plugin directory itself could not be scanned.
    #[error("failed to scan plugin directory {}: {source}", path.display())]
    ScanFailed {
        /// The plugin directory.
        path: PathBuf,
        /// I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// A descriptor could not be persisted.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Hard failures of a whole search request.
///
/// Partial plugin failures never produce a `SearchError`; they are reported
/// through [`crate::types::SearchResponse::error`].
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The request keyword was empty or whitespace.
    #[error("search keyword must not be empty")]
    EmptyKeyword,

    /// The registry could not be queried.
    #[error("registry unavailable: {0}")]
    Registry(#[from] RegistryError),
}

/// The host bridge lost its stdio channel.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Reading commands or writing responses failed.
    #[error("bridge I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// A response could not be serialized.
    #[error("failed to serialize response envelope: {0}")]
    Serialize(#[from] serde_json::Error),
}
