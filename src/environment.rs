//! Runtime environments for plugins.
//!
//! The registry calls [`EnvironmentManager::ensure_environment`] for every
//! discovered descriptor before binding its capability. Provisioning
//! (virtualenvs, containers, dependency installs) is out of scope for this
//! crate; [`HostEnvironment`] only resolves an interpreter already on `PATH`.

use crate::descriptor::PluginDescriptor;
use crate::error::EnvironmentError;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

/// A resolved runtime for one plugin version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentHandle {
    /// Cache key, `<name>_<version>`.
    pub key: String,
    /// Interpreter used to launch the entry file. `None` runs the entry
    /// directly, or means the plugin needs no process at all.
    pub interpreter: Option<PathBuf>,
}

impl EnvironmentHandle {
    /// A handle with no interpreter.
    pub fn bare(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            interpreter: None,
        }
    }
}

/// Provides a runtime environment for a plugin descriptor.
pub trait EnvironmentManager: Send + Sync {
    /// Returns a handle for `descriptor`, creating or resolving it if needed.
    fn ensure_environment(
        &self,
        descriptor: &PluginDescriptor,
    ) -> Result<EnvironmentHandle, EnvironmentError>;
}

/// Resolves `environment.runtime` against the host `PATH`.
///
/// Handles are cached by `<name>_<version>`, so a plugin keeps its resolved
/// interpreter across discovery passes until its version changes.
#[derive(Debug, Default)]
pub struct HostEnvironment {
    cache: Mutex<HashMap<String, EnvironmentHandle>>,
}

impl HostEnvironment {
    /// Creates a manager with an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached handles.
    pub fn cached(&self) -> usize {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn resolve(runtime: &str) -> Result<PathBuf, EnvironmentError> {
        if runtime.contains(char::is_whitespace) {
            return Err(EnvironmentError::Unsupported {
                runtime: runtime.to_owned(),
            });
        }
        // `python` commonly means `python3` on modern hosts.
        let candidates: &[&str] = match runtime {
            "python" => &["python3", "python"],
            "node" | "nodejs" => &["node", "nodejs"],
            _ => std::slice::from_ref(&runtime),
        };
        candidates
            .iter()
            .find_map(|name| which::which(name).ok())
            .ok_or_else(|| EnvironmentError::RuntimeNotFound {
                runtime: runtime.to_owned(),
            })
    }
}

impl EnvironmentManager for HostEnvironment {
    fn ensure_environment(
        &self,
        descriptor: &PluginDescriptor,
    ) -> Result<EnvironmentHandle, EnvironmentError> {
        let key = descriptor.env_key();
        if let Some(handle) = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(handle.clone());
        }

        let runtime = descriptor.environment.runtime.trim();
        let handle = if runtime.is_empty() {
            EnvironmentHandle::bare(key.clone())
        } else {
            let interpreter = Self::resolve(runtime)?;
            tracing::debug!(
                plugin = %descriptor.name,
                runtime,
                interpreter = %interpreter.display(),
                "resolved plugin runtime"
            );
            EnvironmentHandle {
                key: key.clone(),
                interpreter: Some(interpreter),
            }
        };

        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, handle.clone());
        Ok(handle)
    }
}
