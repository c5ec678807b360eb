//! Administrative facade over the registry, limiter and coordinator.
//!
//! [`AdminApi`] is what an outer surface (the stdio host bridge, or an HTTP
//! layer built on top of this crate) talks to. Lifecycle commands never fail
//! outright; they report an [`AdminOutcome`] instead.

use crate::capability::BinderSet;
use crate::config::DragnetConfig;
use crate::coordinator::SearchCoordinator;
use crate::descriptor::{PluginDescriptor, PluginStatus};
use crate::environment::{EnvironmentManager, HostEnvironment};
use crate::error::{CapabilityError, RegistryError, SearchError};
use crate::rate_limiter::{PluginStats, RateLimiterManager};
use crate::registry::{DiscoveryReport, PluginRegistry};
use crate::types::{SearchRequest, SearchResponse};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Whether an administrative command took effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// The command took effect.
    Success,
    /// The command did not take effect; see the message.
    Failure,
}

/// Result of a lifecycle command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminOutcome {
    /// Success or failure.
    pub status: OutcomeStatus,
    /// Human-readable detail.
    pub message: String,
}

impl AdminOutcome {
    /// A success outcome.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Success,
            message: message.into(),
        }
    }

    /// A failure outcome.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Failure,
            message: message.into(),
        }
    }

    /// Returns `true` for [`OutcomeStatus::Success`].
    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}

/// Entry point for administrative callers.
#[derive(Debug, Clone)]
pub struct AdminApi {
    registry: Arc<PluginRegistry>,
    limiter: Arc<RateLimiterManager>,
    coordinator: SearchCoordinator,
}

impl AdminApi {
    /// Wires an API over existing components.
    pub fn new(
        registry: Arc<PluginRegistry>,
        limiter: Arc<RateLimiterManager>,
        default_timeout_secs: u64,
    ) -> Self {
        let coordinator = SearchCoordinator::new(
            Arc::clone(&registry),
            Arc::clone(&limiter),
            default_timeout_secs,
        );
        Self {
            registry,
            limiter,
            coordinator,
        }
    }

    /// Builds the full stack from configuration: host environment, built-in
    /// binders, limiter and registry. No discovery is run.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::Http`] if the shared HTTP client cannot be
    /// built.
    pub fn from_config(config: &DragnetConfig) -> Result<Self, CapabilityError> {
        let environment: Arc<dyn EnvironmentManager> = Arc::new(HostEnvironment::new());
        let registry = PluginRegistry::new(
            config.plugin_dir.clone(),
            BinderSet::builtin(config)?,
            environment,
        );
        let limiter = RateLimiterManager::from_settings(&config.rate_limit);
        Ok(Self::new(
            Arc::new(registry),
            Arc::new(limiter),
            config.search.default_timeout_secs,
        ))
    }

    /// The underlying registry.
    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    /// Runs a discovery pass.
    pub async fn discover(&self) -> Result<DiscoveryReport, RegistryError> {
        self.registry.discover().await
    }

    /// Runs one search.
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, SearchError> {
        self.coordinator.search(request).await
    }

    /// Every registered plugin, sorted by name.
    pub fn list_active_plugins(&self) -> Result<Vec<PluginDescriptor>, RegistryError> {
        self.registry.get_active()
    }

    /// Health-checks the plugin and marks it `running` or `error`.
    pub async fn start_plugin(&self, name: &str) -> AdminOutcome {
        match self.registry.start(name).await {
            Ok(PluginStatus::Running) => AdminOutcome::success(format!("plugin {name} started")),
            Ok(status) => AdminOutcome::failure(format!(
                "plugin {name} failed its health check (status: {status})"
            )),
            Err(e) => AdminOutcome::failure(e.to_string()),
        }
    }

    /// Marks the plugin `stopped`.
    pub fn stop_plugin(&self, name: &str) -> AdminOutcome {
        match self.registry.stop(name) {
            Ok(_) => AdminOutcome::success(format!("plugin {name} stopped")),
            Err(e) => AdminOutcome::failure(e.to_string()),
        }
    }

    /// Rate limiter counters for a registered plugin.
    ///
    /// # Errors
    ///
    /// [`RegistryError::NotDiscovered`] or [`RegistryError::NotFound`].
    pub fn get_plugin_stats(&self, name: &str) -> Result<PluginStats, RegistryError> {
        self.registry.descriptor(name)?;
        Ok(self.limiter.stats(name))
    }
}
