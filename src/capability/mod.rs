//! Plugin capabilities and the binder table that creates them.
//!
//! A capability is the behaviour behind a registered plugin: it can search for
//! a keyword and report its health. The registry never knows how a capability
//! works; it asks the [`BinderSet`] for the binder matching the descriptor's
//! `communication.protocol` and stores whatever comes back.
//!
//! Two binders ship with the crate:
//!
//! - [`stdio::StdioBinder`] (`protocol = "stdio"`): an out-of-process plugin
//!   speaking newline-delimited JSON-RPC 2.0.
//! - [`web::WebBinder`] (`protocol = "http"`): fetches configured pages and
//!   extracts their readable text.

pub mod protocol;
pub mod stdio;
pub mod web;

use crate::config::DragnetConfig;
use crate::descriptor::PluginDescriptor;
use crate::environment::EnvironmentHandle;
use crate::error::CapabilityError;
use crate::types::RawResult;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Behaviour contract of a bound plugin.
#[async_trait]
pub trait PluginCapability: Send + Sync {
    /// Searches the plugin's source for `keyword`.
    async fn search(&self, keyword: &str) -> Result<Vec<RawResult>, CapabilityError>;

    /// Best-effort health check.
    async fn health_check(&self) -> Result<bool, CapabilityError>;
}

/// Everything a binder may use to construct a capability.
#[derive(Debug, Clone, Copy)]
pub struct BindContext<'a> {
    /// The parsed descriptor.
    pub descriptor: &'a PluginDescriptor,
    /// Directory the descriptor was found in.
    pub plugin_dir: &'a Path,
    /// Runtime resolved by the environment manager.
    pub environment: &'a EnvironmentHandle,
}

/// Constructs capabilities for one communication protocol.
pub trait CapabilityBinder: Send + Sync {
    /// Protocol name matched against `communication.protocol`.
    fn protocol(&self) -> &str;

    /// Binds a capability for the plugin described by `ctx`.
    ///
    /// Binding must not start processes or touch the network; capabilities
    /// connect lazily on first use.
    fn bind(&self, ctx: &BindContext<'_>) -> Result<Arc<dyn PluginCapability>, CapabilityError>;
}

/// Binders keyed by protocol name.
#[derive(Default, Clone)]
pub struct BinderSet {
    binders: HashMap<String, Arc<dyn CapabilityBinder>>,
}

impl BinderSet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in `stdio` and `http` binders configured from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::Http`] if the shared HTTP client cannot be
    /// built.
    pub fn builtin(config: &DragnetConfig) -> Result<Self, CapabilityError> {
        let mut set = Self::new();
        set.register(stdio::StdioBinder::new(std::time::Duration::from_secs(
            config.search.default_timeout_secs,
        )));
        set.register(web::WebBinder::new(&config.http)?);
        Ok(set)
    }

    /// Adds or replaces the binder for its protocol.
    pub fn register<B>(&mut self, binder: B)
    where
        B: CapabilityBinder + 'static,
    {
        self.binders
            .insert(binder.protocol().to_owned(), Arc::new(binder));
    }

    /// Binder for `protocol`, if any.
    pub fn get(&self, protocol: &str) -> Option<&Arc<dyn CapabilityBinder>> {
        self.binders.get(protocol)
    }

    /// Registered protocol names, sorted.
    pub fn protocols(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.binders.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for BinderSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinderSet")
            .field("protocols", &self.protocols())
            .finish()
    }
}
