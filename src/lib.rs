//! Dragnet: a keyword search aggregator over pluggable data sources.
//!
//! Plugins live in subdirectories of a plugin directory, each described by a
//! `plugin.toml`. A discovery pass registers them with the
//! [`PluginRegistry`], binding each one to a [`PluginCapability`] chosen by
//! its declared protocol (`stdio` for JSON-RPC child processes, `http` for
//! scraped web pages). A [`SearchCoordinator`] fans a keyword out to every
//! running plugin under per-plugin rate limits and a shared deadline, and a
//! [`ResultAggregator`] cuts the raw results down to keyword excerpts.
//!
//! [`AdminApi`] bundles these for outer surfaces; the `dragnet-host` binary
//! exposes it over newline-delimited JSON on stdin/stdout.

pub mod admin;
pub mod aggregator;
pub mod capability;
pub mod config;
pub mod coordinator;
pub mod descriptor;
pub mod environment;
pub mod error;
pub mod host;
pub mod rate_limiter;
pub mod registry;
pub mod types;

pub use admin::{AdminApi, AdminOutcome, OutcomeStatus};
pub use aggregator::ResultAggregator;
pub use capability::{BindContext, BinderSet, CapabilityBinder, PluginCapability};
pub use config::DragnetConfig;
pub use coordinator::SearchCoordinator;
pub use descriptor::{PluginDescriptor, PluginStatus};
pub use environment::{EnvironmentHandle, EnvironmentManager, HostEnvironment};
pub use error::{
    BridgeError, CapabilityError, ConfigError, DiscoveryError, DispatchError, EnvironmentError,
    RegistryError, SearchError, ValidationError,
};
pub use rate_limiter::{PluginStats, RateLimitConfig, RateLimiterManager};
pub use registry::{DiscoveryReport, PluginRegistry};
pub use types::{RawResult, SearchRequest, SearchResponse, SearchResult};
