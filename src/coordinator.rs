//! One logical search: fan the keyword out to every running plugin, wait for
//! each under a shared deadline, and merge what came back.
//!
//! # Pipeline
//!
//! 1. Reject an empty keyword.
//! 2. Snapshot the registry, keep `running` plugins, apply the allow-list.
//! 3. Spawn one task per plugin: rate-limit slot, then dispatch, bounded by
//!    the deadline.
//! 4. Feed successful results into a request-scoped [`ResultAggregator`].
//! 5. Join per-plugin failures, in plugin-name order, into the response's
//!    `error` field.
//!
//! Partial failures never fail the search. Only an empty keyword or an
//! unavailable registry does.

use crate::aggregator::ResultAggregator;
use crate::error::{DispatchError, SearchError};
use crate::rate_limiter::RateLimiterManager;
use crate::registry::PluginRegistry;
use crate::types::{RawResult, SearchRequest, SearchResponse};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Aborts the task when dropped, so a cancelled search cancels its plugins.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Runs searches across the registry.
#[derive(Debug, Clone)]
pub struct SearchCoordinator {
    registry: Arc<PluginRegistry>,
    limiter: Arc<RateLimiterManager>,
    default_timeout_secs: u64,
}

impl SearchCoordinator {
    /// Creates a coordinator. `default_timeout_secs` applies when a request
    /// carries no timeout of its own.
    pub fn new(
        registry: Arc<PluginRegistry>,
        limiter: Arc<RateLimiterManager>,
        default_timeout_secs: u64,
    ) -> Self {
        Self {
            registry,
            limiter,
            default_timeout_secs,
        }
    }

    /// Executes `request`.
    ///
    /// # Errors
    ///
    /// - [`SearchError::EmptyKeyword`] for a blank keyword.
    /// - [`SearchError::Registry`] if the registry cannot be listed.
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, SearchError> {
        if request.keyword.trim().is_empty() {
            return Err(SearchError::EmptyKeyword);
        }

        let selected: Vec<_> = self
            .registry
            .get_active()?
            .into_iter()
            .filter(|d| d.status.is_running())
            .filter(|d| {
                request
                    .platforms
                    .as_ref()
                    .is_none_or(|allow| allow.iter().any(|p| *p == d.name))
            })
            .collect();

        let timeout_secs = request.timeout.unwrap_or(self.default_timeout_secs);
        let deadline = Duration::from_secs(timeout_secs);
        tracing::info!(
            keyword = %request.keyword,
            plugins = selected.len(),
            timeout_secs,
            "search started"
        );

        let tasks: Vec<(String, AbortOnDrop<Result<Vec<RawResult>, DispatchError>>)> = selected
            .into_iter()
            .map(|descriptor| {
                let registry = Arc::clone(&self.registry);
                let limiter = Arc::clone(&self.limiter);
                let keyword = request.keyword.clone();
                let name = descriptor.name.clone();
                let handle = tokio::spawn(async move {
                    let work = async {
                        limiter
                            .acquire(&descriptor.name, descriptor.rate_limits.as_ref())
                            .await;
                        registry.dispatch(&descriptor.name, &keyword).await
                    };
                    tokio::time::timeout(deadline, work)
                        .await
                        .unwrap_or_else(|_| {
                            Err(DispatchError::Timeout {
                                plugin: descriptor.name.clone(),
                                timeout_secs,
                            })
                        })
                });
                (name, AbortOnDrop(handle))
            })
            .collect();

        let mut aggregator = ResultAggregator::new();
        let mut failures: Vec<String> = Vec::new();

        for (name, mut task) in tasks {
            match (&mut task.0).await {
                Ok(Ok(raws)) => {
                    tracing::debug!(plugin = %name, count = raws.len(), "plugin returned results");
                    aggregator.add_batch(&raws, &request.keyword);
                }
                Ok(Err(e)) => {
                    tracing::warn!(plugin = %name, error = %e, "plugin search failed");
                    failures.push(format!("{name}: {}", failure_reason(&e)));
                }
                Err(join_err) => {
                    let reason = if join_err.is_panic() {
                        "plugin task panicked"
                    } else {
                        "plugin task was cancelled"
                    };
                    tracing::error!(plugin = %name, "{reason}");
                    failures.push(format!("{name}: {reason}"));
                }
            }
        }

        let results = aggregator.into_aggregated();
        tracing::info!(
            keyword = %request.keyword,
            results = results.len(),
            failures = failures.len(),
            "search complete"
        );

        Ok(SearchResponse {
            keyword: request.keyword.clone(),
            results,
            error: (!failures.is_empty()).then(|| failures.join("; ")),
        })
    }
}

fn failure_reason(err: &DispatchError) -> String {
    match err {
        DispatchError::NotFound { .. } => "not registered".to_owned(),
        DispatchError::Capability { source, .. } => source.to_string(),
        DispatchError::Timeout { timeout_secs, .. } => format!("timed out after {timeout_secs}s"),
    }
}
