//! Per-plugin token-bucket rate limiting with minimum request spacing.
//!
//! [`RateLimiterManager`] keeps one bucket per plugin name. A bucket holds up
//! to `burst_size` tokens and refills at `requests_per_minute / 60` tokens per
//! second; every admitted request consumes one token and must also be at least
//! `min_interval` seconds after the previous one.
//!
//! Concurrent callers for the same plugin queue on a fair async mutex, so they
//! are admitted one at a time in arrival order. Different plugins never
//! contend. Time is read from [`tokio::time::Instant`], which lets tests run
//! on paused time.

use crate::descriptor::RateLimitOverrides;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Limits applied to one plugin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Sustained requests per minute.
    pub requests_per_minute: u32,
    /// Bucket capacity.
    pub burst_size: u32,
    /// Minimum seconds between two admitted requests.
    pub min_interval: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 20,
            burst_size: 5,
            min_interval: 3.0,
        }
    }
}

impl RateLimitConfig {
    /// Checks `requests_per_minute > 0`, `burst_size >= 1` and a
    /// `min_interval` that is non-negative and representable as a
    /// [`Duration`].
    pub fn validate(&self) -> Result<(), String> {
        if self.requests_per_minute == 0 {
            return Err("requests_per_minute must be greater than 0".into());
        }
        if self.burst_size == 0 {
            return Err("burst_size must be at least 1".into());
        }
        if Duration::try_from_secs_f64(self.min_interval).is_err() {
            return Err(
                "min_interval must be a non-negative number of seconds within range".into(),
            );
        }
        Ok(())
    }

    /// Computes the limits a plugin actually gets.
    ///
    /// With `conservative` set, a declaration can only tighten `default`:
    /// rate and burst take the minimum, spacing the maximum. Undeclared fields
    /// take the default in both modes. An invalid result falls back to
    /// `default`.
    pub fn effective(
        default: &Self,
        declared: Option<&RateLimitOverrides>,
        conservative: bool,
    ) -> Self {
        let Some(declared) = declared else {
            return *default;
        };
        let candidate = if conservative {
            Self {
                requests_per_minute: declared
                    .requests_per_minute
                    .map_or(default.requests_per_minute, |v| {
                        v.min(default.requests_per_minute)
                    }),
                burst_size: declared
                    .burst_size
                    .map_or(default.burst_size, |v| v.min(default.burst_size)),
                min_interval: declared
                    .min_interval
                    .map_or(default.min_interval, |v| v.max(default.min_interval)),
            }
        } else {
            Self {
                requests_per_minute: declared
                    .requests_per_minute
                    .unwrap_or(default.requests_per_minute),
                burst_size: declared.burst_size.unwrap_or(default.burst_size),
                min_interval: declared.min_interval.unwrap_or(default.min_interval),
            }
        };
        match candidate.validate() {
            Ok(()) => candidate,
            Err(reason) => {
                tracing::warn!(%reason, "invalid rate limit declaration, using default");
                *default
            }
        }
    }

    fn refill_per_sec(&self) -> f64 {
        f64::from(self.requests_per_minute) / 60.0
    }

    fn min_spacing(&self) -> Duration {
        Duration::from_secs_f64(self.min_interval)
    }

    fn empty_bucket_wait(&self) -> Duration {
        Duration::from_secs_f64(60.0 / f64::from(self.requests_per_minute))
    }
}

/// Observable counters for one plugin's limiter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginStats {
    /// Requests admitted since the limiter was created.
    pub total_requests: u64,
    /// Average admitted requests per minute since creation.
    pub current_rate: f64,
    /// Tokens in the bucket right now, refill included.
    pub available_tokens: f64,
    /// Wall-clock time of the last admission.
    pub last_request_time: Option<DateTime<Utc>>,
}

/// Internal mutable state for the token-bucket algorithm.
struct BucketState {
    tokens: f64,
    last_update: Instant,
    last_request: Option<Instant>,
    last_request_time: Option<DateTime<Utc>>,
    total_requests: u64,
    started_at: Instant,
}

impl BucketState {
    fn new(config: &RateLimitConfig, now: Instant) -> Self {
        Self {
            tokens: f64::from(config.burst_size),
            last_update: now,
            last_request: None,
            last_request_time: None,
            total_requests: 0,
            started_at: now,
        }
    }

    fn tokens_at(&self, config: &RateLimitConfig, now: Instant) -> f64 {
        let elapsed = now.duration_since(self.last_update).as_secs_f64();
        (self.tokens + elapsed * config.refill_per_sec()).min(f64::from(config.burst_size))
    }

    fn refill(&mut self, config: &RateLimitConfig, now: Instant) {
        self.tokens = self.tokens_at(config, now);
        self.last_update = now;
    }
}

/// One plugin's limiter.
///
/// `turn` serialises admission decisions (held across waits); `state` is only
/// locked briefly so stats never queue behind a waiting caller.
struct Limiter {
    config: RateLimitConfig,
    turn: tokio::sync::Mutex<()>,
    state: Mutex<BucketState>,
}

impl Limiter {
    fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            turn: tokio::sync::Mutex::new(()),
            state: Mutex::new(BucketState::new(&config, Instant::now())),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, BucketState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn acquire(&self) {
        let _turn = self.turn.lock().await;
        loop {
            let wait = {
                let mut state = self.state();
                let now = Instant::now();
                state.refill(&self.config, now);

                let spacing = self.config.min_spacing();
                match state.last_request.map(|last| now.duration_since(last)) {
                    Some(since) if since < spacing => spacing - since,
                    _ if state.tokens >= 1.0 => {
                        state.tokens -= 1.0;
                        state.last_request = Some(now);
                        state.last_request_time = Some(Utc::now());
                        state.total_requests += 1;
                        return;
                    }
                    _ => self.config.empty_bucket_wait(),
                }
            };
            tokio::time::sleep(wait).await;
        }
    }

    fn stats(&self) -> PluginStats {
        let state = self.state();
        let now = Instant::now();
        let elapsed_minutes = now.duration_since(state.started_at).as_secs_f64() / 60.0;
        let current_rate = if elapsed_minutes > 0.0 {
            state.total_requests as f64 / elapsed_minutes
        } else {
            0.0
        };
        PluginStats {
            total_requests: state.total_requests,
            current_rate,
            available_tokens: state.tokens_at(&self.config, now),
            last_request_time: state.last_request_time,
        }
    }
}

/// Owns one limiter per plugin name.
///
/// Limiters are created lazily on the first [`acquire`](Self::acquire) for a
/// name and live as long as the manager.
pub struct RateLimiterManager {
    default: RateLimitConfig,
    enforce_conservative: bool,
    limiters: Mutex<HashMap<String, Arc<Limiter>>>,
}

impl RateLimiterManager {
    /// Creates a manager. An invalid `default` is replaced by
    /// [`RateLimitConfig::default`].
    pub fn new(default: RateLimitConfig, enforce_conservative: bool) -> Self {
        let default = match default.validate() {
            Ok(()) => default,
            Err(reason) => {
                tracing::warn!(%reason, "invalid default rate limit, using built-in default");
                RateLimitConfig::default()
            }
        };
        Self {
            default,
            enforce_conservative,
            limiters: Mutex::new(HashMap::new()),
        }
    }

    /// Builds a manager from the `[rate_limit]` config section.
    pub fn from_settings(settings: &crate::config::RateLimitSettings) -> Self {
        Self::new(settings.default, settings.enforce_conservative)
    }

    /// The host-wide default limits.
    pub fn default_config(&self) -> &RateLimitConfig {
        &self.default
    }

    /// Limits that `declared` would resolve to under this manager's policy.
    pub fn effective_config(&self, declared: Option<&RateLimitOverrides>) -> RateLimitConfig {
        RateLimitConfig::effective(&self.default, declared, self.enforce_conservative)
    }

    /// Waits until `key` may issue one request, then records it.
    ///
    /// `declared` is only consulted when the limiter for `key` is first
    /// created.
    pub async fn acquire(&self, key: &str, declared: Option<&RateLimitOverrides>) {
        let limiter = self.limiter_for(key, declared);
        limiter.acquire().await;
        tracing::trace!(plugin = %key, "rate limit slot acquired");
    }

    /// Current counters for `key`. A key that never acquired reports a full
    /// bucket and zero requests.
    pub fn stats(&self, key: &str) -> PluginStats {
        let limiter = self
            .limiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned();
        match limiter {
            Some(limiter) => limiter.stats(),
            None => PluginStats {
                total_requests: 0,
                current_rate: 0.0,
                available_tokens: f64::from(self.default.burst_size),
                last_request_time: None,
            },
        }
    }

    fn limiter_for(&self, key: &str, declared: Option<&RateLimitOverrides>) -> Arc<Limiter> {
        let mut limiters = self.limiters.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(limiters.entry(key.to_owned()).or_insert_with(|| {
            let config = self.effective_config(declared);
            tracing::debug!(
                plugin = %key,
                rpm = config.requests_per_minute,
                burst = config.burst_size,
                min_interval = config.min_interval,
                "created rate limiter"
            );
            Arc::new(Limiter::new(config))
        }))
    }
}

impl std::fmt::Debug for RateLimiterManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tracked = self
            .limiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        f.debug_struct("RateLimiterManager")
            .field("default", &self.default)
            .field("enforce_conservative", &self.enforce_conservative)
            .field("tracked", &tracked)
            .finish()
    }
}

impl Default for RateLimiterManager {
    fn default() -> Self {
        Self::new(RateLimitConfig::default(), true)
    }
}
