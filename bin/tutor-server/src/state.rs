//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use crate::config::Config;
use crate::limiter::RateLimiter;
use crate::upstream::CompletionBackend;

/// State shared across all HTTP handlers and middleware.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Per-client fixed-window counters; the only shared mutable state.
    pub limiter: Arc<RateLimiter>,
    /// Model backend used by the relay.
    pub backend: Arc<dyn CompletionBackend>,
    /// Rendered system instruction.
    pub system_prompt: Arc<str>,
}

impl AppState {
    pub fn new(config: Config, backend: Arc<dyn CompletionBackend>, system_prompt: String) -> Self {
        let limiter = RateLimiter::new(config.rate_window, config.rate_max_requests);
        Self {
            config: Arc::new(config),
            limiter: Arc::new(limiter),
            backend,
            system_prompt: Arc::from(system_prompt),
        }
    }
}
