//! Configuration surface for the fetch executor.

use std::time::Duration;

use crate::retry::{Backoff, RetryConfig};

/// Recognized options, with the defaults the dashboard ships with.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchConfig {
    /// Serve fresh cache entries without network access.
    pub enable_cache: bool,
    /// TTL applied to successful fetches written to the cache.
    pub cache_ttl: Duration,
    pub enable_retry: bool,
    /// Retries after the first attempt; total attempts = `max_retries + 1`.
    pub max_retries: u32,
    /// Base delay before the first retry.
    pub retry_delay: Duration,
    pub backoff_factor: f64,
    /// Cap on any single backoff delay.
    pub max_retry_delay: Duration,
    pub enable_error_reporting: bool,
    /// Expose raw technical error detail instead of user wording.
    pub debug: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            enable_cache: true,
            cache_ttl: Duration::from_secs(300),
            enable_retry: true,
            max_retries: 3,
            retry_delay: Duration::from_millis(1_000),
            backoff_factor: 2.0,
            max_retry_delay: Duration::from_secs(10),
            enable_error_reporting: true,
            debug: false,
        }
    }
}

impl FetchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.enable_cache = false;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn without_retry(mut self) -> Self {
        self.enable_retry = false;
        self
    }

    pub fn without_error_reporting(mut self) -> Self {
        self.enable_error_reporting = false;
        self
    }

    pub fn with_debug(mut self) -> Self {
        self.debug = true;
        self
    }

    /// Derive the retry policy the orchestrator runs with.
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            enabled: self.enable_retry,
            max_retries: if self.enable_retry { self.max_retries } else { 0 },
            backoff: Backoff::Exponential {
                base: self.retry_delay,
                factor: self.backoff_factor,
                max: self.max_retry_delay,
                jitter: false,
            },
            ..RetryConfig::default()
        }
    }
}
