//! Fetch orchestration: cache fast path, in-flight sharing, retried and
//! cancellable transport calls, reporting, and observable state.
//!
//! [`FetchExecutor`] turns an unreliable, rate-limited remote API into a
//! one-call-per-logical-request abstraction. Collaborators are injected
//! (transport, cache, reporter), never global, so the core is testable in
//! isolation and a cache instance can be shared across executors.

use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::debug;

use crate::cache::{CacheLookup, CacheStats, TtlCache};
use crate::cancel::{CancelCoordinator, CancelToken};
use crate::config::FetchConfig;
use crate::dedup::InFlightRegistry;
use crate::error::{classify_status, classify_transport, AppError, FetchError};
use crate::reporter::ErrorReporter;
use crate::retry::run_with_retry;
use crate::transport::{HttpRequest, Transport};

/// Observable request state for UI layers to poll or subscribe to.
#[derive(Debug, Clone)]
pub struct FetchState<T> {
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<AppError>,
    pub is_from_cache: bool,
    /// Number of retries performed for the current/last sequence.
    pub retry_count: u32,
    pub last_fetch: Option<OffsetDateTime>,
}

impl<T> Default for FetchState<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
            is_from_cache: false,
            retry_count: 0,
            last_fetch: None,
        }
    }
}

/// Resilient fetch entry point for one logical resource family.
pub struct FetchExecutor<T> {
    config: FetchConfig,
    transport: Arc<dyn Transport>,
    cache: TtlCache<T>,
    in_flight: InFlightRegistry<T>,
    cancels: CancelCoordinator,
    reporter: Arc<ErrorReporter>,
    state: watch::Sender<FetchState<T>>,
    current_slot: Mutex<Option<String>>,
}

impl<T> FetchExecutor<T>
where
    T: Clone + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(transport: Arc<dyn Transport>, config: FetchConfig) -> Self {
        Self::with_parts(
            transport,
            config,
            TtlCache::new(),
            Arc::new(ErrorReporter::new()),
        )
    }

    /// Construct with an externally owned cache and reporter, e.g. one cache
    /// shared by the stock-data and social-media executors.
    pub fn with_parts(
        transport: Arc<dyn Transport>,
        config: FetchConfig,
        cache: TtlCache<T>,
        reporter: Arc<ErrorReporter>,
    ) -> Self {
        let (state, _) = watch::channel(FetchState::default());
        Self {
            config,
            transport,
            cache,
            in_flight: InFlightRegistry::new(),
            cancels: CancelCoordinator::new(),
            reporter,
            state,
            current_slot: Mutex::new(None),
        }
    }

    /// Cache key derived from the request when the caller supplies none.
    pub fn fingerprint(request: &HttpRequest) -> String {
        match &request.body {
            Some(body) => format!("{} {}#{}", request.method, request.url, body),
            None => format!("{} {}", request.method, request.url),
        }
    }

    /// Execute a logical request: serve fresh cache, otherwise join or start
    /// the single in-flight attempt sequence for the key.
    pub async fn execute(
        &self,
        request: HttpRequest,
        cache_key: Option<&str>,
    ) -> Result<T, FetchError> {
        let key = cache_key
            .map(str::to_string)
            .unwrap_or_else(|| Self::fingerprint(&request));

        *self
            .current_slot
            .lock()
            .expect("current slot lock is not poisoned") = Some(key.clone());

        if self.config.enable_cache {
            if let CacheLookup::Fresh(value) = self.cache.get(&key).await {
                self.state.send_modify(|s| {
                    s.data = Some(value.clone());
                    s.loading = false;
                    s.error = None;
                    s.is_from_cache = true;
                    s.retry_count = 0;
                    s.last_fetch = Some(OffsetDateTime::now_utc());
                });
                return Ok(value);
            }
        }

        self.state.send_modify(|s| {
            s.loading = true;
            s.error = None;
            s.retry_count = 0;
        });

        let outcome = self.run_sequence(&key, request).await;

        match &outcome {
            Ok(value) => self.state.send_modify(|s| {
                s.data = Some(value.clone());
                s.loading = false;
                s.error = None;
                s.is_from_cache = false;
                s.last_fetch = Some(OffsetDateTime::now_utc());
            }),
            // Cancellation is silent: no error surfaces, prior data stands.
            Err(FetchError::Cancelled) => self.state.send_modify(|s| {
                s.loading = false;
            }),
            Err(FetchError::Failed(app_error)) => {
                let app_error = app_error.clone();
                self.state.send_modify(|s| {
                    s.loading = false;
                    s.error = Some(app_error);
                });
            }
        }

        outcome
    }

    /// Like [`execute`](Self::execute), but invalidates the cache entry first
    /// so a network attempt is forced even when a fresh entry existed.
    pub async fn refresh(
        &self,
        request: HttpRequest,
        cache_key: Option<&str>,
    ) -> Result<T, FetchError> {
        let key = cache_key
            .map(str::to_string)
            .unwrap_or_else(|| Self::fingerprint(&request));
        self.cache.invalidate(&key).await;
        self.execute(request, Some(&key)).await
    }

    /// Cancel the current slot's token. Any pending transport call or retry
    /// sleep under that token observes this promptly.
    pub fn cancel(&self) {
        let slot = self
            .current_slot
            .lock()
            .expect("current slot lock is not poisoned")
            .clone();
        if let Some(slot) = slot {
            debug!(slot = slot.as_str(), "cancelling current request");
            self.cancels.cancel(&slot);
        }
    }

    /// Cancel everything and restore the observable state to initial. The
    /// cache (possibly shared process-wide) is left untouched.
    pub fn reset(&self) {
        self.cancels.cancel_all();
        *self
            .current_slot
            .lock()
            .expect("current slot lock is not poisoned") = None;
        self.state.send_replace(FetchState::default());
    }

    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    pub fn reporter(&self) -> Arc<ErrorReporter> {
        Arc::clone(&self.reporter)
    }

    /// Snapshot of the observable state.
    pub fn state(&self) -> FetchState<T> {
        self.state.borrow().clone()
    }

    /// Subscription for UI layers; yields on every state change.
    pub fn subscribe(&self) -> watch::Receiver<FetchState<T>> {
        self.state.subscribe()
    }

    async fn run_sequence(&self, key: &str, request: HttpRequest) -> Result<T, FetchError> {
        let transport = Arc::clone(&self.transport);
        let cache = self.cache.clone();
        let reporter = Arc::clone(&self.reporter);
        let config = self.config.clone();
        let retry = self.config.retry_config();
        let cancels = self.cancels.clone();
        let state = self.state.clone();
        let slot = key.to_string();
        let url = request.url.clone();

        self.in_flight
            .join(key, move || {
                // Only the sequence creator supersedes the slot token. A
                // caller that joins an existing sequence shares the creator's
                // token; issuing here would cancel the very request it joins.
                let token = cancels.issue(&slot);
                async move {
                    let result = run_with_retry(
                        &retry,
                        &token,
                        |_| attempt_fetch::<T>(Arc::clone(&transport), request.clone(), token.clone()),
                        |attempt, _| {
                            state.send_modify(|s| s.retry_count = attempt);
                        },
                    )
                    .await;

                    match result {
                        Ok(value) => {
                            // A token cancelled mid-flight must not let the
                            // late result reach the cache or any caller.
                            if token.is_cancelled() {
                                return Err(FetchError::Cancelled);
                            }
                            if config.enable_cache {
                                cache.insert(slot, value.clone(), config.cache_ttl).await;
                            }
                            Ok(value)
                        }
                        Err(FetchError::Cancelled) => Err(FetchError::Cancelled),
                        Err(FetchError::Failed(app_error)) => {
                            let app_error = app_error
                                .with_context("cache_key", slot)
                                .with_context("url", url);
                            if config.enable_error_reporting {
                                reporter.report(app_error.clone());
                            }
                            Err(FetchError::Failed(app_error))
                        }
                    }
                }
            })
            .await
    }
}

/// One transport attempt: race the call against the token, check the status,
/// decode the body.
async fn attempt_fetch<T>(
    transport: Arc<dyn Transport>,
    request: HttpRequest,
    token: CancelToken,
) -> Result<T, FetchError>
where
    T: DeserializeOwned,
{
    let call = transport.call(request);
    let response = tokio::select! {
        _ = token.cancelled() => return Err(FetchError::Cancelled),
        result = call => result.map_err(|e| classify_transport(&e))?,
    };

    if !response.is_success() {
        return Err(FetchError::Failed(classify_status(
            response.status,
            format!("upstream returned {}: {}", response.status, body_snippet(&response.body)),
        )));
    }

    serde_json::from_str(&response.body).map_err(|e| {
        FetchError::Failed(AppError::validation(format!("response decode failed: {e}")))
    })
}

fn body_snippet(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() <= MAX {
        return body.to_string();
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
