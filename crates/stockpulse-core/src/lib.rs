//! # Stockpulse Core
//!
//! Resilient data-fetching core for the stockpulse dashboard.
//!
//! ## Overview
//!
//! This crate turns an unreliable, rate-limited remote API into a
//! predictable one-call-per-logical-request abstraction:
//!
//! - **TTL caching** with per-entry freshness windows
//! - **Request deduplication** so concurrent callers share one network call
//! - **Retry with exponential backoff**, driven by a closed error taxonomy
//! - **Cooperative cancellation** with per-slot superseding tokens
//! - **Bounded error reporting** with aggregate statistics
//! - **Observable request state** for UI layers to subscribe to
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cache`] | TTL cache store with per-entry expiry |
//! | [`cancel`] | Cancellation coordinator and tokens |
//! | [`config`] | Fetch configuration surface |
//! | [`dedup`] | In-flight request deduplication registry |
//! | [`error`] | Error taxonomy and classification |
//! | [`executor`] | Fetch orchestration layer |
//! | [`reporter`] | Bounded error history and stats |
//! | [`retry`] | Backoff policies and the retry loop |
//! | [`transport`] | HTTP transport seam (reqwest + test impls) |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use stockpulse_core::{FetchConfig, FetchExecutor, HttpRequest, ReqwestTransport, Transport};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::new());
//!     let executor: FetchExecutor<serde_json::Value> =
//!         FetchExecutor::new(transport, FetchConfig::default());
//!
//!     let quote = executor
//!         .execute(HttpRequest::get("https://api.example/stock/AAPL"), Some("stock_AAPL"))
//!         .await?;
//!     println!("AAPL: {quote}");
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  UI / Caller    │
//! └────────┬────────┘
//!          │ execute / refresh / cancel / reset
//!          ▼
//! ┌─────────────────┐   fresh?   ┌──────────────────┐
//! │ Fetch Executor  │───────────▶│  TTL Cache Store │
//! └────────┬────────┘            └──────────────────┘
//!          │ miss / expired
//!          ▼
//! ┌─────────────────┐  join/create  ┌──────────────────┐
//! │ Dedup Registry  │──────────────▶│ Retry + Backoff  │
//! └─────────────────┘               └────────┬─────────┘
//!                                            │ per attempt, racing the token
//!                                            ▼
//! ┌─────────────────┐               ┌──────────────────┐
//! │ Error Reporter  │◀── classify ──│    Transport     │
//! └─────────────────┘               └──────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Failures are classified into a closed taxonomy and carry fixed user-facing
//! wording; cancellation is a silent third outcome:
//!
//! ```rust
//! use stockpulse_core::{classify_status, ErrorKind, FetchError};
//!
//! fn handle(outcome: FetchError) {
//!     match outcome {
//!         FetchError::Cancelled => {
//!             // Superseded by a newer request; show nothing.
//!         }
//!         FetchError::Failed(error) => {
//!             eprintln!("{}", error.user_message);
//!         }
//!     }
//! }
//!
//! assert_eq!(classify_status(503, "unavailable").kind, ErrorKind::Server);
//! ```

pub mod cache;
pub mod cancel;
pub mod config;
pub mod dedup;
pub mod error;
pub mod executor;
pub mod reporter;
pub mod retry;
pub mod transport;

// Re-export commonly used types at crate root for convenience

pub use cache::{CacheLookup, CacheStats, TtlCache};
pub use cancel::{CancelCoordinator, CancelToken};
pub use config::FetchConfig;
pub use dedup::InFlightRegistry;
pub use error::{
    classify_status, classify_transport, validate_symbol, AppError, ErrorKind, FetchError,
    Severity,
};
pub use executor::{FetchExecutor, FetchState};
pub use reporter::{ErrorReporter, ErrorStats, DEFAULT_HISTORY_CAPACITY};
pub use retry::{run_with_retry, Backoff, RetryConfig};
pub use transport::{
    HttpMethod, HttpRequest, HttpResponse, ReqwestTransport, StaticTransport, Transport,
    TransportError, TransportErrorKind,
};
