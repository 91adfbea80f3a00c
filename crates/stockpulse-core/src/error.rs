//! Error taxonomy and classification.
//!
//! Every failure observed by the fetch core is folded into a closed taxonomy
//! ([`ErrorKind`] plus [`Severity`]) by the pure classification functions in
//! this module. Cancellation is deliberately *not* part of the taxonomy: it is
//! a third terminal outcome next to success and failure, carried by
//! [`FetchError::Cancelled`], never retried and never reported.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;

use crate::transport::{TransportError, TransportErrorKind};

/// Closed set of failure categories surfaced by the fetch core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    Timeout,
    Client,
    Server,
    Authentication,
    Permission,
    RateLimit,
    Validation,
    Unknown,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::Client => "client",
            Self::Server => "server",
            Self::Authentication => "authentication",
            Self::Permission => "permission",
            Self::RateLimit => "rate_limit",
            Self::Validation => "validation",
            Self::Unknown => "unknown",
        }
    }

    /// Fixed user-facing wording per kind, so the presentation layer never
    /// has to derive its own.
    pub const fn user_message(self) -> &'static str {
        match self {
            Self::Network => {
                "Unable to reach the data service. Check your connection and try again."
            }
            Self::Timeout => "The request took too long to complete. Please try again.",
            Self::Client => "The request could not be completed.",
            Self::Server => {
                "The data service is having trouble right now. Please try again shortly."
            }
            Self::Authentication => "Your session has expired. Please sign in again.",
            Self::Permission => "You do not have permission to access this data.",
            Self::RateLimit => "Too many requests. Please wait a moment before trying again.",
            Self::Validation => "The request was invalid. Please adjust it and try again.",
            Self::Unknown => "Something went wrong. Please try again.",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How loudly a failure should be surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified application error. Built only by the classification
/// constructors below; immutable apart from [`AppError::with_context`]
/// annotations added before reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    pub kind: ErrorKind,
    pub severity: Severity,
    pub message: String,
    pub user_message: &'static str,
    pub retryable: bool,
    pub status_code: Option<u16>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub context: BTreeMap<String, String>,
}

impl AppError {
    fn new(
        kind: ErrorKind,
        severity: Severity,
        message: impl Into<String>,
        retryable: bool,
        status_code: Option<u16>,
    ) -> Self {
        Self {
            kind,
            severity,
            message: message.into(),
            user_message: kind.user_message(),
            retryable,
            status_code,
            timestamp: OffsetDateTime::now_utc(),
            context: BTreeMap::new(),
        }
    }

    /// Transport-level connectivity failure (unreachable host, DNS,
    /// connection reset).
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, Severity::Medium, message, true, None)
    }

    /// Request deadline elapsed before a response arrived.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, Severity::Low, message, true, None)
    }

    /// Request rejected before it could be sent, or a response body that does
    /// not match the expected shape.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, Severity::Medium, message, false, None)
    }

    /// Catch-all for failures the taxonomy cannot place.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, Severity::Medium, message, false, None)
    }

    /// Attach a caller-supplied context entry. Later annotations win on
    /// duplicate keys.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Message suitable for display. Raw technical detail is only exposed
    /// when the debug flag is set; otherwise the fixed user wording is used.
    pub fn display_message(&self, debug: bool) -> &str {
        if debug {
            &self.message
        } else {
            self.user_message
        }
    }
}

/// Terminal outcome of a fetch sequence that did not succeed.
///
/// `Cancelled` is silent: it must never reach the error reporter and must
/// never mutate the cache.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    #[error("request was cancelled")]
    Cancelled,
    #[error(transparent)]
    Failed(#[from] AppError),
}

impl FetchError {
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub const fn as_app_error(&self) -> Option<&AppError> {
        match self {
            Self::Cancelled => None,
            Self::Failed(error) => Some(error),
        }
    }
}

/// Classify a transport failure. Cancellation maps to the silent outcome,
/// everything else to the taxonomy. Total: never panics.
pub fn classify_transport(error: &TransportError) -> FetchError {
    match error.kind() {
        TransportErrorKind::Cancelled => FetchError::Cancelled,
        TransportErrorKind::Connect => FetchError::Failed(AppError::network(error.message())),
        TransportErrorKind::Timeout => FetchError::Failed(AppError::timeout(error.message())),
        TransportErrorKind::Other => FetchError::Failed(AppError::unknown(error.message())),
    }
}

/// Classify a non-success HTTP status. Refines the 4xx range with the finer
/// taxonomy kinds; only 429 is retryable below 500. Total: never panics.
pub fn classify_status(status: u16, message: impl Into<String>) -> AppError {
    let message = message.into();
    match status {
        401 => AppError::new(
            ErrorKind::Authentication,
            Severity::High,
            message,
            false,
            Some(status),
        ),
        403 => AppError::new(
            ErrorKind::Permission,
            Severity::Medium,
            message,
            false,
            Some(status),
        ),
        429 => AppError::new(
            ErrorKind::RateLimit,
            Severity::Medium,
            message,
            true,
            Some(status),
        ),
        400 | 422 => AppError::new(
            ErrorKind::Validation,
            Severity::Medium,
            message,
            false,
            Some(status),
        ),
        s if (400..500).contains(&s) => AppError::new(
            ErrorKind::Client,
            Severity::Medium,
            message,
            false,
            Some(status),
        ),
        s if s >= 500 => AppError::new(
            ErrorKind::Server,
            Severity::High,
            message,
            true,
            Some(status),
        ),
        _ => AppError::new(
            ErrorKind::Unknown,
            Severity::Medium,
            message,
            false,
            Some(status),
        ),
    }
}

/// Validate and normalize a stock symbol: trimmed, uppercased, 1-10
/// alphanumeric characters.
pub fn validate_symbol(symbol: &str) -> Result<String, AppError> {
    let normalized = symbol.trim().to_ascii_uppercase();

    if normalized.is_empty() {
        return Err(AppError::validation("stock symbol is required").with_context("field", "symbol"));
    }
    if normalized.len() > 10 {
        return Err(AppError::validation("stock symbol must be 1-10 characters")
            .with_context("field", "symbol"));
    }
    if !normalized.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(
            AppError::validation("stock symbol must contain only letters and numbers")
                .with_context("field", "symbol"),
        );
    }

    Ok(normalized)
}
