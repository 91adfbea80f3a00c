//! Bounded error history with aggregate statistics.
//!
//! Classified failures are recorded in a fixed-capacity ring buffer (oldest
//! evicted first) and logged through `tracing` at a level matching their
//! severity. Cancelled outcomes never reach the reporter.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::{AppError, ErrorKind, Severity};

/// Default ring-buffer capacity.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Aggregate counts over the retained history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ErrorStats {
    pub total: usize,
    pub by_kind: BTreeMap<ErrorKind, usize>,
    pub by_severity: BTreeMap<Severity, usize>,
}

#[derive(Debug)]
struct ReporterInner {
    history: VecDeque<AppError>,
    capacity: usize,
}

/// Sink for classified errors, exposed to observability collaborators.
#[derive(Debug)]
pub struct ErrorReporter {
    inner: Mutex<ReporterInner>,
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(ReporterInner {
                history: VecDeque::with_capacity(capacity),
                capacity: capacity.max(1),
            }),
        }
    }

    /// Record a classified error, evicting the oldest entry once capacity is
    /// exceeded.
    pub fn report(&self, app_error: AppError) {
        match app_error.severity {
            Severity::Critical | Severity::High => error!(
                kind = %app_error.kind,
                status = app_error.status_code,
                message = app_error.message.as_str(),
                "error reported"
            ),
            Severity::Medium => warn!(
                kind = %app_error.kind,
                status = app_error.status_code,
                message = app_error.message.as_str(),
                "error reported"
            ),
            Severity::Low => info!(
                kind = %app_error.kind,
                status = app_error.status_code,
                message = app_error.message.as_str(),
                "error reported"
            ),
        }

        let mut inner = self
            .inner
            .lock()
            .expect("error reporter lock is not poisoned");
        if inner.history.len() == inner.capacity {
            inner.history.pop_front();
        }
        inner.history.push_back(app_error);
    }

    /// Record an error with extra context entries attached first.
    pub fn report_with_context<I, K, V>(&self, app_error: AppError, context: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut annotated = app_error;
        for (key, value) in context {
            annotated = annotated.with_context(key, value);
        }
        self.report(annotated);
    }

    /// Retained errors, oldest first.
    pub fn history(&self) -> Vec<AppError> {
        self.inner
            .lock()
            .expect("error reporter lock is not poisoned")
            .history
            .iter()
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> ErrorStats {
        let inner = self
            .inner
            .lock()
            .expect("error reporter lock is not poisoned");

        let mut stats = ErrorStats {
            total: inner.history.len(),
            ..ErrorStats::default()
        };
        for entry in &inner.history {
            *stats.by_kind.entry(entry.kind).or_insert(0) += 1;
            *stats.by_severity.entry(entry.severity).or_insert(0) += 1;
        }
        stats
    }

    pub fn clear(&self) {
        self.inner
            .lock()
            .expect("error reporter lock is not poisoned")
            .history
            .clear();
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .expect("error reporter lock is not poisoned")
            .history
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
