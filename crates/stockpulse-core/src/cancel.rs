//! Cooperative cancellation per logical request slot.
//!
//! A slot is the logical identity of a request ("the current analysis for
//! symbol AAPL"), distinct from individual network attempts. Each slot owns
//! one active token; issuing a new token supersedes the previous one by
//! cancelling it synchronously, so at most one attempt sequence per slot is
//! ever treated as authoritative. Cancellation is cooperative: it does not
//! preempt an in-flight call, but downstream code must discard the call's
//! result once its token is cancelled.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

/// Cancellation handle for one attempt sequence.
#[derive(Debug, Clone)]
pub struct CancelToken {
    generation: u64,
    inner: CancellationToken,
}

impl CancelToken {
    fn new(generation: u64) -> Self {
        Self {
            generation,
            inner: CancellationToken::new(),
        }
    }

    /// Standalone token not managed by any coordinator, for driving
    /// [`crate::retry::run_with_retry`] directly.
    pub fn detached() -> Self {
        Self::new(0)
    }

    pub const fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// Resolves once the token is cancelled.
    pub async fn cancelled(&self) {
        self.inner.cancelled().await;
    }

    pub fn cancel(&self) {
        self.inner.cancel();
    }
}

/// Issues and tracks the active token per slot.
#[derive(Debug, Clone, Default)]
pub struct CancelCoordinator {
    slots: Arc<Mutex<HashMap<String, CancelToken>>>,
}

impl CancelCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh token for `slot`, cancelling the one it supersedes
    /// before returning.
    pub fn issue(&self, slot: &str) -> CancelToken {
        let mut slots = self
            .slots
            .lock()
            .expect("cancellation coordinator lock is not poisoned");

        let generation = match slots.get(slot) {
            Some(previous) => {
                previous.cancel();
                previous.generation + 1
            }
            None => 1,
        };

        let token = CancelToken::new(generation);
        slots.insert(slot.to_string(), token.clone());
        token
    }

    /// The currently active token for `slot`, if any.
    pub fn current(&self, slot: &str) -> Option<CancelToken> {
        self.slots
            .lock()
            .expect("cancellation coordinator lock is not poisoned")
            .get(slot)
            .cloned()
    }

    /// Cancel the active token for `slot`. Returns whether one existed.
    pub fn cancel(&self, slot: &str) -> bool {
        let slots = self
            .slots
            .lock()
            .expect("cancellation coordinator lock is not poisoned");
        match slots.get(slot) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every active token.
    pub fn cancel_all(&self) {
        let slots = self
            .slots
            .lock()
            .expect("cancellation coordinator lock is not poisoned");
        for token in slots.values() {
            token.cancel();
        }
    }

    pub fn generation(&self, slot: &str) -> Option<u64> {
        self.slots
            .lock()
            .expect("cancellation coordinator lock is not poisoned")
            .get(slot)
            .map(CancelToken::generation)
    }
}
