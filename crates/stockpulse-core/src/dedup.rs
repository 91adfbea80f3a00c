//! Request deduplication: at most one live attempt sequence per key.
//!
//! The first caller for a key starts the real attempt sequence; concurrent
//! callers join it and receive the same eventual outcome with no additional
//! network traffic. The sequence is driven by a spawned task so it runs to
//! completion, and its registry slot is removed, even if every caller is
//! dropped mid-flight. A leaked slot would permanently block the key.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tracing::debug;

use crate::error::{AppError, FetchError};

type Outcome<T> = Result<T, FetchError>;

/// Registry of in-flight attempt sequences keyed by request fingerprint.
///
/// Cloning shares the underlying slot table.
pub struct InFlightRegistry<T> {
    slots: Arc<Mutex<HashMap<String, broadcast::Sender<Outcome<T>>>>>,
}

impl<T> Clone for InFlightRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            slots: Arc::clone(&self.slots),
        }
    }
}

impl<T> Default for InFlightRegistry<T>
where
    T: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> InFlightRegistry<T>
where
    T: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Join the in-flight sequence for `key`, creating it with `factory` if
    /// none exists. `factory` is invoked at most once per slot lifetime.
    pub async fn join<F, Fut>(&self, key: &str, factory: F) -> Outcome<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Outcome<T>> + Send + 'static,
    {
        let mut rx = {
            let mut slots = self
                .slots
                .lock()
                .expect("in-flight registry lock is not poisoned");

            if let Some(tx) = slots.get(key) {
                debug!(key, "joining in-flight request");
                tx.subscribe()
            } else {
                let (tx, rx) = broadcast::channel(1);
                slots.insert(key.to_string(), tx.clone());

                let sequence = factory();
                let registry = self.clone();
                let slot_key = key.to_string();
                tokio::spawn(async move {
                    let outcome = sequence.await;
                    // Free the slot before publishing so a follow-up request
                    // for the key can start immediately.
                    registry.remove(&slot_key);
                    let _ = tx.send(outcome);
                });
                rx
            }
        };

        match rx.recv().await {
            Ok(outcome) => outcome,
            Err(_) => Err(FetchError::Failed(AppError::unknown(
                "in-flight request was dropped before completing",
            ))),
        }
    }

    fn remove(&self, key: &str) {
        let mut slots = self
            .slots
            .lock()
            .expect("in-flight registry lock is not poisoned");
        slots.remove(key);
    }

    /// Whether a sequence is currently in flight for `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.slots
            .lock()
            .expect("in-flight registry lock is not poisoned")
            .contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .expect("in-flight registry lock is not poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
