//! Shared test support for the stockpulse behavior tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use stockpulse_core::{HttpRequest, HttpResponse, Transport, TransportError};

/// Install a human-readable subscriber so `RUST_LOG=debug cargo test` shows
/// the core's tracing output. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// One scripted transport interaction.
#[derive(Debug, Clone)]
pub enum Step {
    /// Answer with a status and body.
    Respond { status: u16, body: String },
    /// Answer after a delay, so concurrent callers can overlap.
    DelayedRespond {
        delay: Duration,
        status: u16,
        body: String,
    },
    /// Fail at the transport level.
    Fail(TransportError),
    /// Never resolve; only cancellation gets the caller out.
    Hang,
}

impl Step {
    pub fn respond(status: u16, body: impl Into<String>) -> Self {
        Self::Respond {
            status,
            body: body.into(),
        }
    }

    pub fn delayed(delay: Duration, status: u16, body: impl Into<String>) -> Self {
        Self::DelayedRespond {
            delay,
            status,
            body: body.into(),
        }
    }
}

/// Deterministic offline transport that replays a script front to back.
///
/// An exhausted script answers 599 so a test that underestimates its call
/// count fails loudly instead of hanging.
pub struct ScriptedTransport {
    steps: Mutex<VecDeque<Step>>,
    calls: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into_iter().collect()),
            calls: AtomicUsize::new(0),
        })
    }

    /// Number of transport invocations observed so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Transport for ScriptedTransport {
    fn call(&self, _request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, TransportError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self
            .steps
            .lock()
            .expect("script lock is not poisoned")
            .pop_front();

        Box::pin(async move {
            match step {
                Some(Step::Respond { status, body }) => Ok(HttpResponse { status, body }),
                Some(Step::DelayedRespond {
                    delay,
                    status,
                    body,
                }) => {
                    tokio::time::sleep(delay).await;
                    Ok(HttpResponse { status, body })
                }
                Some(Step::Fail(error)) => Err(error),
                Some(Step::Hang) => {
                    std::future::pending::<()>().await;
                    unreachable!("pending future never resolves")
                }
                None => Ok(HttpResponse {
                    status: 599,
                    body: String::from("script exhausted"),
                }),
            }
        })
    }
}
