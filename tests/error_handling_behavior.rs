//! Behavior-driven tests for error classification, retry policy, and
//! reporting as observed through the fetch executor.

use std::sync::Arc;
use std::time::Duration;

use stockpulse_core::{
    ErrorKind, FetchConfig, FetchExecutor, HttpRequest, Severity, Transport, TransportError,
};
use stockpulse_tests::{init_tracing, ScriptedTransport, Step};

fn executor_for(
    transport: &Arc<ScriptedTransport>,
    config: FetchConfig,
) -> FetchExecutor<serde_json::Value> {
    init_tracing();
    let transport: Arc<dyn Transport> = transport.clone();
    FetchExecutor::new(transport, config)
}

fn quick_config() -> FetchConfig {
    FetchConfig::default().with_retry_delay(Duration::from_millis(1))
}

#[tokio::test]
async fn when_the_server_keeps_failing_retries_stop_at_the_budget() {
    // Given: an endpoint that 503s forever and a budget of 2 retries
    let transport = ScriptedTransport::new([
        Step::respond(503, "unavailable"),
        Step::respond(503, "unavailable"),
        Step::respond(503, "unavailable"),
    ]);
    let executor = executor_for(&transport, quick_config().with_max_retries(2));

    // When: the request is executed
    let error = executor
        .execute(HttpRequest::get("/api/stock/AAPL"), Some("stock_AAPL"))
        .await
        .expect_err("budget exhausted");

    // Then: three attempts ran and exactly one classified error was reported
    assert_eq!(transport.calls(), 3);
    let app = error.as_app_error().expect("not a cancellation");
    assert_eq!(app.kind, ErrorKind::Server);
    assert!(!app.user_message.is_empty());

    let reporter = executor.reporter();
    assert_eq!(reporter.len(), 1);
    let stats = reporter.stats();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.by_kind.get(&ErrorKind::Server), Some(&1));
    assert_eq!(stats.by_severity.get(&Severity::High), Some(&1));
}

#[tokio::test]
async fn uncommon_5xx_statuses_are_retried_like_any_server_failure() {
    // 501 sits outside the usual 502/503/504 set but is still a server fault.
    let transport = ScriptedTransport::new([
        Step::respond(501, "not implemented"),
        Step::respond(200, "{\"ok\":true}"),
    ]);
    let executor = executor_for(&transport, quick_config());

    executor
        .execute(HttpRequest::get("/api/stock/AAPL"), Some("stock_AAPL"))
        .await
        .expect("second attempt succeeds");

    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn client_errors_other_than_429_are_never_retried() {
    let transport = ScriptedTransport::new([Step::respond(404, "not found")]);
    let executor = executor_for(&transport, quick_config().with_max_retries(5));

    let error = executor
        .execute(HttpRequest::get("/api/stock/NOPE"), Some("stock_NOPE"))
        .await
        .expect_err("client error surfaces immediately");

    assert_eq!(transport.calls(), 1);
    let app = error.as_app_error().expect("not a cancellation");
    assert_eq!(app.kind, ErrorKind::Client);
    assert_eq!(app.status_code, Some(404));
    assert!(!app.retryable);
}

#[tokio::test]
async fn rate_limit_responses_are_retried_until_the_limiter_relents() {
    let transport = ScriptedTransport::new([
        Step::respond(429, "slow down"),
        Step::respond(429, "slow down"),
        Step::respond(200, "{\"ok\":true}"),
    ]);
    let executor = executor_for(&transport, quick_config());

    let value = executor
        .execute(HttpRequest::get("/api/stock/AAPL"), Some("stock_AAPL"))
        .await
        .expect("succeeds after backoff");

    assert_eq!(transport.calls(), 3);
    assert_eq!(value["ok"], serde_json::json!(true));
    assert!(executor.state().error.is_none());
}

#[tokio::test]
async fn auth_failures_surface_with_high_severity_and_fixed_wording() {
    let transport = ScriptedTransport::new([Step::respond(401, "token expired")]);
    let executor = executor_for(&transport, quick_config());

    let error = executor
        .execute(HttpRequest::get("/api/portfolio"), Some("portfolio"))
        .await
        .expect_err("auth failure surfaces");

    let app = error.as_app_error().expect("not a cancellation");
    assert_eq!(app.kind, ErrorKind::Authentication);
    assert_eq!(app.severity, Severity::High);
    assert_eq!(app.user_message, ErrorKind::Authentication.user_message());
    // Raw detail stays behind the debug flag.
    assert_eq!(app.display_message(false), ErrorKind::Authentication.user_message());
    assert!(app.display_message(true).contains("401"));
}

#[tokio::test]
async fn transport_connect_failures_classify_as_network_and_are_retried() {
    let transport = ScriptedTransport::new([
        Step::Fail(TransportError::connect("connection refused")),
        Step::respond(200, "{\"ok\":true}"),
    ]);
    let executor = executor_for(&transport, quick_config());

    executor
        .execute(HttpRequest::get("/api/stock/AAPL"), Some("stock_AAPL"))
        .await
        .expect("second attempt succeeds");

    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn transport_timeouts_classify_as_timeout_and_are_retried() {
    let transport = ScriptedTransport::new([
        Step::Fail(TransportError::timeout("deadline elapsed")),
        Step::respond(200, "{\"ok\":true}"),
    ]);
    let executor = executor_for(&transport, quick_config());

    executor
        .execute(HttpRequest::get("/api/stock/AAPL"), Some("stock_AAPL"))
        .await
        .expect("second attempt succeeds");

    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn disabling_retry_makes_every_failure_terminal() {
    let transport = ScriptedTransport::new([
        Step::respond(503, "unavailable"),
        Step::respond(200, "{\"ok\":true}"),
    ]);
    let executor = executor_for(&transport, quick_config().without_retry());

    let error = executor
        .execute(HttpRequest::get("/api/stock/AAPL"), Some("stock_AAPL"))
        .await
        .expect_err("single attempt fails");

    assert_eq!(transport.calls(), 1);
    assert_eq!(
        error.as_app_error().expect("not a cancellation").kind,
        ErrorKind::Server
    );
}

#[tokio::test]
async fn error_reporting_can_be_switched_off() {
    let transport = ScriptedTransport::new([Step::respond(404, "not found")]);
    let executor = executor_for(&transport, quick_config().without_error_reporting());

    let _ = executor
        .execute(HttpRequest::get("/api/stock/NOPE"), Some("stock_NOPE"))
        .await;

    assert!(executor.reporter().is_empty());
}

#[tokio::test]
async fn reported_errors_carry_request_context() {
    let transport = ScriptedTransport::new([Step::respond(500, "boom")]);
    let executor = executor_for(&transport, quick_config().with_max_retries(0));

    let _ = executor
        .execute(HttpRequest::get("/api/stock/AAPL"), Some("stock_AAPL"))
        .await;

    let history = executor.reporter().history();
    assert_eq!(history.len(), 1);
    assert_eq!(
        history[0].context.get("cache_key").map(String::as_str),
        Some("stock_AAPL")
    );
    assert_eq!(
        history[0].context.get("url").map(String::as_str),
        Some("/api/stock/AAPL")
    );
}

#[tokio::test]
async fn clearing_the_reporter_resets_history_and_stats() {
    let transport = ScriptedTransport::new([Step::respond(500, "boom")]);
    let executor = executor_for(&transport, quick_config().with_max_retries(0));

    let _ = executor
        .execute(HttpRequest::get("/api/stock/AAPL"), Some("stock_AAPL"))
        .await;
    let reporter = executor.reporter();
    assert_eq!(reporter.len(), 1);

    reporter.clear();
    assert!(reporter.is_empty());
    assert_eq!(reporter.stats().total, 0);
}
