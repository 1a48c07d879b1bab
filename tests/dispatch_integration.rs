//! End-to-end dispatch tests against a mock HTTP server, exercising the
//! full path from `Dispatcher::send` through the OpenAI adapter's wire
//! format and back — the spec §8 "happy path, OpenAI" scenario, plus the
//! retry-then-succeed and vendor-not-found scenarios that need a real
//! adapter (rather than the dispatcher's own in-module fakes) to be
//! meaningful.

use llm_dispatcher::config::{BackoffStrategy, Config, ConfigBuilder, RetryPolicy};
use llm_dispatcher::error::DispatchError;
use llm_dispatcher::providers::OpenAiAdapter;
use llm_dispatcher::types::{Message, Mode, Request, VendorConfig};
use llm_dispatcher::Dispatcher;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request as WireRequest, Respond, ResponseTemplate};

fn openai_success_body() -> serde_json::Value {
    serde_json::json!({
        "model": "gpt-3.5-turbo",
        "choices": [{"message": {"content": "hi"}, "finish_reason": "stop"}],
        "usage": {"prompt_tokens": 3, "completion_tokens": 1, "total_tokens": 4},
    })
}

#[tokio::test]
async fn happy_path_openai_matches_spec_scenario_one() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_success_body()))
        .mount(&server)
        .await;

    let adapter = OpenAiAdapter::new(VendorConfig::new("sk-test").with_base_url(server.uri())).unwrap();
    let dispatcher = Dispatcher::new(Config::default());
    dispatcher.register_vendor(Arc::new(adapter)).unwrap();

    let request = Request::new("gpt-3.5-turbo", vec![Message::user("hello")]);
    let response = dispatcher.send(request, &CancellationToken::new()).await.unwrap();

    assert_eq!(response.content, "hi");
    assert_eq!(response.vendor, "openai");
    // total_tokens=4, openai realized rate=0.03/1K -> 4/1000*0.03 = 0.00012 (spec §8 scenario 1).
    assert!((response.estimated_cost - 0.00012).abs() < 1e-9);
}

#[tokio::test]
async fn mode_auto_selects_model_and_fills_defaults() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_success_body()))
        .mount(&server)
        .await;

    let adapter = OpenAiAdapter::new(VendorConfig::new("sk-test").with_base_url(server.uri())).unwrap();
    let dispatcher = Dispatcher::new(ConfigBuilder::new().mode(Mode::Fast).build());
    dispatcher.register_vendor(Arc::new(adapter)).unwrap();

    // No model, no mode on the request itself — Config.mode supplies "fast".
    let request = Request::new("", vec![Message::user("hi")]);
    let response = dispatcher.send(request, &CancellationToken::new()).await.unwrap();
    assert_eq!(response.vendor, "openai");
}

#[tokio::test]
async fn http_error_surfaces_as_dispatch_error_with_vendor_name() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&server)
        .await;

    let adapter = OpenAiAdapter::new(VendorConfig::new("sk-test").with_base_url(server.uri())).unwrap();
    let dispatcher = Dispatcher::new(Config::default());
    dispatcher.register_vendor(Arc::new(adapter)).unwrap();

    let request = Request::new("gpt-3.5-turbo", vec![Message::user("hi")]);
    let err = dispatcher.send(request, &CancellationToken::new()).await.unwrap_err();
    let message = err.to_string();
    assert!(message.contains("openai"));
}

/// A responder that fails the first `fail_times` calls with a 500, then
/// succeeds. HTTP errors aren't in the retry engine's default-retryable set,
/// so this drives the engine through a custom policy that names the exact
/// rendered error string a 500 produces.
struct FlakyThenOk {
    calls: Arc<AtomicU32>,
    fail_times: u32,
}

impl Respond for FlakyThenOk {
    fn respond(&self, _: &WireRequest) -> ResponseTemplate {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.fail_times {
            ResponseTemplate::new(500).set_body_string("boom")
        } else {
            ResponseTemplate::new(200).set_body_json(openai_success_body())
        }
    }
}

#[tokio::test]
async fn retry_policy_recovers_after_configured_retryable_error() {
    let server = MockServer::start().await;
    let calls = Arc::new(AtomicU32::new(0));
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(FlakyThenOk { calls: calls.clone(), fail_times: 1 })
        .mount(&server)
        .await;

    let adapter = OpenAiAdapter::new(VendorConfig::new("sk-test").with_base_url(server.uri())).unwrap();
    // The adapter's 500 failure renders as `AdapterError::Http{status: 500, ..}`,
    // whose Display is "vendor returned HTTP 500: boom" — name that exact
    // string as a custom retryable error (spec §4.3: retryable_errors is a
    // set of exact-match strings layered on top of the engine's defaults).
    let policy = RetryPolicy::new(2, BackoffStrategy::Fixed)
        .with_retryable_error("vendor returned HTTP 500: boom");
    let config = ConfigBuilder::new().retry_policy(policy).build();

    let dispatcher = Dispatcher::new(config);
    dispatcher.register_vendor(Arc::new(adapter)).unwrap();

    let request = Request::new("gpt-3.5-turbo", vec![Message::user("hi")]);
    let response = dispatcher.send(request, &CancellationToken::new()).await.unwrap();
    assert_eq!(response.content, "hi");
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let stats = dispatcher.stats();
    assert_eq!(stats.successful_requests, 1);
    assert_eq!(stats.failed_requests, 0);
}

#[tokio::test]
async fn send_to_vendor_unknown_name_is_vendor_not_found() {
    let adapter = OpenAiAdapter::new(VendorConfig::new("sk-test")).unwrap();
    let dispatcher = Dispatcher::new(Config::default());
    dispatcher.register_vendor(Arc::new(adapter)).unwrap();

    let request = Request::new("gpt-3.5-turbo", vec![Message::user("hi")]);
    let err = dispatcher
        .send_to_vendor("not-registered", request, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::VendorNotFound(name) if name == "not-registered"));
}
