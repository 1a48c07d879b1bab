//! Streaming dispatch tests (spec §8 scenario 4: Anthropic SSE triad).
//!
//! `wiremock` serves the whole SSE body as one response; `reqwest`'s
//! `bytes_stream()` then hands it to the adapter's drain loop as a single
//! chunk (or a few, depending on buffering), which exercises the same
//! `LineSplitter`/`drain_sse_body` path a real chunked response would.

use llm_dispatcher::config::Config;
use llm_dispatcher::providers::{AnthropicAdapter, OpenAiAdapter};
use llm_dispatcher::types::{Message, Request, VendorConfig};
use llm_dispatcher::Dispatcher;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ANTHROPIC_SSE_BODY: &str = concat!(
    "data: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\"Hello\"}}\n",
    "data: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\" world\"}}\n",
    "data: [DONE]\n",
);

#[tokio::test]
async fn anthropic_streaming_happy_path_matches_spec_scenario_four() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(ANTHROPIC_SSE_BODY.as_bytes().to_vec(), "text/event-stream"),
        )
        .mount(&server)
        .await;

    let adapter =
        AnthropicAdapter::new(VendorConfig::new("sk-ant-test").with_base_url(server.uri())).unwrap();
    let dispatcher = Dispatcher::new(Config::default());
    dispatcher.register_vendor(Arc::new(adapter)).unwrap();

    let request = Request::new("claude-3-5-sonnet-20241022", vec![Message::user("hi")]);
    let mut response = dispatcher
        .send_streaming(request, CancellationToken::new())
        .await
        .unwrap();

    let mut fragments = Vec::new();
    while let Some(fragment) = response.content.recv().await {
        fragments.push(fragment);
    }
    assert_eq!(fragments, vec!["Hello".to_string(), " world".to_string()]);
    assert_eq!(response.done.recv().await, Some(()));

    response.close();
    response.close(); // idempotent, spec §8 "calling Close more than once is a no-op"
}

#[tokio::test]
async fn streaming_to_vendor_that_returns_http_error_fails_before_any_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
        .mount(&server)
        .await;

    let adapter = OpenAiAdapter::new(VendorConfig::new("sk-bad").with_base_url(server.uri())).unwrap();
    let dispatcher = Dispatcher::new(Config::default());
    dispatcher.register_vendor(Arc::new(adapter)).unwrap();

    let request = Request::new("gpt-3.5-turbo", vec![Message::user("hi")]);
    let err = dispatcher
        .send_streaming(request, CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("openai"));

    let stats = dispatcher.stats();
    assert_eq!(stats.failed_requests, 1);
}
