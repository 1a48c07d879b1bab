//! Anthropic Messages API adapter (spec §6.1 row 3).

use super::http::{self, drain_sse_body};
use super::{VendorAdapter, openai::build_header_map, role_str};
use crate::error::AdapterError;
use crate::streaming::{self, StreamingResponse};
use crate::types::{Capabilities, Request, Response, Role, Usage, VendorConfig};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicAdapter {
    config: VendorConfig,
    client: Client,
}

fn capabilities() -> &'static Capabilities {
    use once_cell::sync::Lazy;
    static CAPABILITIES: Lazy<Capabilities> = Lazy::new(|| Capabilities {
        models: vec![
            "claude-3-5-sonnet-20241022".into(),
            "claude-3-opus-20240229".into(),
            "claude-3-haiku-20240307".into(),
        ],
        supports_streaming: true,
        max_tokens: 4096,
        max_input_tokens: 200_000,
    });
    &CAPABILITIES
}

impl AnthropicAdapter {
    pub fn new(config: VendorConfig) -> Result<Self, AdapterError> {
        config
            .validate_requires_key()
            .map_err(|e| AdapterError::InvalidRequest(e.to_string()))?;
        let client =
            http::build_client(config.timeout).map_err(|e| AdapterError::Transport(e.to_string()))?;
        Ok(Self { config, client })
    }

    fn url(&self) -> String {
        format!("{}/v1/messages", self.config.base_url_or(DEFAULT_BASE_URL))
    }

    /// Anthropic separates a leading `system` message out of the `messages`
    /// array into a top-level `system` field; `messages` content is an array
    /// of typed content blocks rather than a bare string.
    fn encode(&self, request: &Request, stream: bool) -> Value {
        let mut system = String::new();
        let mut messages = Vec::new();
        for message in &request.messages {
            if message.role == Role::System {
                if !system.is_empty() {
                    system.push('\n');
                }
                system.push_str(&message.content);
                continue;
            }
            messages.push(json!({
                "role": role_str(message.role),
                "content": [{"type": "text", "text": message.content}],
            }));
        }

        let mut body = json!({
            "model": request.model,
            "messages": messages,
            "max_tokens": if request.max_tokens > 0 { request.max_tokens } else { 4096 },
            "temperature": request.temperature,
            "top_p": request.top_p,
            "stream": stream,
        });
        if !system.is_empty() {
            body["system"] = system.into();
        }
        body
    }

    fn decode(&self, value: Value, request: &Request) -> Result<Response, AdapterError> {
        let content = value
            .get("content")
            .and_then(|c| c.as_array())
            .and_then(|blocks| blocks.iter().find_map(|b| b.get("text")).and_then(|v| v.as_str()))
            .ok_or_else(|| AdapterError::Decode("missing content[].text".into()))?
            .to_string();

        let finish_reason = value
            .get("stop_reason")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        let model = value
            .get("model")
            .and_then(|v| v.as_str())
            .unwrap_or(&request.model)
            .to_string();

        let prompt_tokens = value
            .get("usage")
            .and_then(|u| u.get("input_tokens"))
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as u32;
        let completion_tokens = value
            .get("usage")
            .and_then(|u| u.get("output_tokens"))
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as u32;

        Ok(Response {
            content,
            model,
            vendor: self.name().to_string(),
            usage: Usage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            },
            finish_reason,
            created_at: chrono::Utc::now(),
            estimated_cost: 0.0,
        })
    }
}

#[async_trait]
impl VendorAdapter for AnthropicAdapter {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn is_available(&self, _cancel: &CancellationToken) -> bool {
        !self.config.api_key.is_empty()
    }

    fn capabilities(&self) -> &Capabilities {
        capabilities()
    }

    async fn send_request(
        &self,
        request: &Request,
        cancel: &CancellationToken,
    ) -> Result<Response, AdapterError> {
        request
            .validate()
            .map_err(|e| AdapterError::InvalidRequest(e.to_string()))?;
        let body = self.encode(request, false);
        tracing::debug!(vendor = self.name(), model = %request.model, "sending request");

        let send = self
            .client
            .post(self.url())
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .headers(build_header_map(&self.config))
            .json(&body)
            .send();

        let resp = tokio::select! {
            res = send => res?,
            _ = cancel.cancelled() => return Err(AdapterError::Canceled),
        };

        let status = resp.status();
        if !status.is_success() {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(http::parse_retry_after);
            let body_text = resp.text().await.unwrap_or_default();
            tracing::warn!(vendor = self.name(), status = status.as_u16(), "vendor returned error");
            return Err(AdapterError::Http {
                status: status.as_u16(),
                body: body_text,
                retry_after,
            });
        }

        let value: Value = resp.json().await.map_err(|e| AdapterError::Decode(e.to_string()))?;
        self.decode(value, request)
    }

    async fn send_streaming_request(
        &self,
        request: &Request,
        cancel: CancellationToken,
    ) -> Result<StreamingResponse, AdapterError> {
        request
            .validate()
            .map_err(|e| AdapterError::InvalidRequest(e.to_string()))?;
        let body = self.encode(request, true);

        let resp = self
            .client
            .post(self.url())
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .headers(build_header_map(&self.config))
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(AdapterError::Http {
                status: status.as_u16(),
                body: body_text,
                retry_after: None,
            });
        }

        let (producer, response) =
            streaming::channel_pair(request.model.clone(), self.name().to_string(), Usage::default());
        let byte_stream = resp.bytes_stream();
        let vendor = self.name();
        tokio::spawn(async move {
            drain_sse_body(vendor, byte_stream, producer, cancel, parse_anthropic_event).await;
        });
        Ok(response)
    }
}

/// Only `content_block_delta` events with a `text_delta` carry visible text
/// (spec §6.1: "`delta.text` when event type is `content_block_delta`").
/// Every other event type (`message_start`, `ping`, `message_stop`, ...)
/// yields `Ok(None)`.
fn parse_anthropic_event(data: &str) -> Result<Option<String>, AdapterError> {
    let value: Value =
        serde_json::from_str(data).map_err(|e| AdapterError::Decode(e.to_string()))?;
    if value.get("type").and_then(|v| v.as_str()) != Some("content_block_delta") {
        return Ok(None);
    }
    let text = value
        .get("delta")
        .and_then(|d| d.get("text"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    Ok(text)
}
