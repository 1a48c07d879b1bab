//! OpenAI chat-completions adapter (spec §6.1 row 1).

use super::http::{self, drain_sse_body};
use super::{VendorAdapter, role_str};
use crate::error::AdapterError;
use crate::streaming::{self, StreamingResponse};
use crate::types::{Capabilities, Request, Response, Usage, VendorConfig};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiAdapter {
    config: VendorConfig,
    client: Client,
}

fn capabilities() -> &'static Capabilities {
    use once_cell::sync::Lazy;
    static CAPABILITIES: Lazy<Capabilities> = Lazy::new(|| Capabilities {
        models: vec!["gpt-3.5-turbo".into(), "gpt-4".into(), "gpt-4-turbo".into(), "gpt-4o".into()],
        supports_streaming: true,
        max_tokens: 4096,
        max_input_tokens: 128_000,
    });
    &CAPABILITIES
}

impl OpenAiAdapter {
    pub fn new(config: VendorConfig) -> Result<Self, AdapterError> {
        config
            .validate_requires_key()
            .map_err(|e| AdapterError::InvalidRequest(e.to_string()))?;
        let client =
            http::build_client(config.timeout).map_err(|e| AdapterError::Transport(e.to_string()))?;
        Ok(Self { config, client })
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url_or(DEFAULT_BASE_URL))
    }

    fn extra_headers(&self) -> reqwest::header::HeaderMap {
        build_header_map(&self.config)
    }

    fn encode(&self, request: &Request, stream: bool) -> Value {
        let mut body = json!({
            "model": request.model,
            "messages": request.messages.iter().map(|m| json!({
                "role": role_str(m.role),
                "content": m.content,
            })).collect::<Vec<_>>(),
            "temperature": request.temperature,
            "top_p": request.top_p,
            "stream": stream,
        });
        if request.max_tokens > 0 {
            body["max_tokens"] = request.max_tokens.into();
        }
        if !request.stop.is_empty() {
            body["stop"] = request.stop.clone().into();
        }
        if !request.user.is_empty() {
            body["user"] = request.user.clone().into();
        }
        body
    }

    fn decode(&self, value: Value, request: &Request) -> Result<Response, AdapterError> {
        let content = value
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| AdapterError::Decode("missing choices[0].message.content".into()))?
            .to_string();

        let finish_reason = value
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("finish_reason"))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        let model = value
            .get("model")
            .and_then(|v| v.as_str())
            .unwrap_or(&request.model)
            .to_string();

        let usage = value
            .get("usage")
            .map(|u| Usage {
                prompt_tokens: u.get("prompt_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
                completion_tokens: u
                    .get("completion_tokens")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0) as u32,
                total_tokens: u.get("total_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
            })
            .unwrap_or_default();

        Ok(Response {
            content,
            model,
            vendor: self.name().to_string(),
            usage,
            finish_reason,
            created_at: chrono::Utc::now(),
            estimated_cost: 0.0,
        })
    }
}

#[async_trait]
impl VendorAdapter for OpenAiAdapter {
    fn name(&self) -> &'static str {
        "openai"
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
            .bearer_auth(&self.config.api_key)
            .headers(self.extra_headers())
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
            .bearer_auth(&self.config.api_key)
            .headers(self.extra_headers())
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
            drain_sse_body(vendor, byte_stream, producer, cancel, parse_openai_chunk).await;
        });
        Ok(response)
    }
}

fn parse_openai_chunk(data: &str) -> Result<Option<String>, AdapterError> {
    let value: Value =
        serde_json::from_str(data).map_err(|e| AdapterError::Decode(e.to_string()))?;
    let content = value
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("delta"))
        .and_then(|d| d.get("content"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    Ok(content)
}

pub(crate) fn build_header_map(config: &VendorConfig) -> reqwest::header::HeaderMap {
    let mut map = reqwest::header::HeaderMap::new();
    for (key, value) in &config.headers {
        if let (Ok(name), Ok(val)) = (
            reqwest::header::HeaderName::from_bytes(key.as_bytes()),
            reqwest::header::HeaderValue::from_str(value),
        ) {
            map.insert(name, val);
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;

    fn adapter() -> OpenAiAdapter {
        OpenAiAdapter::new(VendorConfig::new("sk-test")).unwrap()
    }

    #[test]
    fn encode_fills_optional_fields_only_when_set() {
        let a = adapter();
        let req = Request::new("gpt-4o", vec![Message::user("hi")]);
        let body = a.encode(&req, false);
        assert!(body.get("max_tokens").is_none());
        assert_eq!(body["model"], "gpt-4o");
    }

    #[test]
    fn decode_extracts_content_and_usage() {
        let a = adapter();
        let req = Request::new("gpt-3.5-turbo", vec![Message::user("hello")]);
        let value = json!({
            "model": "gpt-3.5-turbo",
            "choices": [{"message": {"content": "hi"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 3, "completion_tokens": 1, "total_tokens": 4},
        });
        let response = a.decode(value, &req).unwrap();
        assert_eq!(response.content, "hi");
        assert_eq!(response.usage.total_tokens, 4);
        assert_eq!(response.vendor, "openai");
    }

    #[test]
    fn decode_missing_content_is_an_error() {
        let a = adapter();
        let req = Request::new("gpt-3.5-turbo", vec![Message::user("hello")]);
        let value = json!({"choices": [{}]});
        assert!(a.decode(value, &req).is_err());
    }

    #[tokio::test]
    async fn is_available_requires_api_key() {
        let adapter = adapter();
        assert!(adapter.is_available(&CancellationToken::new()).await);

        let empty = OpenAiAdapter {
            config: VendorConfig::default(),
            client: http::build_client(std::time::Duration::ZERO).unwrap(),
        };
        assert!(!empty.is_available(&CancellationToken::new()).await);
    }
}
