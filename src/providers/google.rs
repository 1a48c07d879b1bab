//! Google Gemini `generateContent` adapter (spec §6.1 row 4).
//!
//! Gemini authenticates via an API key embedded in the URL query string
//! rather than a header, and has no `[DONE]` sentinel for its streaming
//! endpoint — the stream simply ends with EOF once the JSON array closes.

use super::http::{self, drain_sse_body};
use super::{VendorAdapter, openai::build_header_map};
use crate::error::AdapterError;
use crate::streaming::{self, StreamingResponse};
use crate::types::{Capabilities, Request, Response, Usage, VendorConfig};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub struct GoogleAdapter {
    config: VendorConfig,
    client: Client,
}

fn capabilities() -> &'static Capabilities {
    use once_cell::sync::Lazy;
    static CAPABILITIES: Lazy<Capabilities> = Lazy::new(|| Capabilities {
        models: vec!["gemini-1.5-pro".into(), "gemini-1.5-flash".into(), "gemini-pro".into()],
        supports_streaming: true,
        max_tokens: 8192,
        max_input_tokens: 1_048_576,
    });
    &CAPABILITIES
}

impl GoogleAdapter {
    pub fn new(config: VendorConfig) -> Result<Self, AdapterError> {
        config
            .validate_requires_key()
            .map_err(|e| AdapterError::InvalidRequest(e.to_string()))?;
        let client =
            http::build_client(config.timeout).map_err(|e| AdapterError::Transport(e.to_string()))?;
        Ok(Self { config, client })
    }

    fn url(&self, model: &str, streaming: bool) -> String {
        let base = self.config.base_url_or(DEFAULT_BASE_URL);
        let method = if streaming {
            "streamGenerateContent"
        } else {
            "generateContent"
        };
        let mut url = format!(
            "{base}/v1beta/models/{model}:{method}?key={key}",
            base = base,
            model = model,
            method = method,
            key = self.config.api_key,
        );
        // `alt=sse` asks for an SSE-framed body; only the streaming call
        // drains one (see `drain_sse_body` above) — the unary call expects
        // a single JSON object and `resp.json()` would fail to parse an
        // SSE-framed response.
        if streaming {
            url.push_str("&alt=sse");
        }
        url
    }

    fn encode(&self, request: &Request) -> Value {
        let contents: Vec<Value> = request
            .messages
            .iter()
            .filter(|m| m.role != crate::types::Role::System)
            .map(|m| json!({"parts": [{"text": m.content}]}))
            .collect();

        let mut generation_config = json!({
            "temperature": request.temperature,
            "topP": request.top_p,
        });
        if request.max_tokens > 0 {
            generation_config["maxOutputTokens"] = request.max_tokens.into();
        }
        if !request.stop.is_empty() {
            generation_config["stopSequences"] = request.stop.clone().into();
        }

        json!({
            "contents": contents,
            "generationConfig": generation_config,
        })
    }

    fn decode(&self, value: Value, request: &Request) -> Result<Response, AdapterError> {
        let content = value
            .get("candidates")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("content"))
            .and_then(|c| c.get("parts"))
            .and_then(|p| p.get(0))
            .and_then(|p| p.get("text"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                AdapterError::Decode("missing candidates[0].content.parts[0].text".into())
            })?
            .to_string();

        let finish_reason = value
            .get("candidates")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("finishReason"))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        let prompt_tokens = value
            .get("usageMetadata")
            .and_then(|u| u.get("promptTokenCount"))
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as u32;
        let completion_tokens = value
            .get("usageMetadata")
            .and_then(|u| u.get("candidatesTokenCount"))
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as u32;
        let total_tokens = value
            .get("usageMetadata")
            .and_then(|u| u.get("totalTokenCount"))
            .and_then(|v| v.as_u64())
            .map(|v| v as u32)
            .unwrap_or(prompt_tokens + completion_tokens);

        Ok(Response {
            content,
            model: request.model.clone(),
            vendor: self.name().to_string(),
            usage: Usage {
                prompt_tokens,
                completion_tokens,
                total_tokens,
            },
            finish_reason,
            created_at: chrono::Utc::now(),
            estimated_cost: 0.0,
        })
    }
}

#[async_trait]
impl VendorAdapter for GoogleAdapter {
    fn name(&self) -> &'static str {
        "google"
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
        let body = self.encode(request);
        tracing::debug!(vendor = self.name(), model = %request.model, "sending request");

        let send = self
            .client
            .post(self.url(&request.model, false))
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
        let body = self.encode(request);

        let resp = self
            .client
            .post(self.url(&request.model, true))
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
            drain_sse_body(vendor, byte_stream, producer, cancel, parse_gemini_chunk).await;
        });
        Ok(response)
    }
}

fn parse_gemini_chunk(data: &str) -> Result<Option<String>, AdapterError> {
    let value: Value =
        serde_json::from_str(data).map_err(|e| AdapterError::Decode(e.to_string()))?;
    let text = value
        .get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.get(0))
        .and_then(|p| p.get("text"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;

    fn adapter() -> GoogleAdapter {
        GoogleAdapter::new(VendorConfig::new("AIza-test")).unwrap()
    }

    #[test]
    fn url_embeds_key_in_query_string() {
        let a = adapter();
        let url = a.url("gemini-1.5-pro", false);
        assert!(url.contains("key=AIza-test"));
        assert!(url.contains(":generateContent"));
    }

    #[test]
    fn unary_url_omits_alt_sse_but_streaming_url_keeps_it() {
        let a = adapter();
        assert!(!a.url("gemini-1.5-pro", false).contains("alt=sse"));
        let streaming_url = a.url("gemini-1.5-pro", true);
        assert!(streaming_url.contains("alt=sse"));
        assert!(streaming_url.contains(":streamGenerateContent"));
    }

    #[test]
    fn encode_drops_system_messages_from_contents() {
        let a = adapter();
        let req = Request::new(
            "gemini-1.5-pro",
            vec![Message::system("ignored by contents"), Message::user("hi")],
        );
        let body = a.encode(&req);
        assert_eq!(body["contents"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn decode_extracts_first_candidate_text() {
        let a = adapter();
        let req = Request::new("gemini-1.5-pro", vec![Message::user("hi")]);
        let value = json!({
            "candidates": [{"content": {"parts": [{"text": "hola"}]}, "finishReason": "STOP"}],
            "usageMetadata": {"promptTokenCount": 2, "candidatesTokenCount": 1, "totalTokenCount": 3},
        });
        let response = a.decode(value, &req).unwrap();
        assert_eq!(response.content, "hola");
        assert_eq!(response.usage.total_tokens, 3);
    }
}
