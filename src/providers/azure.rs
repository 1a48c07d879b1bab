//! Azure OpenAI deployments adapter (spec §6.1 row 2).
//!
//! Unlike every other vendor, the model identifier lives in the URL path
//! (the deployment name) rather than the JSON body, and availability
//! additionally requires a non-empty `base_url` (spec §4.1).

use super::http::{self, drain_sse_body};
use super::{VendorAdapter, openai::build_header_map, role_str};
use crate::error::AdapterError;
use crate::streaming::{self, StreamingResponse};
use crate::types::{Capabilities, Request, Response, Usage, VendorConfig};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

const API_VERSION: &str = "2024-02-15-preview";

pub struct AzureOpenAiAdapter {
    config: VendorConfig,
    client: Client,
}

fn capabilities() -> &'static Capabilities {
    use once_cell::sync::Lazy;
    static CAPABILITIES: Lazy<Capabilities> = Lazy::new(|| Capabilities {
        models: vec!["gpt-35-turbo".into(), "gpt-4".into(), "gpt-4o".into()],
        supports_streaming: true,
        max_tokens: 4096,
        max_input_tokens: 128_000,
    });
    &CAPABILITIES
}

impl AzureOpenAiAdapter {
    pub fn new(config: VendorConfig) -> Result<Self, AdapterError> {
        config
            .validate_requires_key()
            .map_err(|e| AdapterError::InvalidRequest(e.to_string()))?;
        if config.base_url.is_empty() {
            return Err(AdapterError::InvalidRequest(
                "azure-openai requires a base_url (the resource endpoint)".into(),
            ));
        }
        let client =
            http::build_client(config.timeout).map_err(|e| AdapterError::Transport(e.to_string()))?;
        Ok(Self { config, client })
    }

    fn url(&self, model: &str) -> String {
        format!(
            "{base}/openai/deployments/{model}/chat/completions?api-version={version}",
            base = self.config.base_url.trim_end_matches('/'),
            model = model,
            version = API_VERSION,
        )
    }

    fn encode(&self, request: &Request, stream: bool) -> Value {
        let mut body = json!({
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
            model: request.model.clone(),
            vendor: self.name().to_string(),
            usage,
            finish_reason,
            created_at: chrono::Utc::now(),
            estimated_cost: 0.0,
        })
    }
}

#[async_trait]
impl VendorAdapter for AzureOpenAiAdapter {
    fn name(&self) -> &'static str {
        "azure-openai"
    }

    async fn is_available(&self, _cancel: &CancellationToken) -> bool {
        !self.config.api_key.is_empty() && !self.config.base_url.is_empty()
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
            .post(self.url(&request.model))
            .header("api-key", &self.config.api_key)
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
            .post(self.url(&request.model))
            .header("api-key", &self.config.api_key)
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
            drain_sse_body(vendor, byte_stream, producer, cancel, parse_azure_chunk).await;
        });
        Ok(response)
    }
}

fn parse_azure_chunk(data: &str) -> Result<Option<String>, AdapterError> {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;

    fn adapter() -> AzureOpenAiAdapter {
        AzureOpenAiAdapter::new(
            VendorConfig::new("azure-key").with_base_url("https://my-resource.openai.azure.com"),
        )
        .unwrap()
    }

    #[test]
    fn rejects_missing_base_url() {
        assert!(AzureOpenAiAdapter::new(VendorConfig::new("key")).is_err());
    }

    #[test]
    fn url_places_model_in_path_not_body() {
        let a = adapter();
        let url = a.url("gpt-4o");
        assert!(url.contains("/openai/deployments/gpt-4o/chat/completions"));
        assert!(url.contains("api-version=2024-02-15-preview"));

        let req = Request::new("gpt-4o", vec![Message::user("hi")]);
        let body = a.encode(&req, false);
        assert!(body.get("model").is_none());
    }

    #[tokio::test]
    async fn availability_requires_both_key_and_base_url() {
        let a = adapter();
        assert!(a.is_available(&CancellationToken::new()).await);
    }
}
