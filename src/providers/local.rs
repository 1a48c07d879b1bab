//! Local backend adapter (spec §6.1 last two rows): either a real Ollama
//! HTTP server, or a local `llama.cpp`-style executable invoked directly.
//! Both live behind the single `"local"` vendor name, as spec §9's "ambient
//! additions" note in SPEC_FULL.md prescribes — [`LocalTransport`] picks
//! which wire format a given adapter instance speaks.

use super::http::{self, drain_sse_body};
use super::VendorAdapter;
use crate::error::AdapterError;
use crate::streaming::{self, StreamingResponse};
use crate::types::{Capabilities, Request, Response, Role, Usage, VendorConfig};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

const DEFAULT_SERVER_URL: &str = "http://localhost:11434";
/// Timeout applied to the `/api/tags` availability probe — this must not
/// block indefinitely (spec §4.1).
const AVAILABILITY_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Which local wire format a [`LocalAdapter`] instance speaks.
pub enum LocalTransport {
    /// An Ollama-compatible HTTP server.
    Http,
    /// A directly-invoked `llama.cpp`-style executable.
    Process {
        executable: String,
        model_path: String,
    },
}

pub struct LocalAdapter {
    config: VendorConfig,
    transport: LocalTransport,
    client: Client,
}

fn http_capabilities() -> &'static Capabilities {
    use once_cell::sync::Lazy;
    static CAPABILITIES: Lazy<Capabilities> = Lazy::new(|| Capabilities {
        models: vec!["llama3".into(), "llama3.1".into(), "mistral".into(), "phi3".into()],
        supports_streaming: true,
        max_tokens: 4096,
        max_input_tokens: 32_768,
    });
    &CAPABILITIES
}

fn process_capabilities() -> &'static Capabilities {
    use once_cell::sync::Lazy;
    static CAPABILITIES: Lazy<Capabilities> = Lazy::new(|| Capabilities {
        models: vec![],
        supports_streaming: false,
        max_tokens: 2048,
        max_input_tokens: 4096,
    });
    &CAPABILITIES
}

impl LocalAdapter {
    pub fn http(config: VendorConfig) -> Result<Self, AdapterError> {
        let client =
            http::build_client(config.timeout).map_err(|e| AdapterError::Transport(e.to_string()))?;
        Ok(Self { config, transport: LocalTransport::Http, client })
    }

    pub fn process(
        config: VendorConfig,
        executable: impl Into<String>,
        model_path: impl Into<String>,
    ) -> Result<Self, AdapterError> {
        let client =
            http::build_client(config.timeout).map_err(|e| AdapterError::Transport(e.to_string()))?;
        Ok(Self {
            config,
            transport: LocalTransport::Process {
                executable: executable.into(),
                model_path: model_path.into(),
            },
            client,
        })
    }

    fn server_url(&self) -> String {
        self.config.base_url_or(DEFAULT_SERVER_URL)
    }

    fn encode_http(&self, request: &Request, stream: bool) -> Value {
        let mut body = json!({
            "model": request.model,
            "messages": request.messages.iter().map(|m| json!({
                "role": super::role_str(m.role),
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
        body
    }

    fn decode_http(&self, value: Value, request: &Request) -> Result<Response, AdapterError> {
        let content = value
            .get("content")
            .and_then(|v| v.as_str())
            .or_else(|| value.get("message").and_then(|m| m.get("content")).and_then(|v| v.as_str()))
            .ok_or_else(|| AdapterError::Decode("missing content / message.content".into()))?
            .to_string();

        Ok(Response {
            content,
            model: request.model.clone(),
            vendor: self.name().to_string(),
            usage: Usage::default(),
            finish_reason: if value.get("done").and_then(|v| v.as_bool()).unwrap_or(false) {
                "stop".into()
            } else {
                String::new()
            },
            created_at: chrono::Utc::now(),
            estimated_cost: 0.0,
        })
    }

    /// Concatenates `"{Role}: {content}\n"` per message, then a trailing
    /// `"Assistant: "` to prompt completion (spec §6.1 last row).
    fn build_prompt(request: &Request) -> String {
        let mut prompt = String::new();
        for message in &request.messages {
            let label = match message.role {
                Role::System => "System",
                Role::User => "User",
                Role::Assistant => "Assistant",
            };
            prompt.push_str(label);
            prompt.push_str(": ");
            prompt.push_str(&message.content);
            prompt.push('\n');
        }
        prompt.push_str("Assistant: ");
        prompt
    }

    fn process_args(executable: &str, model_path: &str, request: &Request) -> Vec<String> {
        let threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        let _ = executable; // the binary itself is the Command program, not an arg
        vec![
            "-m".into(),
            model_path.into(),
            "--temp".into(),
            request.temperature.to_string(),
            "--top-p".into(),
            request.top_p.to_string(),
            "-n".into(),
            (if request.max_tokens > 0 { request.max_tokens } else { 256 }).to_string(),
            "-t".into(),
            threads.to_string(),
        ]
    }

    async fn run_process(
        executable: &str,
        model_path: &str,
        request: &Request,
    ) -> Result<String, AdapterError> {
        let prompt = Self::build_prompt(request);
        let args = Self::process_args(executable, model_path, request);

        let mut child = Command::new(executable)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| AdapterError::Transport(format!("failed to spawn {executable}: {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .await
                .map_err(|e| AdapterError::Transport(e.to_string()))?;
        }

        let mut stdout = String::new();
        if let Some(mut out) = child.stdout.take() {
            out.read_to_string(&mut stdout)
                .await
                .map_err(|e| AdapterError::Transport(e.to_string()))?;
        }

        let status = child
            .wait()
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;
        if !status.success() {
            return Err(AdapterError::Transport(format!(
                "{executable} exited with {status}"
            )));
        }

        // "stdout lines after the prompt echo" (spec §6.1): the binary echoes
        // the prompt it was given before generating; strip that prefix.
        let content = stdout
            .strip_prefix(prompt.as_str())
            .unwrap_or(stdout.as_str())
            .trim()
            .to_string();
        Ok(content)
    }
}

#[async_trait]
impl VendorAdapter for LocalAdapter {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn is_available(&self, cancel: &CancellationToken) -> bool {
        match &self.transport {
            LocalTransport::Http => {
                let probe = self
                    .client
                    .get(format!("{}/api/tags", self.server_url()))
                    .timeout(AVAILABILITY_PROBE_TIMEOUT)
                    .send();
                tokio::select! {
                    res = probe => res.map(|r| r.status().is_success()).unwrap_or(false),
                    _ = cancel.cancelled() => false,
                    _ = tokio::time::sleep(AVAILABILITY_PROBE_TIMEOUT) => false,
                }
            }
            LocalTransport::Process { executable, .. } => {
                if !std::path::Path::new(executable).exists() {
                    return false;
                }
                let probe = Command::new(executable).arg("--help").output();
                tokio::select! {
                    res = probe => res.map(|o| o.status.success()).unwrap_or(false),
                    _ = cancel.cancelled() => false,
                }
            }
        }
    }

    fn capabilities(&self) -> &Capabilities {
        match self.transport {
            LocalTransport::Http => http_capabilities(),
            LocalTransport::Process { .. } => process_capabilities(),
        }
    }

    async fn send_request(
        &self,
        request: &Request,
        cancel: &CancellationToken,
    ) -> Result<Response, AdapterError> {
        request
            .validate()
            .map_err(|e| AdapterError::InvalidRequest(e.to_string()))?;

        match &self.transport {
            LocalTransport::Http => {
                let body = self.encode_http(request, false);
                let send = self
                    .client
                    .post(format!("{}/api/chat", self.server_url()))
                    .json(&body)
                    .send();
                let resp = tokio::select! {
                    res = send => res?,
                    _ = cancel.cancelled() => return Err(AdapterError::Canceled),
                };
                let status = resp.status();
                if !status.is_success() {
                    let body_text = resp.text().await.unwrap_or_default();
                    return Err(AdapterError::Http {
                        status: status.as_u16(),
                        body: body_text,
                        retry_after: None,
                    });
                }
                let value: Value =
                    resp.json().await.map_err(|e| AdapterError::Decode(e.to_string()))?;
                self.decode_http(value, request)
            }
            LocalTransport::Process { executable, model_path } => {
                let run = Self::run_process(executable, model_path, request);
                let content = tokio::select! {
                    res = run => res?,
                    _ = cancel.cancelled() => return Err(AdapterError::Canceled),
                };
                Ok(Response {
                    content,
                    model: request.model.clone(),
                    vendor: self.name().to_string(),
                    usage: Usage::default(),
                    finish_reason: "stop".into(),
                    created_at: chrono::Utc::now(),
                    estimated_cost: 0.0,
                })
            }
        }
    }

    async fn send_streaming_request(
        &self,
        request: &Request,
        cancel: CancellationToken,
    ) -> Result<StreamingResponse, AdapterError> {
        request
            .validate()
            .map_err(|e| AdapterError::InvalidRequest(e.to_string()))?;

        match &self.transport {
            LocalTransport::Http => {
                let body = self.encode_http(request, true);
                let resp = self
                    .client
                    .post(format!("{}/api/chat", self.server_url()))
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
                let (producer, response) = streaming::channel_pair(
                    request.model.clone(),
                    self.name().to_string(),
                    Usage::default(),
                );
                let byte_stream = resp.bytes_stream();
                let vendor = self.name();
                tokio::spawn(async move {
                    drain_sse_body(vendor, byte_stream, producer, cancel, parse_ollama_chunk).await;
                });
                Ok(response)
            }
            LocalTransport::Process { .. } => Err(AdapterError::InvalidRequest(
                "local process transport does not support streaming".into(),
            )),
        }
    }
}

/// Ollama HTTP's streaming chunk carries the delta in a top-level `content`
/// field (spec §6.1) and signals completion with `"done": true` rather than
/// a `[DONE]` sentinel or SSE `data:` prefix — `drain_sse_body`'s line
/// splitter still applies since each JSON object arrives on its own line.
fn parse_ollama_chunk(data: &str) -> Result<Option<String>, AdapterError> {
    let value: Value =
        serde_json::from_str(data).map_err(|e| AdapterError::Decode(e.to_string()))?;
    if value.get("done").and_then(|v| v.as_bool()).unwrap_or(false) {
        return Ok(None);
    }
    let content = value
        .get("content")
        .and_then(|v| v.as_str())
        .or_else(|| value.get("message").and_then(|m| m.get("content")).and_then(|v| v.as_str()))
        .map(|s| s.to_string());
    Ok(content)
}
