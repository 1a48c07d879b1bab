//! Vendor adapters (spec §4.1): one implementation per provider, each a
//! stateless wrapper around a [`crate::VendorConfig`] and a shared HTTP
//! client.
//!
//! Every concrete adapter implements [`VendorAdapter`] — the capability set
//! {name, is_available, capabilities, send_request, send_streaming_request}
//! — and never retries or swallows errors itself; that is the retry
//! engine's job (see [`crate::retry`]).

mod anthropic;
mod azure;
mod google;
pub(crate) mod http;
mod local;
mod openai;

pub use anthropic::AnthropicAdapter;
pub use azure::AzureOpenAiAdapter;
pub use google::GoogleAdapter;
pub use local::{LocalAdapter, LocalTransport};
pub use openai::OpenAiAdapter;

use crate::error::AdapterError;
use crate::streaming::StreamingResponse;
use crate::types::{Capabilities, Request, Response};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// A stateless, shareable vendor integration. Registered with the
/// [`crate::Dispatcher`] under [`VendorAdapter::name`].
#[async_trait]
pub trait VendorAdapter: Send + Sync {
    /// Stable key used in the vendor registry and statistics, e.g. `"openai"`.
    fn name(&self) -> &'static str;

    /// Availability predicate (spec §4.1). Must not block indefinitely —
    /// implementations that perform network I/O honor `cancel`.
    async fn is_available(&self, cancel: &CancellationToken) -> bool;

    /// Static capability record: supported models, streaming support, token limits.
    fn capabilities(&self) -> &Capabilities;

    /// Unary call: validate, encode, POST, decode, translate to [`Response`].
    async fn send_request(
        &self,
        request: &Request,
        cancel: &CancellationToken,
    ) -> Result<Response, AdapterError>;

    /// Streaming call: validate, encode with `stream=true`, return a
    /// [`StreamingResponse`] immediately while a background task drains the
    /// HTTP body. `cancel` is moved into that background task.
    async fn send_streaming_request(
        &self,
        request: &Request,
        cancel: CancellationToken,
    ) -> Result<StreamingResponse, AdapterError>;
}

/// Maps a [`crate::types::Role`] to the wire string every vendor but
/// Anthropic's content-block form uses directly.
pub(crate) fn role_str(role: crate::types::Role) -> &'static str {
    match role {
        crate::types::Role::System => "system",
        crate::types::Role::User => "user",
        crate::types::Role::Assistant => "assistant",
    }
}
