//! The unified, vendor-agnostic data model.
//!
//! Every adapter translates into and out of these types; nothing outside
//! `src/providers` should ever construct a vendor-native request/response
//! shape directly.

mod capabilities;
mod config;
mod request;
mod response;

pub use capabilities::Capabilities;
pub use config::VendorConfig;
pub use request::{Message, Role, Mode};
pub use response::{Response, Usage};

use crate::error::DispatchError;

/// A vendor-agnostic chat-completion request.
///
/// `model` is required unless `mode` is set (the dispatcher fills in a
/// mode-specific default model — see [`crate::strategy`]). `messages` must be
/// non-empty and every message must be valid.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Request {
    /// Model identifier, vendor-specific (e.g. `"gpt-4o"`, `"claude-3-5-sonnet-20241022"`).
    #[serde(default)]
    pub model: String,
    /// Ordered conversation history.
    pub messages: Vec<Message>,
    /// Sampling temperature in `[0, 2]`. `0.0` means "unset" for mode optimization purposes.
    #[serde(default)]
    pub temperature: f32,
    /// Maximum tokens to generate. `0` means "unset".
    #[serde(default)]
    pub max_tokens: u32,
    /// Nucleus sampling parameter in `[0, 1]`. `0.0` means "unset".
    #[serde(default)]
    pub top_p: f32,
    /// Stop sequences.
    #[serde(default)]
    pub stop: Vec<String>,
    /// Opaque end-user identifier, passed through to vendors that support it.
    #[serde(default)]
    pub user: String,
    /// Whether this request should be dispatched as a streaming call.
    #[serde(default)]
    pub stream: bool,
    /// Optimization mode: `""`, `"auto"`, `"fast"`, `"sophisticated"`, `"cost_saving"`.
    #[serde(default)]
    pub mode: Mode,
}

impl Request {
    /// Builds a request from a model name and a list of messages, with all
    /// other fields left at their "unset" zero values.
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            ..Default::default()
        }
    }

    /// Validates the structural and range invariants from the data model:
    /// `(model != "" OR mode != Mode::None) AND messages non-empty AND every
    /// message valid AND numeric fields in range`.
    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.model.is_empty() && self.mode == Mode::None {
            return Err(DispatchError::InvalidRequest(
                "model must be set when mode is unset".into(),
            ));
        }
        if self.messages.is_empty() {
            return Err(DispatchError::InvalidRequest(
                "messages must not be empty".into(),
            ));
        }
        for message in &self.messages {
            message.validate()?;
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(DispatchError::InvalidRequest(format!(
                "temperature {} out of range [0, 2]",
                self.temperature
            )));
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(DispatchError::InvalidRequest(format!(
                "top_p {} out of range [0, 1]",
                self.top_p
            )));
        }
        Ok(())
    }
}
