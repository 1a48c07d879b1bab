//! Message, role, and mode types that make up a [`super::Request`].

use crate::error::DispatchError;
use std::str::FromStr;

/// The role a message was authored under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One turn of conversation.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// A message is valid iff its content is non-empty (role validity is
    /// enforced structurally by the `Role` enum itself).
    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.content.is_empty() {
            return Err(DispatchError::InvalidRequest(
                "message content must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// The optimization mode governing vendor preference and default parameters.
///
/// `Mode::None` is the wire representation of the empty string `""` — "no
/// mode selected", distinct from `Mode::Auto`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    #[serde(rename = "")]
    None,
    Auto,
    Fast,
    Sophisticated,
    CostSaving,
}

impl Mode {
    /// The stable string identifier used as a registry key, e.g. in
    /// `ModeOverrides::vendor_preferences`.
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::None => "",
            Mode::Auto => "auto",
            Mode::Fast => "fast",
            Mode::Sophisticated => "sophisticated",
            Mode::CostSaving => "cost_saving",
        }
    }
}

impl FromStr for Mode {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Ok(Mode::None),
            "auto" => Ok(Mode::Auto),
            "fast" => Ok(Mode::Fast),
            "sophisticated" => Ok(Mode::Sophisticated),
            "cost_saving" => Ok(Mode::CostSaving),
            other => Err(DispatchError::InvalidRequest(format!(
                "unknown mode: {other}"
            ))),
        }
    }
}
