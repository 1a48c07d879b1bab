//! The constants spec §4.2 calls out as "must be matched exactly": built-in
//! vendor preference orders, per-mode default request parameters, and the
//! per-mode default model used when a caller sets `mode` but not `model`.

use crate::types::Mode;

/// Built-in vendor preference order per mode, before any
/// `ModeOverrides::vendor_preferences` override is consulted. Vendor keys
/// match [`crate::providers::VendorAdapter::name`] exactly, so "azure" in
/// the spec prose is spelled `"azure-openai"` here.
pub const FAST_PREFERENCE: &[&str] = &["local", "anthropic", "openai", "google", "azure-openai"];
pub const SOPHISTICATED_PREFERENCE: &[&str] =
    &["anthropic", "openai", "google", "azure-openai", "local"];
pub const COST_SAVING_PREFERENCE: &[&str] =
    &["local", "google", "openai", "anthropic", "azure-openai"];
pub const AUTO_PREFERENCE: &[&str] = &["anthropic", "openai", "google", "local", "azure-openai"];

/// The mode-tuned defaults a strategy fills into unset (zero-valued)
/// request parameters.
#[derive(Debug, Clone, Copy)]
pub struct ModeDefaults {
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
}

pub fn defaults_for(mode: Mode) -> ModeDefaults {
    match mode {
        Mode::Fast => ModeDefaults {
            temperature: 0.3,
            max_tokens: 150,
            top_p: 0.8,
        },
        Mode::Sophisticated => ModeDefaults {
            temperature: 0.7,
            max_tokens: 1000,
            top_p: 0.9,
        },
        Mode::CostSaving => ModeDefaults {
            temperature: 0.1,
            max_tokens: 100,
            top_p: 0.7,
        },
        // `Mode::None` never reaches a strategy (the dispatcher only
        // resolves a strategy once a mode is selected), so it shares
        // `auto`'s defaults as a harmless fallback.
        Mode::Auto | Mode::None => ModeDefaults {
            temperature: 0.5,
            max_tokens: 500,
            top_p: 0.85,
        },
    }
}

/// Default model filled in when `request.mode` is set but `request.model`
/// is empty (spec §4.2, end of section).
pub fn default_model_for(mode: Mode) -> &'static str {
    match mode {
        Mode::Fast => "gpt-3.5-turbo",
        Mode::Sophisticated => "gpt-4o",
        Mode::CostSaving => "gpt-3.5-turbo",
        Mode::Auto | Mode::None => "gpt-3.5-turbo",
    }
}
