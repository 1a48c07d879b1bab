//! Static per-adapter capability declarations.

/// What a vendor adapter is able to do, queried once at registration/selection
/// time — never mutated for the lifetime of the adapter.
#[derive(Debug, Clone)]
pub struct Capabilities {
    /// Model identifiers this adapter accepts.
    pub models: Vec<String>,
    pub supports_streaming: bool,
    pub max_tokens: u32,
    pub max_input_tokens: u32,
}

impl Capabilities {
    pub fn supports_model(&self, model: &str) -> bool {
        self.models.iter().any(|m| m == model)
    }
}
