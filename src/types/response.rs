//! The unified [`Response`] produced by every adapter's unary call.

/// Token accounting for a single completion.
#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A completed chat response, stamped with the vendor that produced it and
/// (once the dispatcher has run) its estimated cost.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Response {
    pub content: String,
    pub model: String,
    pub vendor: String,
    pub usage: Usage,
    pub finish_reason: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// Populated by the dispatcher after a successful call; `0.0` until then.
    pub estimated_cost: f64,
}
