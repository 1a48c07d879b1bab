//! Vendor-level configuration, immutable once an adapter is constructed.

use crate::error::DispatchError;
use std::collections::HashMap;
use std::time::Duration;

/// Connection details and credentials for one vendor adapter.
///
/// Constructed directly by the caller (loading it from environment
/// variables or a config file is an external-collaborator concern, outside
/// this crate's scope).
#[derive(Debug, Clone, Default)]
pub struct VendorConfig {
    /// API key / bearer token. Required for every vendor except local ones.
    pub api_key: String,
    /// Base URL override; when empty, the adapter uses its documented default.
    pub base_url: String,
    /// Per-request timeout. `Duration::ZERO` means "no explicit timeout".
    pub timeout: Duration,
    /// Extra headers merged in after the adapter's own default headers.
    pub headers: HashMap<String, String>,
}

impl VendorConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Shared validation: a negative timeout can't occur in `Duration`, so
    /// this only rejects explicitly-required-but-missing API keys. Adapters
    /// that don't require a key (local backends) skip this check.
    pub fn validate_requires_key(&self) -> Result<(), DispatchError> {
        if self.api_key.is_empty() {
            return Err(DispatchError::InvalidConfig(
                "api_key must not be empty".into(),
            ));
        }
        Ok(())
    }

    pub fn base_url_or(&self, default: &str) -> String {
        if self.base_url.is_empty() {
            default.to_string()
        } else {
            self.base_url.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_api_key_fails_validation() {
        let config = VendorConfig::default();
        assert!(config.validate_requires_key().is_err());
    }

    #[test]
    fn base_url_or_falls_back_to_default() {
        let config = VendorConfig::new("key");
        assert_eq!(config.base_url_or("https://default"), "https://default");
        let config = config.with_base_url("https://custom");
        assert_eq!(config.base_url_or("https://default"), "https://custom");
    }
}
