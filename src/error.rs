//! Error types surfaced by the dispatcher.
//!
//! Adapters return the narrower [`AdapterError`]; the dispatcher and retry
//! engine wrap it (or raise their own routing/validation failures) into the
//! public [`DispatchError`]. Callers only ever see one error type and never
//! need to unwrap adapter-internal layers to decide how to react.

use std::time::Duration;

/// Errors an adapter can return from `send_request` / `send_streaming_request`.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// The request failed local validation before it was ever sent.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The vendor responded with a non-2xx status.
    #[error("vendor returned HTTP {status}: {body}")]
    Http {
        status: u16,
        body: String,
        /// Parsed `Retry-After` header, when the vendor sent one.
        retry_after: Option<Duration>,
    },

    /// The response body could not be decoded into the vendor's wire shape.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// A network-layer failure: connection refused, DNS failure, TLS error, etc.
    #[error("transport error: {0}")]
    Transport(String),

    /// The HTTP call exceeded its deadline.
    #[error("timeout")]
    Timeout,

    /// The caller's cancellation token fired before completion.
    #[error("canceled")]
    Canceled,
}

impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AdapterError::Timeout
        } else {
            AdapterError::Transport(err.to_string())
        }
    }
}

impl AdapterError {
    /// The string the retry engine matches against the retryable-error set
    /// (spec §4.3: "error.Error() equals ... any default entry"). This
    /// unwraps the vendor-facing detail rather than using this enum's own
    /// `Display`, whose `thiserror` prefixes ("transport error: ", "failed
    /// to decode response: ", ...) would otherwise keep a raw `"timeout"` or
    /// `"connection refused"` from ever matching the spec's literal default
    /// strings.
    pub fn retry_key(&self) -> String {
        match self {
            AdapterError::InvalidRequest(msg) => msg.clone(),
            AdapterError::Http { body, .. } => body.clone(),
            AdapterError::Decode(msg) => msg.clone(),
            AdapterError::Transport(msg) => msg.clone(),
            AdapterError::Timeout => "timeout".to_string(),
            AdapterError::Canceled => "canceled".to_string(),
        }
    }
}

/// The single public error type returned by [`crate::Dispatcher`] operations.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The request itself was malformed (empty messages, out-of-range
    /// parameters, invalid mode, etc).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A [`crate::VendorConfig`] or adapter registration was malformed.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// `send_to_vendor` / `send_streaming_to_vendor` referenced an unknown name.
    #[error("vendor not found: {0}")]
    VendorNotFound(String),

    /// The vendor is registered but `is_available` returned false, or the
    /// vendor's capabilities do not cover the requested feature.
    #[error("vendor unavailable: {0}")]
    VendorUnavailable(String),

    /// No adapters have been registered with the dispatcher at all.
    #[error("no vendors registered")]
    NoVendorsRegistered,

    /// Adapters are registered, but none of them report as available.
    #[error("no available vendors")]
    NoAvailableVendors,

    /// The vendor returned a non-2xx HTTP status.
    #[error("vendor {vendor} HTTP error {status}: {body}")]
    HttpError {
        vendor: String,
        status: u16,
        body: String,
    },

    /// The vendor's response could not be decoded.
    #[error("decode error from {vendor}: {message}")]
    DecodeError { vendor: String, message: String },

    /// A network-layer failure occurred while talking to a vendor.
    #[error("transport error with {vendor}: {message}")]
    Transport { vendor: String, message: String },

    /// The caller's cancellation signal fired before completion.
    #[error("request canceled")]
    Canceled,

    /// The dispatcher's or caller's deadline elapsed.
    #[error("request timed out")]
    Timeout,

    /// Streaming was requested from a vendor whose capabilities disallow it.
    #[error("vendor {0} does not support streaming")]
    StreamingNotSupported(String),

    /// The retry engine exhausted its attempts.
    #[error("all attempts failed: {0}")]
    AllAttemptsFailed(#[source] Box<DispatchError>),

    /// A step-level wrapper used by the dispatcher to annotate where a
    /// failure originated (mode/vendor selection, request optimization, ...).
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<DispatchError>,
    },
}

impl DispatchError {
    /// Wraps `self` with a short description of the dispatch step that failed.
    pub fn context(self, context: impl Into<String>) -> Self {
        DispatchError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The exact string the retry engine matches against the retryable-error
    /// set. Mirrors `error.Error()` in the source design: retry
    /// classification is by exact string equality, not error kind.
    pub fn retry_key(&self) -> String {
        self.to_string()
    }
}

impl From<(&'static str, AdapterError)> for DispatchError {
    fn from((vendor, err): (&'static str, AdapterError)) -> Self {
        match err {
            AdapterError::InvalidRequest(msg) => DispatchError::InvalidRequest(msg),
            AdapterError::Http {
                status,
                body,
                retry_after: _,
            } => DispatchError::HttpError {
                vendor: vendor.to_string(),
                status,
                body,
            },
            AdapterError::Decode(message) => DispatchError::DecodeError {
                vendor: vendor.to_string(),
                message,
            },
            AdapterError::Transport(message) => DispatchError::Transport {
                vendor: vendor.to_string(),
                message,
            },
            AdapterError::Timeout => DispatchError::Timeout,
            AdapterError::Canceled => DispatchError::Canceled,
        }
    }
}

/// Convenience alias used throughout the crate's public API.
pub type Result<T> = std::result::Result<T, DispatchError>;
