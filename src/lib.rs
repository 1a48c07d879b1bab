//! Multi-vendor LLM chat-completion dispatcher.
//!
//! Register one [`providers::VendorAdapter`] per backend (OpenAI,
//! Anthropic, Google Gemini, Azure OpenAI deployments, or a local
//! Ollama/llama.cpp process) with a [`Dispatcher`], then call
//! [`Dispatcher::send`] or [`Dispatcher::send_streaming`]. A [`types::Mode`]
//! on the request drives vendor selection and parameter defaults; retries,
//! cost estimation, and usage statistics are handled underneath.
//!
//! ```no_run
//! use llm_dispatcher::config::Config;
//! use llm_dispatcher::providers::OpenAiAdapter;
//! use llm_dispatcher::types::{Message, Request, VendorConfig};
//! use llm_dispatcher::Dispatcher;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let dispatcher = Dispatcher::new(Config::default());
//! dispatcher.register_vendor(Arc::new(OpenAiAdapter::new(VendorConfig::new("sk-..."))?))?;
//!
//! let request = Request::new("gpt-3.5-turbo", vec![Message::user("hello")]);
//! let response = dispatcher.send(request, &CancellationToken::new()).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod cost;
mod dispatcher;
pub mod error;
pub mod providers;
pub mod retry;
pub mod stats;
pub mod strategy;
pub mod streaming;
pub mod types;

pub use dispatcher::Dispatcher;
pub use error::{AdapterError, DispatchError, Result};
