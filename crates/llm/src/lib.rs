//! Content Review LLM
//!
//! Provides a unified interface for the inference providers that back
//! analyzer execution:
//! - OpenAI (and OpenAI-compatible gateways)
//!
//! The `ChatProvider` trait is deliberately small (a single-shot
//! system + user completion) because analyzers consume one response per
//! execution; streaming is not part of this surface.

pub mod http_client;
pub mod openai;
pub mod provider;
pub mod types;

// Re-export main types
pub use http_client::build_http_client;
pub use openai::OpenAiProvider;
pub use provider::{missing_api_key_error, parse_http_error, ChatProvider};
pub use types::{ChatRequestOptions, ChatResponse, LlmError, LlmResult, ProviderConfig};
