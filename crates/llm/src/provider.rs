//! Chat Provider Trait
//!
//! Defines the common interface for all inference providers.

use async_trait::async_trait;

use super::types::{ChatRequestOptions, ChatResponse, LlmError, LlmResult, ProviderConfig};

/// Trait that all inference providers must implement.
///
/// Provides a unified interface for:
/// - Single-shot chat completions (`chat`)
/// - Health checking
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Returns the provider identifier.
    fn id(&self) -> &str;

    /// Returns the default model for this provider instance.
    fn model(&self) -> &str;

    /// Send a system + user message pair and return the complete response.
    async fn chat(
        &self,
        system: &str,
        user: &str,
        options: &ChatRequestOptions,
    ) -> LlmResult<ChatResponse>;

    /// Check if the provider is healthy and reachable.
    ///
    /// For API providers this validates the API key against a cheap
    /// endpoint; local providers check that the server is running.
    async fn health_check(&self) -> LlmResult<()>;

    /// Get the configuration for this provider.
    fn config(&self) -> &ProviderConfig;
}

/// Helper function to create an error for a missing API key
pub fn missing_api_key_error(provider: &str) -> LlmError {
    LlmError::AuthenticationFailed {
        message: format!("API key not configured for {}", provider),
    }
}

/// Helper function to parse HTTP error status codes
pub fn parse_http_error(status: u16, body: &str, provider: &str) -> LlmError {
    match status {
        401 => LlmError::AuthenticationFailed {
            message: format!("{}: Invalid API key", provider),
        },
        403 => LlmError::AuthenticationFailed {
            message: format!("{}: Access denied", provider),
        },
        404 => LlmError::ModelNotFound {
            model: body.to_string(),
        },
        429 => LlmError::RateLimited {
            message: body.to_string(),
            retry_after: None,
        },
        400 => LlmError::InvalidRequest {
            message: body.to_string(),
        },
        500..=599 => LlmError::ServerError {
            message: body.to_string(),
            status: Some(status),
        },
        _ => LlmError::Other {
            message: format!("HTTP {}: {}", status, body),
        },
    }
}
