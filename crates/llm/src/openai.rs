//! OpenAI-Compatible Provider
//!
//! Implementation of the `ChatProvider` trait against the OpenAI
//! chat-completions wire format. Works with any endpoint speaking the same
//! protocol via `ProviderConfig::base_url`.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::http_client::build_http_client;
use super::provider::{missing_api_key_error, parse_http_error, ChatProvider};
use super::types::{ChatRequestOptions, ChatResponse, LlmError, LlmResult, ProviderConfig};

/// Default OpenAI chat-completions endpoint
const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI-compatible chat provider
pub struct OpenAiProvider {
    id: String,
    config: ProviderConfig,
    client: reqwest::Client,
}

impl OpenAiProvider {
    /// Create a new provider with the given configuration.
    pub fn new(config: ProviderConfig) -> Self {
        Self::with_id("openai", config)
    }

    /// Create a provider with a custom identifier (for OpenAI-compatible
    /// gateways that should be recorded under their own name).
    pub fn with_id(id: impl Into<String>, config: ProviderConfig) -> Self {
        let client = build_http_client(config.timeout_secs);
        Self {
            id: id.into(),
            config,
            client,
        }
    }

    /// Get the API base URL
    fn base_url(&self) -> &str {
        self.config.base_url.as_deref().unwrap_or(OPENAI_API_URL)
    }

    /// Build the request body for the API
    fn build_request_body(
        &self,
        system: &str,
        user: &str,
        options: &ChatRequestOptions,
    ) -> serde_json::Value {
        let model = options.model.as_deref().unwrap_or(&self.config.model);
        let temperature = options.temperature.unwrap_or(self.config.temperature);
        let max_tokens = options.max_tokens.unwrap_or(self.config.max_tokens);

        serde_json::json!({
            "model": model,
            "max_tokens": max_tokens,
            "temperature": temperature,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
        })
    }
}

/// Subset of the chat-completions response we consume
#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    model: Option<String>,
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: Option<OpenAiMessage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn chat(
        &self,
        system: &str,
        user: &str,
        options: &ChatRequestOptions,
    ) -> LlmResult<ChatResponse> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| missing_api_key_error(&self.id))?;

        let body = self.build_request_body(system, user, options);
        debug!(provider = %self.id, model = ?body.get("model"), "sending chat request");

        let response = self
            .client
            .post(self.base_url())
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    LlmError::ProviderUnavailable {
                        message: e.to_string(),
                    }
                } else {
                    LlmError::NetworkError {
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status().as_u16();
        let body_text = response.text().await.map_err(|e| LlmError::NetworkError {
            message: e.to_string(),
        })?;

        if status != 200 {
            return Err(parse_http_error(status, &body_text, &self.id));
        }

        let parsed: OpenAiResponse =
            serde_json::from_str(&body_text).map_err(|e| LlmError::ParseError {
                message: format!("Failed to parse response: {}", e),
            })?;

        let content = parsed
            .choices
            .first()
            .and_then(|c| c.message.as_ref())
            .and_then(|m| m.content.clone())
            .ok_or_else(|| LlmError::ParseError {
                message: "Response contained no message content".to_string(),
            })?;

        let model = parsed.model.unwrap_or_else(|| self.config.model.clone());

        Ok(ChatResponse {
            content,
            provider_id: self.id.clone(),
            model,
        })
    }

    async fn health_check(&self) -> LlmResult<()> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| missing_api_key_error(&self.id))?;

        // Models listing is the cheapest authenticated endpoint.
        let models_url = models_endpoint(self.base_url());
        let response = self
            .client
            .get(&models_url)
            .header("Authorization", format!("Bearer {}", api_key))
            .send()
            .await
            .map_err(|e| LlmError::ProviderUnavailable {
                message: e.to_string(),
            })?;

        let status = response.status().as_u16();
        if status == 200 {
            Ok(())
        } else {
            let body_text = response.text().await.unwrap_or_default();
            Err(parse_http_error(status, &body_text, &self.id))
        }
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }
}

/// Derive the models endpoint from a chat-completions URL.
fn models_endpoint(chat_url: &str) -> String {
    match url::Url::parse(chat_url) {
        Ok(mut parsed) => {
            let path = parsed.path().replace("/chat/completions", "/models");
            parsed.set_path(&path);
            parsed.to_string()
        }
        Err(_) => chat_url.replace("/chat/completions", "/models"),
    }
}
