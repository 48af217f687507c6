//! Anthropic API client implementation
//!
//! This module implements the CompletionClient trait for the Anthropic (Claude) API.
//! System-role messages are lifted into the top-level `system` field.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use serde_json::{Value, json};

use crate::error::{CallError, ProviderError};
use crate::llm::client::{CHAT_COMPLETION, CompletionClient};
use crate::llm::http::{build_http_client, send_json};
use crate::llm::types::{CompletionRequest, CompletionResponse, FinishReason, Role, Usage};

/// Anthropic API base URL
const ANTHROPIC_API_URL: &str = "https://api.anthropic.com";

/// Anthropic API version
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Default model to use
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// The messages API requires max_tokens
const DEFAULT_MAX_TOKENS: u32 = 8192;

/// Configuration for the Anthropic client
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub model: String,
    pub max_tokens: u32,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            base_url: ANTHROPIC_API_URL.to_string(),
            timeout: Duration::from_secs(300),
        }
    }
}

impl AnthropicConfig {
    /// Create a new config with a specific model
    pub fn with_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }
}

/// Anthropic API client
pub struct AnthropicClient {
    client: reqwest::Client,
    api_key: String,
    config: AnthropicConfig,
}

impl AnthropicClient {
    /// Create a client with an explicit API key
    pub fn with_api_key(api_key: String, config: AnthropicConfig) -> Result<Self, ProviderError> {
        let client = build_http_client(config.timeout).map_err(|e| ProviderError::new("client_init", e))?;
        Ok(Self {
            client,
            api_key,
            config,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'))
    }

    /// Build the request body for the Anthropic API
    fn build_request(&self, request: &CompletionRequest) -> Value {
        let model = request.model.as_deref().unwrap_or(&self.config.model);
        let max_tokens = request.max_tokens.unwrap_or(self.config.max_tokens);

        let system: Vec<&str> = request
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();

        let messages: Vec<Value> = request
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
            .collect();

        let mut body = json!({
            "model": model,
            "max_tokens": max_tokens,
            "temperature": request.temperature,
            "messages": messages
        });

        if !system.is_empty() {
            body["system"] = json!(system.join("\n\n"));
        }

        body
    }

    /// Parse the API response into a CompletionResponse
    fn parse_response(&self, body: &Value) -> Result<CompletionResponse, CallError> {
        let finish_reason = match body["stop_reason"].as_str() {
            Some("end_turn") | Some("stop_sequence") | None => FinishReason::Stop,
            Some("max_tokens") => FinishReason::Length,
            Some(_) => FinishReason::Other,
        };

        let usage = Usage::new(
            body["usage"]["input_tokens"].as_u64().unwrap_or(0),
            body["usage"]["output_tokens"].as_u64().unwrap_or(0),
        );

        let blocks = body["content"]
            .as_array()
            .ok_or_else(|| CallError::InvalidResponse("response has no content blocks".to_string()))?;

        let mut content = String::new();
        for block in blocks {
            if block["type"].as_str() == Some("text")
                && let Some(text) = block["text"].as_str()
            {
                if !content.is_empty() {
                    content.push('\n');
                }
                content.push_str(text);
            }
        }

        Ok(CompletionResponse {
            content,
            finish_reason,
            usage,
        })
    }

    async fn send(&self, request: &CompletionRequest) -> Result<CompletionResponse, CallError> {
        let body = self.build_request(request);
        debug!("POST {} model={}", self.endpoint(), body["model"]);
        let http = self
            .client
            .post(self.endpoint())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);
        let response = send_json(http, self.config.timeout).await?;
        self.parse_response(&response)
    }
}

#[async_trait]
impl CompletionClient for AnthropicClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        self.send(&request)
            .await
            .map_err(|e| ProviderError::new(CHAT_COMPLETION, e))
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

impl std::fmt::Debug for AnthropicClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicClient")
            .field("model", &self.config.model)
            .field("max_tokens", &self.config.max_tokens)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::Message;

    fn client() -> AnthropicClient {
        AnthropicClient::with_api_key("test-key".to_string(), AnthropicConfig::default()).unwrap()
    }

    #[test]
    fn test_config_with_model() {
        let config = AnthropicConfig::with_model("claude-3-haiku-20240307");
        assert_eq!(config.model, "claude-3-haiku-20240307");
        assert_eq!(config.max_tokens, DEFAULT_MAX_TOKENS);
    }

    #[test]
    fn test_build_request_lifts_system_messages() {
        let request = CompletionRequest::new(vec![
            Message::system("You are helpful"),
            Message::user("Context"),
            Message::user("Hello"),
        ]);

        let body = client().build_request(&request);

        assert_eq!(body["model"], DEFAULT_MODEL);
        assert_eq!(body["max_tokens"], DEFAULT_MAX_TOKENS);
        assert_eq!(body["system"], "You are helpful");
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["content"], "Context");
        assert_eq!(messages[1]["content"], "Hello");
    }

    #[test]
    fn test_build_request_without_system() {
        let request = CompletionRequest::new(vec![Message::user("Hello")]).with_max_tokens(Some(100));
        let body = client().build_request(&request);
        assert!(body.get("system").is_none());
        assert_eq!(body["max_tokens"], 100);
    }

    #[test]
    fn test_parse_response_text_blocks() {
        let api_response = json!({
            "content": [
                { "type": "text", "text": "Hello" },
                { "type": "text", "text": "there" }
            ],
            "stop_reason": "end_turn",
            "usage": { "input_tokens": 10, "output_tokens": 5 }
        });

        let response = client().parse_response(&api_response).unwrap();
        assert_eq!(response.content, "Hello\nthere");
        assert_eq!(response.finish_reason, FinishReason::Stop);
        assert_eq!(response.usage, Usage::new(10, 5));
    }

    #[test]
    fn test_parse_response_max_tokens() {
        let api_response = json!({
            "content": [{ "type": "text", "text": "partial" }],
            "stop_reason": "max_tokens"
        });
        let response = client().parse_response(&api_response).unwrap();
        assert!(response.finish_reason.is_truncated());
    }

    #[test]
    fn test_parse_response_missing_content() {
        let err = client().parse_response(&json!({ "stop_reason": "end_turn" })).unwrap_err();
        assert!(matches!(err, CallError::InvalidResponse(_)));
    }

    #[test]
    fn test_debug_impl() {
        let debug_str = format!("{:?}", client());
        assert!(debug_str.contains("AnthropicClient"));
        assert!(debug_str.contains(DEFAULT_MODEL));
        assert!(!debug_str.contains("test-key"));
    }
}
