//! Mistral chat-completions client
//!
//! This module implements the CompletionClient trait for the Mistral API.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use serde_json::{Value, json};

use crate::error::{CallError, ProviderError};
use crate::llm::client::{CHAT_COMPLETION, CompletionClient};
use crate::llm::http::{build_http_client, send_json};
use crate::llm::types::{CompletionRequest, CompletionResponse, FinishReason, Usage};

/// Mistral API base URL
const MISTRAL_API_URL: &str = "https://api.mistral.ai";

/// Default model to use
const DEFAULT_MODEL: &str = "mistral-large-latest";

/// Configuration for the Mistral client
#[derive(Debug, Clone)]
pub struct MistralConfig {
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for MistralConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            base_url: MISTRAL_API_URL.to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

impl MistralConfig {
    pub fn with_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }
}

/// Mistral API client
pub struct MistralClient {
    client: reqwest::Client,
    api_key: String,
    config: MistralConfig,
}

impl MistralClient {
    /// Create a client with an explicit API key
    pub fn with_api_key(api_key: String, config: MistralConfig) -> Result<Self, ProviderError> {
        let client = build_http_client(config.timeout).map_err(|e| ProviderError::new("client_init", e))?;
        Ok(Self {
            client,
            api_key,
            config,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    /// Build the request body for the chat-completions API
    fn build_request(&self, request: &CompletionRequest) -> Value {
        let model = request.model.as_deref().unwrap_or(&self.config.model);

        let messages: Vec<Value> = request
            .messages
            .iter()
            .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
            .collect();

        let mut body = json!({
            "model": model,
            "messages": messages,
            "temperature": request.temperature,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        body
    }

    /// Take the first choice's text content
    fn parse_response(&self, body: &Value) -> Result<CompletionResponse, CallError> {
        let choice = body["choices"]
            .as_array()
            .and_then(|choices| choices.first())
            .ok_or_else(|| CallError::InvalidResponse("response has no choices".to_string()))?;

        let content = choice["message"]["content"]
            .as_str()
            .ok_or_else(|| CallError::InvalidResponse("first choice has no text content".to_string()))?
            .to_string();

        let finish_reason = match choice["finish_reason"].as_str() {
            Some("stop") | None => FinishReason::Stop,
            Some("length") | Some("model_length") => FinishReason::Length,
            Some(_) => FinishReason::Other,
        };

        let usage = Usage::new(
            body["usage"]["prompt_tokens"].as_u64().unwrap_or(0),
            body["usage"]["completion_tokens"].as_u64().unwrap_or(0),
        );

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
            .bearer_auth(&self.api_key)
            .json(&body);
        let response = send_json(http, self.config.timeout).await?;
        self.parse_response(&response)
    }
}

#[async_trait]
impl CompletionClient for MistralClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        self.send(&request)
            .await
            .map_err(|e| ProviderError::new(CHAT_COMPLETION, e))
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

impl std::fmt::Debug for MistralClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MistralClient")
            .field("model", &self.config.model)
            .field("base_url", &self.config.base_url)
            .finish()
    }
}
