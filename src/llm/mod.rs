//! Completion client layer
//!
//! This module provides:
//! - Message types for LLM communication
//! - CompletionClient trait for backend abstraction
//! - Mistral and Anthropic implementations
//! - ScriptedClient for tests and dry runs

pub mod anthropic;
pub mod client;
mod http;
pub mod mistral;
pub mod mock;
pub mod types;

use std::sync::Arc;

pub use anthropic::{AnthropicClient, AnthropicConfig};
pub use client::{CHAT_COMPLETION, CompletionClient};
pub use mistral::{MistralClient, MistralConfig};
pub use mock::{ScriptStep, ScriptedClient};
pub use types::{CompletionRequest, CompletionResponse, DEFAULT_TEMPERATURE, FinishReason, Message, Role, Usage};

pub(crate) use http::{build_http_client, send_json};

use crate::config::{LlmConfig, ProviderKind};
use crate::error::{Result, TasksmithError};

/// Build the configured backend. Role-specific models travel on each request;
/// `default_model` only covers requests that name none.
pub fn build_client(config: &LlmConfig, api_key: &str, default_model: &str) -> Result<Arc<dyn CompletionClient>> {
    let client: Arc<dyn CompletionClient> = match config.provider {
        ProviderKind::Mistral => {
            let mut mistral = MistralConfig::with_model(default_model);
            mistral.timeout = config.timeout();
            if let Some(base_url) = &config.base_url {
                mistral.base_url = base_url.clone();
            }
            Arc::new(MistralClient::with_api_key(api_key.to_string(), mistral).map_err(TasksmithError::from)?)
        }
        ProviderKind::Anthropic => {
            let mut anthropic = AnthropicConfig::with_model(default_model);
            anthropic.timeout = config.timeout();
            if let Some(base_url) = &config.base_url {
                anthropic.base_url = base_url.clone();
            }
            if let Some(max_tokens) = config.max_tokens {
                anthropic.max_tokens = max_tokens;
            }
            Arc::new(AnthropicClient::with_api_key(api_key.to_string(), anthropic).map_err(TasksmithError::from)?)
        }
    };
    log::info!("Using {:?} backend, default model {}", config.provider, client.model());
    Ok(client)
}
