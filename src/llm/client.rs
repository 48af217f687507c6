//! Completion client capability trait

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::llm::types::{CompletionRequest, CompletionResponse, Message};

/// Operation name attached to failures of `complete`
pub const CHAT_COMPLETION: &str = "chat_completion";

/// Stateless completion client - each call is independent.
///
/// Any backend must turn role-tagged messages into text. Token estimation
/// has a rough default that backends may override.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Single completion request; every failure surfaces as a `ProviderError`
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError>;

    /// Model used when a request does not name one
    fn model(&self) -> &str;

    /// Wrap a bare prompt as a single user message
    async fn generate_text(
        &self,
        prompt: &str,
        max_tokens: Option<u32>,
        temperature: f32,
    ) -> Result<String, ProviderError> {
        let request = CompletionRequest::new(vec![Message::user(prompt)])
            .with_max_tokens(max_tokens)
            .with_temperature(temperature);
        Ok(self.complete(request).await?.content)
    }

    /// Rough token estimate (~4 characters per token)
    fn estimate_tokens(&self, text: &str) -> usize {
        text.len() / 4
    }
}
