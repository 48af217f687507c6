//! Sub-agent - executes one sub-task, optionally with web search context

use std::sync::Arc;

use log::{debug, info, warn};

use crate::error::ProviderError;
use crate::llm::{CompletionClient, CompletionRequest, FinishReason, Message};
use crate::search::SearchClient;

/// Header of the block appended to a prompt with search snippets
pub const SEARCH_CONTEXT_HEADER: &str = "Additional Context from Web Search:";

const SYSTEM_PROMPT: &str = "You are a highly capable sub-agent that executes specific tasks with \
precision, creativity and attention to detail. Solve the given sub-task comprehensively and produce \
high-quality output.";

const CONTINUATION_NOTICE: &str = "This is a continuation of a previous task. Review the context and \
continue from where the last task left off.";

/// What happened to the optional search step
#[derive(Debug)]
pub enum SearchOutcome {
    NotRequested,
    /// Query present but search is disabled or has no credential
    Unavailable,
    Empty,
    Augmented { snippets: usize },
}

#[derive(Debug)]
pub struct SubAgentReply {
    pub output: String,
    pub finish_reason: FinishReason,
}

pub struct SubAgent {
    client: Arc<dyn CompletionClient>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    search: Option<Arc<dyn SearchClient>>,
    search_enabled: bool,
    max_results: usize,
}

impl SubAgent {
    pub fn new(client: Arc<dyn CompletionClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            temperature: crate::llm::DEFAULT_TEMPERATURE,
            max_tokens: None,
            search: None,
            search_enabled: false,
            max_results: 5,
        }
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: Option<u32>) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    /// Enable augmentation; a `None` client keeps it effectively off
    pub fn with_search(mut self, search: Option<Arc<dyn SearchClient>>, max_results: usize) -> Self {
        self.search = search;
        self.search_enabled = true;
        self.max_results = max_results;
        self
    }

    /// Append search snippets to `prompt`.
    ///
    /// A missing client or an empty result set leaves the prompt unchanged;
    /// a failed search call is an error.
    pub async fn augment(&self, prompt: &str, query: Option<&str>) -> Result<(String, SearchOutcome), ProviderError> {
        let Some(query) = query else {
            return Ok((prompt.to_string(), SearchOutcome::NotRequested));
        };

        let search = match &self.search {
            Some(search) if self.search_enabled => search,
            _ => {
                warn!("Search query {:?} present but web search is unavailable; skipping", query);
                return Ok((prompt.to_string(), SearchOutcome::Unavailable));
            }
        };

        let snippets = search.search(query, self.max_results).await?;
        if snippets.is_empty() {
            info!("Web search for {:?} returned no results", query);
            return Ok((prompt.to_string(), SearchOutcome::Empty));
        }

        info!("Web search for {:?} returned {} snippets", query, snippets.len());
        let augmented = format!("{}\n\n{}\n{}", prompt, SEARCH_CONTEXT_HEADER, snippets.join("\n"));
        Ok((augmented, SearchOutcome::Augmented {
            snippets: snippets.len(),
        }))
    }

    /// System persona, then continuation notice, then prior context, then the task
    pub fn build_messages(prompt: &str, prior_context: Option<&str>, continuation: bool) -> Vec<Message> {
        let mut messages = vec![Message::system(SYSTEM_PROMPT)];
        if continuation {
            messages.push(Message::user(CONTINUATION_NOTICE));
        }
        if let Some(context) = prior_context {
            messages.push(Message::user(format!("Previous task results:\n{}", context)));
        }
        messages.push(Message::user(prompt));
        messages
    }

    pub fn build_request(&self, prompt: &str, prior_context: Option<&str>, continuation: bool) -> CompletionRequest {
        CompletionRequest::new(Self::build_messages(prompt, prior_context, continuation))
            .with_model(self.model.clone())
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature)
    }

    /// One completion call on an already augmented prompt
    pub async fn respond(
        &self,
        prompt: &str,
        prior_context: Option<&str>,
        continuation: bool,
    ) -> Result<SubAgentReply, ProviderError> {
        let request = self.build_request(prompt, prior_context, continuation);
        debug!(
            "Sub-agent request: ~{} tokens, continuation={}",
            self.client.estimate_tokens(&request.text()),
            continuation
        );

        let response = self.client.complete(request).await?;
        info!(
            "Sub-agent responded ({} chars, {} tokens)",
            response.content.len(),
            response.usage.total()
        );

        Ok(SubAgentReply {
            output: response.content,
            finish_reason: response.finish_reason,
        })
    }
}
