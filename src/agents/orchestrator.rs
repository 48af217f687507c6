//! Orchestrator - picks the next sub-task or declares the objective met

use std::sync::Arc;

use log::{debug, info, warn};

use super::extract::{self, COMPLETION_MARKER};
use crate::error::{ExtractionError, ProviderError};
use crate::llm::{CompletionClient, CompletionRequest, Message};
use crate::runner::SubTaskResult;

/// Stands in for the history block before any sub-task has run
pub const EMPTY_HISTORY: &str = "None";

const SYSTEM_PROMPT: &str = "You are a meticulous planning assistant. Your job is to break a complex \
objective into focused, manageable sub-tasks and to reason step by step. Whenever code is involved, \
validate it for errors, suggest improvements and check it against best practices before moving on.";

const SEARCH_INSTRUCTION: &str = "Also produce a JSON object with a single \"search_query\" key holding one \
specific question that, asked on the web, would surface information needed for the next sub-task. \
Use exactly this form:\n{\"search_query\": \"<question>\"}\n";

/// Outcome of looking for a search query in the response
#[derive(Debug)]
pub enum QueryExtraction {
    /// Search was not requested this run
    Disabled,
    NotFound,
    Found,
    /// Malformed JSON; reported and ignored
    Failed(ExtractionError),
}

/// One orchestrator decision
#[derive(Debug)]
pub struct OrchestratorStep {
    /// Next sub-task prompt, or the completion text when the marker is present
    pub text: String,
    /// The file content this call was given, handed back for the sub-agent
    pub file_content: Option<String>,
    pub search_query: Option<String>,
    pub extraction: QueryExtraction,
}

impl OrchestratorStep {
    pub fn is_complete(&self) -> bool {
        extract::is_complete(&self.text)
    }

    /// Text after the completion marker, if the marker is present
    pub fn remainder(&self) -> Option<&str> {
        extract::completion_remainder(&self.text)
    }
}

pub struct Orchestrator {
    client: Arc<dyn CompletionClient>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl Orchestrator {
    pub fn new(client: Arc<dyn CompletionClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            temperature: crate::llm::DEFAULT_TEMPERATURE,
            max_tokens: None,
        }
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: Option<u32>) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    /// Prior outputs joined in execution order, or the "None" sentinel
    pub fn render_previous_results(history: &[SubTaskResult]) -> String {
        if history.is_empty() {
            EMPTY_HISTORY.to_string()
        } else {
            history
                .iter()
                .map(|r| r.output.as_str())
                .collect::<Vec<_>>()
                .join("\n")
        }
    }

    pub fn build_request(
        &self,
        objective: &str,
        file_content: Option<&str>,
        history: &[SubTaskResult],
        use_search: bool,
    ) -> CompletionRequest {
        let subject = if file_content.is_some() {
            "objective and file content"
        } else {
            "objective"
        };

        let mut user = format!(
            "Based on the following {subject} and the results of any previous sub-tasks, decide the next \
sub-task and write a concise, detailed prompt a sub-agent can execute on its own. When the work involves \
code, review it for bugs and include any fixes or improvements in the next sub-task prompt. \
Assess whether the objective has been fully achieved: if the previous results cover every aspect of it, \
begin your response with the phrase '{COMPLETION_MARKER}'. Otherwise describe the next sub-task.\n\n\
Objective: {objective}"
        );

        if let Some(content) = file_content {
            user.push_str("\nFile content:\n");
            user.push_str(content);
        }

        user.push_str("\n\nPrevious sub-task results:\n");
        user.push_str(&Self::render_previous_results(history));

        let mut request = CompletionRequest::new(vec![Message::system(SYSTEM_PROMPT), Message::user(user)])
            .with_model(self.model.clone())
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature);

        if use_search {
            request = request.with_message(Message::user(SEARCH_INSTRUCTION));
        }

        request
    }

    /// Ask for the next sub-task. Extraction problems never fail the call.
    pub async fn next_step(
        &self,
        objective: &str,
        file_content: Option<&str>,
        history: &[SubTaskResult],
        use_search: bool,
    ) -> Result<OrchestratorStep, ProviderError> {
        let request = self.build_request(objective, file_content, history, use_search);
        debug!(
            "Orchestrator request: ~{} tokens, {} prior results",
            self.client.estimate_tokens(&request.text()),
            history.len()
        );

        let response = self.client.complete(request).await?;
        info!("Orchestrator responded ({} chars)", response.content.len());

        let mut text = response.content;
        let mut search_query = None;
        let extraction = if !use_search {
            QueryExtraction::Disabled
        } else {
            match extract::extract_search_query(&text) {
                Ok(Some(found)) => {
                    info!("Search query extracted: {}", found.query);
                    search_query = Some(found.query);
                    text = found.remaining;
                    QueryExtraction::Found
                }
                Ok(None) => {
                    info!("No search query in orchestrator response");
                    QueryExtraction::NotFound
                }
                Err(e) => {
                    warn!("Skipping search query extraction: {}", e);
                    QueryExtraction::Failed(e)
                }
            }
        };

        Ok(OrchestratorStep {
            text,
            file_content: file_content.map(str::to_string),
            search_query,
            extraction,
        })
    }
}
