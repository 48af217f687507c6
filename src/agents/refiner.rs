//! Refiner - folds every sub-task result into the final deliverable

use std::sync::Arc;

use log::info;

use crate::error::ProviderError;
use crate::llm::{CompletionClient, CompletionRequest, Message};
use crate::runner::SubTaskResult;

const SYSTEM_PROMPT: &str = "You are an expert editor who consolidates the work of several sub-agents \
into one coherent, complete deliverable.";

pub struct Refiner {
    client: Arc<dyn CompletionClient>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl Refiner {
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

    /// Every output is included verbatim and in order
    pub fn build_request(&self, objective: &str, history: &[SubTaskResult]) -> CompletionRequest {
        let results = history
            .iter()
            .map(|r| r.output.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let user = format!(
            "Objective: {objective}\n\nSub-task results:\n{results}\n\n\
Review the sub-task results and refine them into a single cohesive final output that fully satisfies \
the objective. Fill in any missing information or details, remove contradictions, and present the \
result as the finished deliverable."
        );

        CompletionRequest::new(vec![Message::system(SYSTEM_PROMPT), Message::user(user)])
            .with_model(self.model.clone())
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature)
    }

    /// Exactly one completion call
    pub async fn refine(&self, objective: &str, history: &[SubTaskResult]) -> Result<String, ProviderError> {
        let request = self.build_request(objective, history);
        info!("Refining {} sub-task results", history.len());
        let response = self.client.complete(request).await?;
        Ok(response.content)
    }
}
