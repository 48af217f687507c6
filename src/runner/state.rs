//! Per-run state owned by the loop controller

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Lifecycle of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopStatus {
    Running,
    Complete,
    Aborted,
}

impl LoopStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, LoopStatus::Running)
    }
}

impl std::fmt::Display for LoopStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LoopStatus::Running => "RUNNING",
            LoopStatus::Complete => "COMPLETE",
            LoopStatus::Aborted => "ABORTED",
        };
        write!(f, "{}", s)
    }
}

/// One executed sub-task. `index` is 1-based execution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubTaskResult {
    pub index: usize,
    pub prompt: String,
    pub output: String,
}

impl SubTaskResult {
    pub fn new(index: usize, prompt: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            index,
            prompt: prompt.into(),
            output: output.into(),
        }
    }
}

/// Why a run stopped without a final artifact
#[derive(Debug)]
pub enum AbortReason {
    Provider(ProviderError),
    Cancelled,
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AbortReason::Provider(e) => write!(f, "{}", e),
            AbortReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl From<ProviderError> for AbortReason {
    fn from(e: ProviderError) -> Self {
        AbortReason::Provider(e)
    }
}

#[derive(Debug, Clone)]
pub struct LoopState {
    pub objective: String,
    pub file_content: Option<String>,
    pub results: Vec<SubTaskResult>,
    pub status: LoopStatus,
    pub iteration_count: u32,
}

impl LoopState {
    pub fn new(objective: impl Into<String>, file_content: Option<String>) -> Self {
        Self {
            objective: objective.into(),
            file_content,
            results: Vec::new(),
            status: LoopStatus::Running,
            iteration_count: 0,
        }
    }

    /// Append-only; the index is assigned here
    pub fn push_result(&mut self, prompt: impl Into<String>, output: impl Into<String>) -> &SubTaskResult {
        let index = self.results.len() + 1;
        self.results.push(SubTaskResult::new(index, prompt, output));
        &self.results[index - 1]
    }

    pub fn complete(&mut self) {
        self.transition(LoopStatus::Complete);
    }

    pub fn abort(&mut self) {
        self.transition(LoopStatus::Aborted);
    }

    fn transition(&mut self, to: LoopStatus) {
        if self.status.is_terminal() {
            log::warn!("Ignoring transition {} -> {}", self.status, to);
            return;
        }
        self.status = to;
    }

    /// Prior sub-tasks as `Task N` / `Result` blocks for sub-agent context
    pub fn render_history(&self) -> String {
        self.results
            .iter()
            .map(|r| format!("Task {}: {}\nResult: {}", r.index, r.prompt, r.output))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
