//! Run events - every external call and extraction outcome is reported here

use std::sync::Mutex;
use std::time::Duration;

use log::{error, info, warn};

/// Why the loop stopped iterating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionReason {
    /// The orchestrator emitted the completion marker
    Marker,
    /// The iteration cap was reached first
    IterationCap,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    RunStarted {
        run_id: String,
        max_iterations: u32,
        search_enabled: bool,
    },
    /// Search was requested but cannot be used this run
    SearchDisabled { reason: String },
    OrchestratorResponded { iteration: u32, text: String },
    QueryExtracted { iteration: u32, query: String },
    QueryMissing { iteration: u32 },
    QueryExtractionFailed { iteration: u32, error: String },
    SearchPerformed { iteration: u32, snippets: usize },
    SearchSkipped { iteration: u32, reason: String },
    SubAgentResponded { iteration: u32, output: String },
    /// Output hit the token limit; a continuation call follows
    SubAgentTruncated { iteration: u32 },
    RetryScheduled {
        operation: String,
        attempt: u32,
        delay: Duration,
        error: String,
    },
    Completed { reason: CompletionReason, iterations: u32 },
    Refined { output: String },
    Aborted { reason: String, results: usize },
}

/// Receives run events as they happen
pub trait RunObserver: Send + Sync {
    fn on_event(&self, event: &RunEvent);
}

/// Writes every event to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl RunObserver for LogObserver {
    fn on_event(&self, event: &RunEvent) {
        match event {
            RunEvent::RunStarted {
                run_id,
                max_iterations,
                search_enabled,
            } => info!(
                "Run {} started (max {} iterations, search {})",
                run_id,
                max_iterations,
                if *search_enabled { "on" } else { "off" }
            ),
            RunEvent::SearchDisabled { reason } => warn!("Web search disabled: {}", reason),
            RunEvent::OrchestratorResponded { iteration, text } => {
                info!("[{}] orchestrator: {} chars", iteration, text.len())
            }
            RunEvent::QueryExtracted { iteration, query } => info!("[{}] search query: {}", iteration, query),
            RunEvent::QueryMissing { iteration } => info!("[{}] no search query requested", iteration),
            RunEvent::QueryExtractionFailed { iteration, error } => {
                warn!("[{}] search query extraction skipped: {}", iteration, error)
            }
            RunEvent::SearchPerformed { iteration, snippets } => {
                info!("[{}] web search added {} snippets", iteration, snippets)
            }
            RunEvent::SearchSkipped { iteration, reason } => warn!("[{}] web search skipped: {}", iteration, reason),
            RunEvent::SubAgentResponded { iteration, output } => {
                info!("[{}] sub-agent: {} chars", iteration, output.len())
            }
            RunEvent::SubAgentTruncated { iteration } => {
                warn!("[{}] sub-agent output truncated, requesting continuation", iteration)
            }
            RunEvent::RetryScheduled {
                operation,
                attempt,
                delay,
                error,
            } => warn!("{} attempt {} failed ({}); retrying in {:?}", operation, attempt, error, delay),
            RunEvent::Completed { reason, iterations } => {
                info!("Loop complete after {} iterations ({:?})", iterations, reason)
            }
            RunEvent::Refined { output } => info!("Refiner produced {} chars", output.len()),
            RunEvent::Aborted { reason, results } => {
                error!("Run aborted with {} results kept: {}", results, reason)
            }
        }
    }
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<RunEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RunEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl RunObserver for EventLog {
    fn on_event(&self, event: &RunEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

/// Forwards each event to several observers
pub struct Fanout(pub Vec<std::sync::Arc<dyn RunObserver>>);

impl RunObserver for Fanout {
    fn on_event(&self, event: &RunEvent) {
        for observer in &self.0 {
            observer.on_event(event);
        }
    }
}
