//! Loop controller - drives orchestrator and sub-agent until completion,
//! then hands the full history to the refiner.
//!
//! Each iteration:
//! 1. Orchestrator sees the objective and every prior result
//! 2. If it opens with the completion marker, stop iterating
//! 3. Otherwise the sub-agent runs the returned prompt (search first, if asked)
//! 4. The result is appended to the history
//!
//! Iterations are strictly sequential. The cap bounds orchestrator calls.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::events::{CompletionReason, LogObserver, RunEvent, RunObserver};
use super::retry::{RetryPolicy, with_retry};
use super::state::{AbortReason, LoopState, LoopStatus, SubTaskResult};
use crate::agents::{Orchestrator, QueryExtraction, Refiner, SearchOutcome, SubAgent};
use crate::config::{Config, Credentials, FileContentPolicy, RemainderPolicy};
use crate::error::Result;
use crate::id::generate_run_id;
use crate::llm::{CompletionClient, build_client};
use crate::search::{SearchClient, build_search_client};

/// Behavior knobs for a controller
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub max_iterations: u32,
    pub file_content: FileContentPolicy,
    pub on_complete_remainder: RemainderPolicy,
    pub continue_truncated: bool,
    pub share_history: bool,
    /// Ask the orchestrator for search queries
    pub use_search: bool,
    /// Search was asked for, whether or not it is usable
    pub search_requested: bool,
    pub retry: RetryPolicy,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            file_content: FileContentPolicy::default(),
            on_complete_remainder: RemainderPolicy::default(),
            continue_truncated: true,
            share_history: true,
            use_search: false,
            search_requested: false,
            retry: RetryPolicy::default(),
        }
    }
}

impl ControllerConfig {
    pub fn from_config(config: &Config, use_search: bool) -> Self {
        Self {
            max_iterations: config.run.max_iterations.max(1),
            file_content: config.run.file_content,
            on_complete_remainder: config.run.on_complete_remainder,
            continue_truncated: config.run.continue_truncated,
            share_history: config.run.share_history,
            use_search,
            search_requested: use_search,
            retry: RetryPolicy::from_config(&config.retry),
        }
    }
}

#[derive(Debug)]
pub struct CompletedRun {
    pub run_id: String,
    pub objective: String,
    pub final_output: String,
    pub history: Vec<SubTaskResult>,
    pub iterations: u32,
    pub reason: CompletionReason,
    /// Orchestrator text after the completion marker, if any
    pub remainder: Option<String>,
}

#[derive(Debug)]
pub struct AbortedRun {
    pub run_id: String,
    pub objective: String,
    /// Everything accumulated before the abort
    pub history: Vec<SubTaskResult>,
    pub iterations: u32,
    pub reason: AbortReason,
}

/// Outcome of a run
#[derive(Debug)]
pub enum RunOutcome {
    Complete(CompletedRun),
    Aborted(AbortedRun),
}

impl RunOutcome {
    pub fn status(&self) -> LoopStatus {
        match self {
            RunOutcome::Complete(_) => LoopStatus::Complete,
            RunOutcome::Aborted(_) => LoopStatus::Aborted,
        }
    }

    pub fn history(&self) -> &[SubTaskResult] {
        match self {
            RunOutcome::Complete(run) => &run.history,
            RunOutcome::Aborted(run) => &run.history,
        }
    }

    pub fn run_id(&self) -> &str {
        match self {
            RunOutcome::Complete(run) => &run.run_id,
            RunOutcome::Aborted(run) => &run.run_id,
        }
    }
}

pub struct LoopController {
    orchestrator: Orchestrator,
    sub_agent: SubAgent,
    refiner: Refiner,
    config: ControllerConfig,
    observer: Arc<dyn RunObserver>,
}

impl LoopController {
    pub fn new(orchestrator: Orchestrator, sub_agent: SubAgent, refiner: Refiner, config: ControllerConfig) -> Self {
        Self {
            orchestrator,
            sub_agent,
            refiner,
            config,
            observer: Arc::new(LogObserver),
        }
    }

    /// Build all three roles over one completion client
    pub fn with_clients(
        client: Arc<dyn CompletionClient>,
        search: Option<Arc<dyn SearchClient>>,
        app: &Config,
        config: ControllerConfig,
    ) -> Self {
        let provider = app.llm.provider;
        let (temperature, max_tokens) = (app.llm.temperature, app.llm.max_tokens);

        let orchestrator = Orchestrator::new(client.clone(), app.models.orchestrator_model(provider))
            .with_sampling(temperature, max_tokens);
        let mut sub_agent =
            SubAgent::new(client.clone(), app.models.sub_agent_model(provider)).with_sampling(temperature, max_tokens);
        if config.use_search {
            sub_agent = sub_agent.with_search(search, app.search.max_results);
        }
        let refiner = Refiner::new(client, app.models.refiner_model(provider)).with_sampling(temperature, max_tokens);

        Self::new(orchestrator, sub_agent, refiner, config)
    }

    /// Wire real backends from config and resolved credentials.
    ///
    /// `want_search` is the caller's request; it only takes effect when a
    /// search key was resolved.
    pub fn from_config(app: &Config, credentials: &Credentials, want_search: bool) -> Result<Self> {
        let default_model = app.models.orchestrator_model(app.llm.provider);
        let client = build_client(&app.llm, &credentials.llm_api_key, &default_model)?;

        let search = if want_search {
            build_search_client(&app.search, credentials.search_api_key.as_deref())
        } else {
            None
        };
        let config = ControllerConfig {
            search_requested: want_search,
            ..ControllerConfig::from_config(app, search.is_some())
        };

        Ok(Self::with_clients(client, search, app, config))
    }

    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub async fn run(&self, objective: &str, file_content: Option<String>) -> RunOutcome {
        self.run_with_cancel(objective, file_content, &CancellationToken::new())
            .await
    }

    /// Run to completion. Cancellation is checked before every backend call.
    pub async fn run_with_cancel(
        &self,
        objective: &str,
        file_content: Option<String>,
        cancel: &CancellationToken,
    ) -> RunOutcome {
        let run_id = generate_run_id(objective);
        let mut state = LoopState::new(objective, file_content);

        self.observer.on_event(&RunEvent::RunStarted {
            run_id: run_id.clone(),
            max_iterations: self.config.max_iterations,
            search_enabled: self.config.use_search,
        });
        if self.config.search_requested && !self.config.use_search {
            self.observer.on_event(&RunEvent::SearchDisabled {
                reason: "no search credential configured".to_string(),
            });
        }

        let (reason, remainder) = match self.iterate(&mut state, cancel).await {
            Ok(done) => done,
            Err(reason) => return self.abort(run_id, state, reason),
        };

        self.observer.on_event(&RunEvent::Completed {
            reason,
            iterations: state.iteration_count,
        });

        let refined = with_retry(&self.config.retry, "refiner", cancel, self.observer.as_ref(), || {
            self.refiner.refine(&state.objective, &state.results)
        })
        .await;

        match refined {
            Ok(final_output) => {
                state.complete();
                self.observer.on_event(&RunEvent::Refined {
                    output: final_output.clone(),
                });
                RunOutcome::Complete(CompletedRun {
                    run_id,
                    objective: state.objective,
                    final_output,
                    history: state.results,
                    iterations: state.iteration_count,
                    reason,
                    remainder,
                })
            }
            Err(reason) => self.abort(run_id, state, reason),
        }
    }

    /// Orchestrator/sub-agent rounds until the marker or the cap
    async fn iterate(
        &self,
        state: &mut LoopState,
        cancel: &CancellationToken,
    ) -> std::result::Result<(CompletionReason, Option<String>), AbortReason> {
        let use_search = self.config.use_search;

        while state.iteration_count < self.config.max_iterations {
            if cancel.is_cancelled() {
                return Err(AbortReason::Cancelled);
            }
            state.iteration_count += 1;
            let iteration = state.iteration_count;

            let file_content = match self.config.file_content {
                FileContentPolicy::FirstCall if iteration > 1 => None,
                _ => state.file_content.as_deref(),
            };

            let step = with_retry(&self.config.retry, "orchestrator", cancel, self.observer.as_ref(), || {
                self.orchestrator
                    .next_step(&state.objective, file_content, &state.results, use_search)
            })
            .await?;

            self.observer.on_event(&RunEvent::OrchestratorResponded {
                iteration,
                text: step.text.clone(),
            });
            self.report_extraction(iteration, &step.extraction, step.search_query.as_deref());

            if step.is_complete() {
                let remainder = step.remainder().filter(|r| !r.is_empty()).map(str::to_string);
                if let (RemainderPolicy::Execute, Some(final_task)) = (self.config.on_complete_remainder, &remainder) {
                    self.execute_sub_task(state, iteration, final_task.clone(), None, cancel)
                        .await?;
                }
                return Ok((CompletionReason::Marker, remainder));
            }

            let mut prompt = step.text;
            if state.results.is_empty()
                && let Some(content) = &step.file_content
            {
                prompt = format!("{}\n\nFile content:\n{}", prompt, content);
            }

            self.execute_sub_task(state, iteration, prompt, step.search_query, cancel)
                .await?;
        }

        Ok((CompletionReason::IterationCap, None))
    }

    async fn execute_sub_task(
        &self,
        state: &mut LoopState,
        iteration: u32,
        prompt: String,
        search_query: Option<String>,
        cancel: &CancellationToken,
    ) -> std::result::Result<(), AbortReason> {
        if cancel.is_cancelled() {
            return Err(AbortReason::Cancelled);
        }

        let prior = (self.config.share_history && !state.results.is_empty()).then(|| state.render_history());

        // Search runs once; only the completion call is retried after it
        let (augmented, search) = with_retry(&self.config.retry, "search", cancel, self.observer.as_ref(), || {
            self.sub_agent.augment(&prompt, search_query.as_deref())
        })
        .await?;
        self.report_search(iteration, &search);

        if cancel.is_cancelled() {
            return Err(AbortReason::Cancelled);
        }
        let reply = with_retry(&self.config.retry, "sub_agent", cancel, self.observer.as_ref(), || {
            self.sub_agent.respond(&augmented, prior.as_deref(), false)
        })
        .await?;

        let mut output = reply.output;
        if self.config.continue_truncated && reply.finish_reason.is_truncated() {
            self.observer.on_event(&RunEvent::SubAgentTruncated { iteration });
            let context = match &prior {
                Some(history) => format!("{}\n\nPartial output so far:\n{}", history, output),
                None => format!("Partial output so far:\n{}", output),
            };
            let more = with_retry(&self.config.retry, "sub_agent", cancel, self.observer.as_ref(), || {
                self.sub_agent.respond(&prompt, Some(&context), true)
            })
            .await?;
            output.push_str(&more.output);
        }

        self.observer.on_event(&RunEvent::SubAgentResponded {
            iteration,
            output: output.clone(),
        });
        state.push_result(prompt, output);
        Ok(())
    }

    fn report_extraction(&self, iteration: u32, extraction: &QueryExtraction, query: Option<&str>) {
        let event = match (extraction, query) {
            (QueryExtraction::Disabled, _) => return,
            (QueryExtraction::Found, Some(query)) => RunEvent::QueryExtracted {
                iteration,
                query: query.to_string(),
            },
            (QueryExtraction::Failed(e), _) => RunEvent::QueryExtractionFailed {
                iteration,
                error: e.to_string(),
            },
            _ => RunEvent::QueryMissing { iteration },
        };
        self.observer.on_event(&event);
    }

    fn report_search(&self, iteration: u32, outcome: &SearchOutcome) {
        let event = match outcome {
            SearchOutcome::NotRequested => return,
            SearchOutcome::Augmented { snippets } => RunEvent::SearchPerformed {
                iteration,
                snippets: *snippets,
            },
            SearchOutcome::Unavailable => RunEvent::SearchSkipped {
                iteration,
                reason: "no search credential configured".to_string(),
            },
            SearchOutcome::Empty => RunEvent::SearchSkipped {
                iteration,
                reason: "search returned no results".to_string(),
            },
        };
        self.observer.on_event(&event);
    }

    fn abort(&self, run_id: String, mut state: LoopState, reason: AbortReason) -> RunOutcome {
        state.abort();
        self.observer.on_event(&RunEvent::Aborted {
            reason: reason.to_string(),
            results: state.results.len(),
        });
        RunOutcome::Aborted(AbortedRun {
            run_id,
            objective: state.objective,
            history: state.results,
            iterations: state.iteration_count,
            reason,
        })
    }
}
