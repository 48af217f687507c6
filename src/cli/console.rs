//! Colored progress lines on stdout

use colored::*;
use tasksmith::runner::{CompletionReason, RunEvent, RunObserver};

const PREVIEW_CHARS: usize = 120;

/// Prints a line per run event. Verbose mode adds response previews.
#[derive(Debug, Default)]
pub struct ConsoleObserver {
    verbose: bool,
}

impl ConsoleObserver {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// One line, at most `PREVIEW_CHARS` characters
    fn preview(text: &str) -> String {
        let line = text.lines().find(|l| !l.trim().is_empty()).unwrap_or("").trim();
        if line.chars().count() > PREVIEW_CHARS {
            let cut: String = line.chars().take(PREVIEW_CHARS).collect();
            format!("{}...", cut)
        } else {
            line.to_string()
        }
    }

    fn render(&self, event: &RunEvent) -> Option<String> {
        let line = match event {
            RunEvent::RunStarted {
                run_id,
                max_iterations,
                search_enabled,
            } => format!(
                "{} {} (max {} iterations{})",
                "Starting run".cyan(),
                run_id,
                max_iterations,
                if *search_enabled { ", web search on" } else { "" }
            ),
            RunEvent::SearchDisabled { reason } => format!("{} {}", "Web search disabled:".yellow(), reason),
            RunEvent::OrchestratorResponded { iteration, text } => {
                let mut line = format!("{} orchestrator responded", format!("[{}]", iteration).bold());
                if self.verbose {
                    line.push_str(&format!("\n    {}", Self::preview(text).dimmed()));
                }
                line
            }
            RunEvent::QueryExtracted { iteration, query } => {
                format!("{} search query: {}", format!("[{}]", iteration).bold(), query.cyan())
            }
            RunEvent::QueryMissing { .. } => return None,
            RunEvent::QueryExtractionFailed { iteration, error } => format!(
                "{} {} {}",
                format!("[{}]", iteration).bold(),
                "could not read search query:".yellow(),
                error
            ),
            RunEvent::SearchPerformed { iteration, snippets } => {
                format!("{} web search added {} snippets", format!("[{}]", iteration).bold(), snippets)
            }
            RunEvent::SearchSkipped { iteration, reason } => format!(
                "{} {} {}",
                format!("[{}]", iteration).bold(),
                "web search skipped:".yellow(),
                reason
            ),
            RunEvent::SubAgentResponded { iteration, output } => {
                let mut line = format!("{} {}", format!("[{}]", iteration).bold(), "sub-task done".green());
                if self.verbose {
                    line.push_str(&format!("\n    {}", Self::preview(output).dimmed()));
                }
                line
            }
            RunEvent::SubAgentTruncated { iteration } => format!(
                "{} {}",
                format!("[{}]", iteration).bold(),
                "output truncated, continuing".yellow()
            ),
            RunEvent::RetryScheduled {
                operation,
                attempt,
                delay,
                error,
            } => format!(
                "{} {} attempt {} failed ({}); retrying in {:.1}s",
                "Retry:".yellow(),
                operation,
                attempt,
                error,
                delay.as_secs_f64()
            ),
            RunEvent::Completed { reason, iterations } => match reason {
                CompletionReason::Marker => format!("{} after {} iterations", "Objective complete".green(), iterations),
                CompletionReason::IterationCap => format!(
                    "{} ({} iterations), refining what we have",
                    "Iteration cap reached".yellow(),
                    iterations
                ),
            },
            RunEvent::Refined { .. } => "Refined final output ready".green().to_string(),
            RunEvent::Aborted { reason, results } => format!(
                "{} {} ({} sub-task results kept)",
                "Run aborted:".red(),
                reason,
                results
            ),
        };
        Some(line)
    }
}

impl RunObserver for ConsoleObserver {
    fn on_event(&self, event: &RunEvent) {
        if let Some(line) = self.render(event) {
            println!("{}", line);
        }
    }
}
