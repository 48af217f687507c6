//! Final artifact and exchange log writers.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::config::OutputConfig;
use crate::error::Result;
use crate::runner::{RunOutcome, SubTaskResult};

/// What happened to the exchange log of a run
#[derive(Debug, PartialEq, Eq)]
pub enum ExchangeLog {
    Disabled,
    Written(PathBuf),
    /// Write failed; carries the error text
    Failed(String),
}

/// Write the refined output to `dest`, or to stdout when no path is given.
pub fn write_final(output: &str, dest: Option<&Path>) -> Result<()> {
    match dest {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, output)?;
            info!("Final output written to {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", output)?;
        }
    }
    Ok(())
}

fn push_history(doc: &mut String, history: &[SubTaskResult]) {
    for result in history {
        doc.push_str(&format!(
            "## Task {}\n\n**Prompt:**\n\n{}\n\n**Result:**\n\n{}\n\n",
            result.index, result.prompt, result.output
        ));
    }
}

/// Markdown record of one run: objective, every sub-task in order, then
/// the refined output or the abort reason.
pub fn render_exchange_log(outcome: &RunOutcome) -> String {
    let mut doc = String::new();
    match outcome {
        RunOutcome::Complete(run) => {
            doc.push_str(&format!("# Objective\n\n{}\n\n", run.objective));
            push_history(&mut doc, &run.history);
            doc.push_str(&format!("# Refined Final Output\n\n{}\n", run.final_output));
        }
        RunOutcome::Aborted(run) => {
            doc.push_str(&format!("# Objective\n\n{}\n\n", run.objective));
            push_history(&mut doc, &run.history);
            doc.push_str(&format!("# Aborted\n\n{}\n", run.reason));
        }
    }
    doc
}

/// Path of the exchange log for a run inside `dir`
pub fn exchange_log_path(dir: &Path, run_id: &str) -> PathBuf {
    dir.join(format!("{}.md", run_id))
}

/// Write the exchange log as `<dir>/<run id>.md` and return its path
pub fn write_exchange_log(dir: &Path, outcome: &RunOutcome) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = exchange_log_path(dir, outcome.run_id());
    fs::write(&path, render_exchange_log(outcome))?;
    info!("Exchange log written to {}", path.display());
    Ok(path)
}

/// Write everything a finished run produces.
///
/// The final output goes first and its failure is an error. The exchange log
/// follows; failing to write it is only reported.
pub fn publish(outcome: &RunOutcome, dest: Option<&Path>, output: &OutputConfig) -> Result<ExchangeLog> {
    if let RunOutcome::Complete(run) = outcome {
        write_final(&run.final_output, dest)?;
    }

    if !output.exchange_log {
        return Ok(ExchangeLog::Disabled);
    }
    match write_exchange_log(&output.directory, outcome) {
        Ok(path) => Ok(ExchangeLog::Written(path)),
        Err(e) => {
            warn!("Failed to write exchange log to {}: {}", output.directory.display(), e);
            Ok(ExchangeLog::Failed(e.to_string()))
        }
    }
}
