//! End-to-end run tests
//!
//! Drives the public API with scripted completion and search backends.

use std::sync::Arc;

use tasksmith::artifact;
use tasksmith::config::{Config, Credentials};
use tasksmith::error::{Result, TasksmithError};
use tasksmith::llm::{CompletionResponse, ScriptedClient};
use tasksmith::runner::{
    AbortReason, CompletionReason, ControllerConfig, EventLog, LoopController, LoopStatus, RetryPolicy, RunEvent,
    RunOutcome,
};
use tasksmith::search::{SearchClient, StaticSearch};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn quick_config(max_iterations: u32) -> ControllerConfig {
    ControllerConfig {
        max_iterations,
        retry: RetryPolicy::none(),
        ..Default::default()
    }
}

fn controller(client: Arc<ScriptedClient>, config: ControllerConfig) -> LoopController {
    LoopController::with_clients(client, None, &Config::default(), config)
}

/// Integration test: a full run writes both the final output and the exchange log
#[tokio::test]
async fn test_full_run_writes_artifacts() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let client = Arc::new(ScriptedClient::new(vec![
        "Outline the module",
        "outline",
        "Implement the module",
        "implementation",
        "The task is complete: all done",
        "final module",
    ]));

    let outcome = controller(client, quick_config(5))
        .run("Build a module", Some("existing notes".to_string()))
        .await;

    let log_path = artifact::write_exchange_log(temp_dir.path(), &outcome)?;
    let RunOutcome::Complete(run) = outcome else {
        panic!("expected completion");
    };
    let final_path = temp_dir.path().join("final.md");
    artifact::write_final(&run.final_output, Some(&final_path))?;

    assert_eq!(std::fs::read_to_string(&final_path)?, "final module");
    let log = std::fs::read_to_string(&log_path)?;
    assert!(log.contains("Outline the module\n\nFile content:\nexisting notes"));
    assert!(log.contains("**Result:**\n\nimplementation"));
    assert!(log.contains("# Refined Final Output\n\nfinal module"));
    let file_name = log_path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(file_name.ends_with(".md"));
    assert!(file_name.contains("_build-a-module_"));
    Ok(())
}

/// Integration test: a cap of one allows exactly one orchestrator call
#[tokio::test]
async fn test_cap_of_one() {
    let client = Arc::new(ScriptedClient::new(vec!["Only step", "only output", "refined"]));
    let outcome = controller(client.clone(), quick_config(1)).run("Objective", None).await;

    let RunOutcome::Complete(run) = outcome else {
        panic!("expected completion");
    };
    assert_eq!(run.reason, CompletionReason::IterationCap);
    assert_eq!(run.history.len(), 1);
    assert_eq!(client.call_count(), 3);
}

/// Integration test: independent runs share nothing
#[tokio::test]
async fn test_concurrent_runs_are_isolated() {
    let first = Arc::new(ScriptedClient::new(vec!["A step", "A output", "The task is complete: A", "A final"]));
    let second = Arc::new(ScriptedClient::new(vec![
        "B step one",
        "B output one",
        "B step two",
        "B output two",
        "The task is complete: B",
        "B final",
    ]));
    let a = controller(first, quick_config(5));
    let b = controller(second, quick_config(5));

    let (out_a, out_b) = tokio::join!(a.run("Objective A", None), b.run("Objective B", None));

    assert_eq!(out_a.history().len(), 1);
    assert_eq!(out_b.history().len(), 2);
    assert!(out_a.history().iter().all(|r| r.output.starts_with('A')));
    assert!(out_b.history().iter().all(|r| r.output.starts_with('B')));
}

/// Integration test: cancelling mid-run keeps the work done so far
#[tokio::test]
async fn test_cancel_mid_run() {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let client = Arc::new(ScriptedClient::from_fn(move |request| {
        let last = &request.messages[request.messages.len() - 1].content;
        if last.contains("Previous sub-task results") {
            Ok(CompletionResponse::text("Next step"))
        } else {
            trigger.cancel();
            Ok(CompletionResponse::text("step output"))
        }
    }));

    let outcome = controller(client.clone(), quick_config(5))
        .run_with_cancel("Objective", None, &cancel)
        .await;

    assert_eq!(outcome.status(), LoopStatus::Aborted);
    let RunOutcome::Aborted(run) = outcome else {
        panic!("expected abort");
    };
    assert!(matches!(run.reason, AbortReason::Cancelled));
    assert_eq!(run.history.len(), 1);
    assert_eq!(client.call_count(), 2);
}

/// Integration test: a failing search backend aborts the run and keeps history
#[tokio::test]
async fn test_search_failure_aborts() {
    let client = Arc::new(ScriptedClient::new(vec![
        "Look it up\n{\"search_query\": \"latest tokio release\"}",
        "never sent",
    ]));
    let search: Arc<dyn SearchClient> = Arc::new(StaticSearch::failing());
    let events = Arc::new(EventLog::new());
    let config = ControllerConfig {
        use_search: true,
        search_requested: true,
        ..quick_config(3)
    };
    let controller = LoopController::with_clients(client.clone(), Some(search), &Config::default(), config)
        .with_observer(events.clone());

    let outcome = controller.run("Objective", None).await;

    assert_eq!(outcome.status(), LoopStatus::Aborted);
    assert!(outcome.history().is_empty());
    assert_eq!(client.call_count(), 1);
    assert!(events.events().iter().any(|e| matches!(e, RunEvent::Aborted { results: 0, .. })));
    assert!(!events.events().iter().any(|e| matches!(e, RunEvent::Refined { .. })));
}

/// Integration test: no search key means the prompt goes out unaugmented
#[tokio::test]
async fn test_search_without_client_degrades() {
    let client = Arc::new(ScriptedClient::new(vec![
        "Look it up\n{\"search_query\": \"latest tokio release\"}",
        "answered from memory",
        "The task is complete: ok",
        "final",
    ]));
    let events = Arc::new(EventLog::new());
    let config = ControllerConfig {
        use_search: true,
        search_requested: true,
        ..quick_config(3)
    };
    let controller =
        LoopController::with_clients(client.clone(), None, &Config::default(), config).with_observer(events.clone());

    let outcome = controller.run("Objective", None).await;

    assert_eq!(outcome.status(), LoopStatus::Complete);
    assert_eq!(client.requests()[1].messages.last().unwrap().content, "Look it up");
    assert!(events
        .events()
        .iter()
        .any(|e| matches!(e, RunEvent::SearchSkipped { iteration: 1, .. })));
}

/// Integration test: a missing language-model key is rejected before any run
#[test]
fn test_missing_llm_key_is_configuration_error() {
    let config = Config::default();
    let err = Credentials::resolve_with(&config, |_| None).unwrap_err();
    assert!(matches!(err, TasksmithError::Configuration(_)));
    assert!(err.to_string().contains("MISTRAL_API_KEY"));
}

/// Integration test: search without a key is switched off for the run
#[test]
fn test_from_config_without_search_key() -> Result<()> {
    let config = Config::from_yaml("run:\n  max_iterations: 3\n")?;
    let credentials = Credentials::resolve_with(&config, |name| {
        (name == "MISTRAL_API_KEY").then(|| "test-key".to_string())
    })?;

    let controller = LoopController::from_config(&config, &credentials, true)?;
    assert!(!controller.config().use_search);
    assert!(controller.config().search_requested);
    assert_eq!(controller.config().max_iterations, 3);
    Ok(())
}
