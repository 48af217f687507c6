use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

mod cli;

use cli::commands::Commands;
use cli::{Cli, ConsoleObserver};
use tasksmith::artifact::{self, ExchangeLog};
use tasksmith::config::Config;
use tasksmith::runner::{Fanout, LogObserver, LoopController, RunObserver, RunOutcome};

fn setup_logging(default_level: &str) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tasksmith")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("tasksmith.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

/// Cancel the run on the first Ctrl-C
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{}", "Interrupted, stopping after the current call...".yellow());
            child.cancel();
        }
    });
    token
}

fn read_file_content(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read file {}", path.display()))
}

async fn handle_run_command(
    objective: &str,
    file: Option<&Path>,
    search: bool,
    output: Option<&Path>,
    cli: &Cli,
    config: &Config,
) -> Result<bool> {
    info!("Running objective: {}", objective);
    let credentials = config.credentials().context("Failed to resolve credentials")?;
    let file_content = file.map(read_file_content).transpose()?;

    let observers: Vec<Arc<dyn RunObserver>> = vec![Arc::new(LogObserver), Arc::new(ConsoleObserver::new(cli.is_verbose()))];
    let controller = LoopController::from_config(config, &credentials, search || config.search.enabled)
        .context("Failed to set up run")?
        .with_observer(Arc::new(Fanout(observers)));

    let cancel = cancel_on_ctrl_c();
    let outcome = controller.run_with_cancel(objective, file_content, &cancel).await;

    if let (RunOutcome::Complete(_), None) = (&outcome, output) {
        println!("\n{}", "Refined Final Output".green().bold());
    }

    match artifact::publish(&outcome, output, &config.output).context("Failed to write final output")? {
        ExchangeLog::Written(path) => println!("{} {}", "Exchange log:".cyan(), path.display()),
        ExchangeLog::Failed(e) => eprintln!("{} {}", "Exchange log not written:".yellow(), e),
        ExchangeLog::Disabled => {}
    }

    match outcome {
        RunOutcome::Complete(_) => {
            if let Some(path) = output {
                println!("{} {}", "Final output:".green(), path.display());
            }
            Ok(true)
        }
        RunOutcome::Aborted(run) => {
            eprintln!("{} {}", "Run aborted:".red(), run.reason);
            Ok(false)
        }
    }
}

fn handle_check_command(config: &Config) -> Result<()> {
    let provider = config.llm.provider;
    println!("{} {:?}", "Provider:".cyan(), provider);
    println!("  orchestrator: {}", config.models.orchestrator_model(provider));
    println!("  sub-agent:    {}", config.models.sub_agent_model(provider));
    println!("  refiner:      {}", config.models.refiner_model(provider));
    println!("  max iterations: {}", config.run.max_iterations);

    match config.credentials() {
        Ok(credentials) => {
            println!("{} present", "LLM API key:".green());
            let search = if credentials.search_api_key.is_some() {
                "present".green()
            } else {
                "missing (web search disabled)".yellow()
            };
            println!("Search API key: {}", search);
        }
        Err(e) => println!("{} {}", "LLM API key:".red(), e),
    }
    Ok(())
}

async fn run_application(cli: &Cli, config: &Config) -> Result<bool> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::Run {
            objective,
            file,
            search,
            output,
            ..
        } => handle_run_command(objective, file.as_deref(), *search, output.as_deref(), cli, config).await,
        Commands::Check => handle_check_command(config).map(|_| true),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    if let Commands::Run {
        max_iterations: Some(n), ..
    } = &cli.command
    {
        config.run.max_iterations = *n;
    }

    setup_logging(config.log_level.as_deref().unwrap_or("info")).context("Failed to setup logging")?;
    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    let succeeded = run_application(&cli, &config).await.context("Application failed")?;
    if !succeeded {
        std::process::exit(1);
    }

    Ok(())
}
