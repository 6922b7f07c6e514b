//! Generate a commit message for an existing diff.
//!
//! Reads the API key from the `OPENROUTER_KEY` environment variable. Logs go
//! to stderr (`RUST_LOG` overrides the default filter); the message goes to
//! stdout.
//!
//! # Examples
//!
//! ```sh
//! # Diff on stdin
//! git diff --cached | promptfit-commit --history recent.txt
//!
//! # Inspect the prompt without calling the model
//! promptfit-commit changes.diff --dry-run
//! ```

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use promptfit::BudgetError;
use promptfit::api::OpenRouterClient;
use promptfit::context::{ContextWindowManager, LoggingObserver, TokenizerCache};
use promptfit_commit::{CommitConfig, CommitInputs, commit_system_prompt, render_dry_run};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Generate a commit message for an existing diff.
#[derive(Parser)]
#[command(name = "promptfit-commit", version)]
struct Cli {
    /// Diff file. Reads stdin when omitted or `-`.
    diff: Option<PathBuf>,

    /// Recent repository history (e.g. `git log --format=%s` output).
    #[arg(long)]
    history: Option<PathBuf>,

    /// The author's own previous commit messages.
    #[arg(long)]
    user_history: Option<PathBuf>,

    /// File with custom instructions for the message style.
    #[arg(long)]
    instructions: Option<PathBuf>,

    /// Replace the default closing reminder.
    #[arg(long)]
    reminder: Option<String>,

    /// TOML config file (model, budget, retry settings).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Model to use; overrides the config file.
    #[arg(long)]
    model: Option<String>,

    /// Maximum tokens in the generated message.
    #[arg(long)]
    max_tokens: Option<u32>,

    /// Sampling temperature.
    #[arg(long)]
    temperature: Option<f32>,

    /// Retries for transient API failures.
    #[arg(long)]
    retries: Option<u32>,

    /// Wait for the full response instead of streaming it.
    #[arg(long)]
    no_stream: bool,

    /// Print the assembled prompt and exit without calling the model.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "promptfit=warn,promptfit_commit=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    let config = load_config(&cli)?;
    let inputs = read_inputs(&cli)?;
    if inputs.diff.trim().is_empty() {
        return Err("the diff is empty".into());
    }

    let cache = TokenizerCache::new();
    let mut manager = ContextWindowManager::new(
        config.model_descriptor(),
        commit_system_prompt(),
        &cache,
        config.budget.clone(),
    )
    .map_err(|e| e.to_string())?
    .with_observer(Arc::new(LoggingObserver));
    inputs.add_to(&mut manager).map_err(|e| e.to_string())?;

    if manager.exceeds_budget() {
        warn!(
            "Content is ~{} tokens but {} accepts {} input tokens; lower-priority context will be truncated or dropped",
            manager.estimated_raw_token_count(),
            manager.model().id,
            manager.model().max_input_tokens,
        );
    }

    if cli.dry_run {
        let messages = manager.build_messages();
        let tokens = manager.system_prompt_tokens()
            + manager.accountant().count(&messages.user_content);
        print!(
            "{}",
            render_dry_run(&messages.system_prompt, &messages.user_content, tokens)
        );
        return Ok(());
    }

    let api_key = std::env::var("OPENROUTER_KEY")
        .map_err(|_| "OPENROUTER_KEY environment variable is not set".to_string())?;
    let client = OpenRouterClient::with_headers(
        api_key,
        "https://github.com/tacryt-socryp/promptfit",
        "promptfit-commit",
    )?
    .with_retry(config.retry.clone());

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    info!("Generating with {}", manager.model().id);
    let result = manager
        .build_with_retry(&client, &config.request_params(), &cancel, |delta| {
            print!("{delta}");
            let _ = std::io::stdout().flush();
        })
        .await;
    match result {
        Ok(message) => {
            if !message.ends_with('\n') {
                println!();
            }
            Ok(())
        }
        Err(BudgetError::Cancelled) => {
            eprintln!("\nCancelled.");
            std::process::exit(130);
        }
        Err(e) => Err(e.to_string()),
    }
}

fn load_config(cli: &Cli) -> Result<CommitConfig, String> {
    let mut config = match &cli.config {
        Some(path) => CommitConfig::from_file(path).map_err(|e| e.to_string())?,
        None => CommitConfig::default(),
    };
    if let Some(model) = &cli.model {
        config.model = model.clone();
    }
    if let Some(max_tokens) = cli.max_tokens {
        config.max_tokens = max_tokens;
    }
    if let Some(temperature) = cli.temperature {
        config.temperature = temperature;
    }
    if let Some(retries) = cli.retries {
        config.retry.max_retries = retries;
    }
    if cli.no_stream {
        config.streaming = false;
    }
    Ok(config)
}

fn read_inputs(cli: &Cli) -> Result<CommitInputs, String> {
    let diff = match cli.diff.as_deref() {
        None => read_stdin()?,
        Some(path) if path == Path::new("-") => read_stdin()?,
        Some(path) => read_file(path)?,
    };
    Ok(CommitInputs {
        diff,
        recent_commits: cli.history.as_deref().map(read_file).transpose()?,
        user_commits: cli.user_history.as_deref().map(read_file).transpose()?,
        custom_instructions: cli.instructions.as_deref().map(read_file).transpose()?,
        reminder: cli.reminder.clone(),
    })
}

fn read_file(path: &Path) -> Result<String, String> {
    std::fs::read_to_string(path).map_err(|e| format!("failed to read {}: {e}", path.display()))
}

fn read_stdin() -> Result<String, String> {
    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .map_err(|e| format!("failed to read stdin: {e}"))?;
    Ok(text)
}
