//! souschef CLI: run one conversation against the orchestration loop.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use souschef_agent::OrchestrationLoop;
use souschef_config::AppConfig;
use souschef_core::ModelProvider;
use souschef_providers::OpenAiCompatProvider;
use souschef_telemetry::JsonLinesSink;
use souschef_tools::{builtin_registry, CatalogStore};

#[derive(Parser)]
#[command(
    name = "souschef",
    about = "souschef, an agentic meal-planning assistant",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path (defaults to the standard config location)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask the assistant one question and print its answer
    Ask {
        /// The user message
        message: String,

        /// Append the conversation trace to this JSON-lines file
        #[arg(long)]
        trace_file: Option<PathBuf>,
    },

    /// List the registered tools
    Tools,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    config.validate()?;

    match cli.command {
        Commands::Ask {
            message,
            trace_file,
        } => ask(config, &message, trace_file).await,
        Commands::Tools => list_tools(),
    }
}

async fn ask(
    config: AppConfig,
    message: &str,
    trace_file: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let api_key = config
        .api_key
        .clone()
        .ok_or("no API key configured; set SOUSCHEF_API_KEY or add api_key to the config file")?;

    let provider: Arc<dyn ModelProvider> = Arc::new(OpenAiCompatProvider::new(
        "souschef",
        config.base_url.clone(),
        api_key,
    )?);
    let registry = Arc::new(builtin_registry(Arc::new(CatalogStore::seeded()))?);

    let mut orchestrator = OrchestrationLoop::new(provider, registry, config);
    if let Some(path) = trace_file {
        orchestrator = orchestrator.with_trace_sink(Arc::new(JsonLinesSink::new(path)));
    }

    let outcome = orchestrator.run(message).await;
    println!("{}", outcome.final_message);
    eprintln!(
        "[{} | {} iterations | ${:.4} | {} ms]",
        outcome.trace.termination_reason,
        outcome.trace.iterations.len(),
        outcome.trace.total_cost_usd,
        outcome.trace.total_duration_ms,
    );
    Ok(())
}

fn list_tools() -> Result<(), Box<dyn std::error::Error>> {
    let registry = builtin_registry(Arc::new(CatalogStore::seeded()))?;
    for definition in registry.export_schema(None) {
        println!("{:<28} {}", definition.name, definition.description);
    }
    Ok(())
}
