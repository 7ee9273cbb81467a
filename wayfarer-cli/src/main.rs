//! Wayfarer CLI - build a multimedia itinerary for a driving route

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use wayfarer_core::config::WayfarerConfig;
use wayfarer_core::engine::Engine;
use wayfarer_core::pipeline::{event_channel, EventReceiver, PipelineEvent};
use wayfarer_core::report::render_itinerary;

#[derive(Parser)]
#[command(name = "wayfarer")]
#[command(about = "Turn a driving route into a multimedia itinerary", long_about = None)]
#[command(version, args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    plan: PlanArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Version information
    Version,
}

#[derive(Args)]
struct PlanArgs {
    /// Starting address
    start: Option<String>,

    /// Destination address
    destination: Option<String>,

    /// Only enrich the first N steps
    #[arg(short, long)]
    limit: Option<usize>,

    /// Configuration file (defaults to wayfarer.toml and WAYFARER_* variables)
    #[arg(short, long, env = "WAYFARER_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Print the itinerary as JSON
    #[arg(long)]
    json: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_level = if cli.plan.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Some(Commands::Version) => {
            println!("wayfarer {}", env!("CARGO_PKG_VERSION"));
            println!("wayfarer-core {}", wayfarer_core::VERSION);
            Ok(())
        }
        None => plan(cli.plan).await,
    }
}

async fn plan(args: PlanArgs) -> Result<()> {
    let (Some(start), Some(destination)) = (args.start, args.destination) else {
        bail!("both <START> and <DESTINATION> are required");
    };

    let config = match &args.config {
        Some(path) => WayfarerConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => WayfarerConfig::load()?,
    };

    let (tx, rx) = event_channel();
    let engine = Engine::from_config(&config)?.with_events(tx);
    let printer = tokio::spawn(log_events(rx));

    let handle = engine.start(start, destination, args.limit);
    tracing::info!(run_id = handle.run_id(), "Run started");
    let outcome = handle.wait().await;

    // The engine, and with it the last event sender, is dropped here.
    drop(engine);
    let _ = printer.await;

    let results = outcome?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        println!("{}", render_itinerary(&results));
    }
    Ok(())
}

async fn log_events(mut rx: EventReceiver) {
    while let Some(event) = rx.recv().await {
        match event {
            PipelineEvent::RunStarted { total_steps, .. } => {
                tracing::info!("Route has {} steps", total_steps);
            }
            PipelineEvent::ProducerFailed { step_id, category, error, .. } => {
                tracing::warn!(%step_id, %category, "Producer skipped step: {}", error);
            }
            PipelineEvent::StepCollected { step_id, collected, total, .. } => {
                tracing::info!(%step_id, "Progress: {}/{}", collected, total);
            }
            PipelineEvent::StrandedSteps { step_ids, .. } => {
                tracing::warn!("Incomplete steps: {}", step_ids.join(", "));
            }
            PipelineEvent::RunFinished { collected, total, error, .. } => match error {
                Some(error) => tracing::error!("Run failed: {}", error),
                None => tracing::info!("Run finished: {}/{} steps", collected, total),
            },
            other => tracing::debug!(event = ?other, "Pipeline event"),
        }
    }
}
