//! Trustline indexer binary.
//!
//! Reads feedback events from the reputation registry, recomputes trust
//! scores through the engine, and commits batched updates to the TrustScore
//! contract. Runs as a serial polling loop; one cycle in flight at a time.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use trustline_indexer::config::Config;
use trustline_indexer::contract::ScoreUpdater;
use trustline_indexer::cycle::{CycleSettings, Indexer};
use trustline_indexer::listener::RpcProvider;
use trustline_indexer::{CheckpointStore, RetryPolicy};

#[derive(Parser)]
#[command(name = "trustline-indexer")]
#[command(version, about = "Trustline indexer for ERC-8004 feedback events", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "trustline.toml")]
    config: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the indexer polling loop
    Run,

    /// Run a single cycle and print its report
    RunOnce,

    /// Show the persisted checkpoint
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.debug)?;

    info!("Trustline indexer starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let config = Config::from_file(&cli.config)?;
            let indexer = build_indexer(&config)?;
            indexer.run().await?;
        }
        Commands::RunOnce => {
            let config = Config::from_file(&cli.config)?;
            let indexer = build_indexer(&config)?;
            let report = indexer.run_cycle().await?;
            println!("\n=== Cycle Report ===\n");
            println!("Processed Agents: {}", report.processed_agent_count);
            println!("Queued Agents:    {}", report.queued_agent_count);
            println!("Latest Block:     {}", report.latest_block);
            match report.tx_hash {
                Some(tx_hash) => println!("Batch TX:         {}", tx_hash),
                None => println!("Batch TX:         none (no dirty agents)"),
            }
            if report.signature_overlap {
                println!("Note: both feedback signatures observed this cycle");
            }
        }
        Commands::Status => {
            let config = Config::from_file(&cli.config)?;
            show_status(&config).await?;
        }
    }

    Ok(())
}

/// Initialize tracing subscriber for logging
fn init_logging(debug: bool) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter = if debug {
        EnvFilter::new("trustline_indexer=debug,trustline_engine=debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("trustline_indexer=info"))
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_line_number(true))
        .init();

    Ok(())
}

/// Wire an indexer from loaded configuration.
fn build_indexer(config: &Config) -> Result<Indexer> {
    let provider = RpcProvider::new(
        &config.network.rpc_url,
        config.contracts.reputation_registry,
    )?;

    let signer = config
        .updater_private_key_with_prefix()
        .parse()
        .context("Invalid updater private key")?;
    let updater = ScoreUpdater::new(&config.network.rpc_url, signer, config.contracts.trust_score)?;

    let store = CheckpointStore::new(&config.indexer.checkpoint_path);

    let settings = CycleSettings {
        start_block: config.indexer.start_block,
        max_batch_size: config.indexer.max_batch_size,
        poll_interval: Duration::from_millis(config.indexer.poll_interval_ms),
        scoring: config.scoring.clone(),
        retry: RetryPolicy {
            initial_delay: Duration::from_millis(config.retry.initial_delay_ms),
            max_delay: Duration::from_millis(config.retry.max_delay_ms),
            max_retries: config.retry.max_retries,
        },
    };

    Ok(Indexer::new(
        Arc::new(provider),
        Arc::new(updater),
        store,
        settings,
    ))
}

/// Show the persisted checkpoint
async fn show_status(config: &Config) -> Result<()> {
    let store = CheckpointStore::new(&config.indexer.checkpoint_path);
    let checkpoint = store.load().await?;

    println!("\n=== Trustline Indexer Status ===\n");
    println!("Checkpoint file: {}", store.path().display());
    match checkpoint.last_processed_block {
        Some(block) => println!("Last Processed Block: {}", block),
        None => println!("Last Processed Block: none (no cycle completed yet)"),
    }

    if checkpoint.pending_agent_ids.is_empty() {
        println!("Pending Agents: none");
    } else {
        println!("Pending Agents ({}):", checkpoint.pending_agent_ids.len());
        for agent_id in &checkpoint.pending_agent_ids {
            println!("  {}", agent_id);
        }
    }

    println!();

    Ok(())
}
