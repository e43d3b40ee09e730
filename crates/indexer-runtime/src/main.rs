//! `ix-indexer` entry point.

use std::io;

use anyhow::{Context, Result};
use clap::Parser;
use ix_telemetry::TelemetryConfig;
use tracing::{error, info, warn};

use indexer_runtime::commands;
use indexer_runtime::{Cli, Command, IndexerConfig, IndexerContainer};

fn load_config(cli: &Cli) -> Result<IndexerConfig> {
    let mut config = IndexerConfig::load(cli.config.as_deref())
        .context("Failed to load configuration")?
        .with_env()
        .context("Failed to apply environment overrides")?;
    cli.apply(&mut config);
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut telemetry = TelemetryConfig::from_env();
    if let Some(level) = &cli.log_level {
        telemetry = telemetry.with_log_level(level.clone());
    }
    if let Err(e) = ix_telemetry::init_telemetry(&telemetry) {
        eprintln!("telemetry disabled: {}", e);
    }

    let config = load_config(&cli)?;
    info!(
        endpoint = %config.node.endpoint,
        backend = ?config.storage.backend,
        "[runtime] Starting {:?}",
        cli.command
    );
    let container = IndexerContainer::connect(config).context("Failed to start indexer")?;

    match &cli.command {
        Command::FetchBlocks => {
            let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("[runtime] Interrupt received; finishing queued batches");
                    if let Err(e) = shutdown_tx.send(true) {
                        error!("[runtime] Failed to send shutdown signal: {}", e);
                    }
                }
            });
            commands::fetch_blocks(&container, shutdown_rx)
                .await
                .context("Sync pass failed")?;
        }
        Command::GetBlock { number } => {
            commands::get_block(&container, *number, &mut io::stdout())
                .with_context(|| format!("Failed to read block {}", number))?;
        }
        Command::ComputeRich => {
            commands::compute_rich(&container)
                .await
                .context("Rich-list pass failed")?;
        }
        Command::EnsSync => {
            commands::ens_sync(&container)
                .await
                .context("ENS sync failed")?;
        }
        Command::Delegates { address, .. } => {
            commands::delegates(&container, *address, &mut io::stdout())
                .await
                .context("Density query failed")?;
        }
    }

    if cli.dump_metrics {
        let metrics = ix_telemetry::encode_metrics().context("Failed to encode metrics")?;
        print!("{}", metrics);
    }
    Ok(())
}
