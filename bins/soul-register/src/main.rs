use anyhow::{Context, Result};
use clap::Parser;
use soul_common::MetaDataRegisterDTO;
use soul_register_client::{ClientRegisterRepository, RegisterCenterConfig};
use std::path::Path;
use tracing::{error, info};

/// Soul register client - publishes service records for the Soul gateway
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Register center configuration file path (YAML)
    #[arg(short, long, value_name = "FILE")]
    config: String,

    /// Records to register (JSON array of metadata records)
    #[arg(short, long, value_name = "FILE")]
    records: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Run duration in seconds (for testing)
    #[arg(long)]
    run_duration: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    initialize_logging(args.debug);

    info!("Starting Soul register client");
    info!("Config file: {}", args.config);

    let config = RegisterCenterConfig::load_from_file(&args.config)?;
    let records = load_records(&args.records)?;
    info!("Loaded {} records from {}", records.len(), args.records);

    let repository = ClientRegisterRepository::connect(&config).await?;

    // Liveness nodes only live as long as the session, so a failed
    // registration still closes it before exiting.
    let registered = register_all(&repository, &records).await;
    if let Err(e) = &registered {
        error!("Registration failed: {}", e);
    } else {
        info!("Registered {} records", records.len());

        if let Some(duration) = args.run_duration {
            info!("Running for {} seconds (test mode)", duration);
            tokio::time::sleep(tokio::time::Duration::from_secs(duration)).await;
        } else {
            wait_for_shutdown_signal().await?;
        }
    }

    info!("Shutting down register client...");
    repository.close().await?;
    info!("Register client shut down successfully");

    registered
}

async fn register_all(repository: &ClientRegisterRepository, records: &[MetaDataRegisterDTO]) -> Result<()> {
    for record in records {
        repository
            .persist_interface(record)
            .await
            .with_context(|| format!("Failed to register {} record for {}", record.rpc_type, record.context_path))?;
    }
    Ok(())
}

fn load_records<P: AsRef<Path>>(path: P) -> Result<Vec<MetaDataRegisterDTO>> {
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read records file: {}", path.as_ref().display()))?;

    parse_records(&content)
}

fn parse_records(content: &str) -> Result<Vec<MetaDataRegisterDTO>> {
    serde_json::from_str(content).context("Failed to parse records JSON")
}

fn initialize_logging(debug: bool) {
    let level = if debug { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level))
        )
        .with_target(false)
        .with_thread_ids(true)
        .init();
}

async fn wait_for_shutdown_signal() -> Result<()> {
    use tokio::signal;

    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("Failed to create SIGTERM handler")?;
        let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())
            .context("Failed to create SIGINT handler")?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM signal");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT signal");
            }
        }
    }

    #[cfg(windows)]
    {
        signal::ctrl_c().await.context("Failed to listen for Ctrl+C")?;
        info!("Received Ctrl+C signal");
    }

    Ok(())
}
