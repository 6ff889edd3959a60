use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{info, warn};

use netshield::config::Config;
use netshield::{source, Engine};

#[derive(Parser)]
#[command(name = "netshield")]
#[command(author, version, about = "Streaming network anomaly detection engine")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the detection engine
    Run {
        /// Replay descriptors from an NDJSON file instead of stdin
        #[arg(short, long)]
        replay: Option<PathBuf>,

        /// Override the event sink endpoint
        #[arg(long)]
        endpoint: Option<String>,

        /// Override the tenant identifier
        #[arg(long)]
        tenant: Option<String>,

        /// Override the volume-rule threshold (packets per window)
        #[arg(long)]
        dos_threshold: Option<u64>,

        /// Override the scan-rule threshold (distinct ports per window)
        #[arg(long)]
        port_scan_threshold: Option<usize>,

        /// Override the window length in milliseconds
        #[arg(long)]
        window_ms: Option<u64>,

        /// Mirror every delivered payload to stdout as JSON
        #[arg(long)]
        stdout: bool,
    },

    /// Validate the effective configuration and exit
    Check,

    /// Generate default configuration file
    GenConfig {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

pub async fn run_command(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default()?,
    };
    config.apply_env_overrides();

    match cli.command {
        Commands::Run {
            replay,
            endpoint,
            tenant,
            dos_threshold,
            port_scan_threshold,
            window_ms,
            stdout,
        } => {
            if let Some(endpoint) = endpoint {
                config.sink.endpoint = endpoint;
            }
            if let Some(tenant) = tenant {
                config.tenant_id = tenant;
            }
            if let Some(threshold) = dos_threshold {
                config.detection.dos_threshold = threshold;
            }
            if let Some(threshold) = port_scan_threshold {
                config.detection.port_scan_threshold = threshold;
            }
            if let Some(window) = window_ms {
                config.detection.window_ms = window;
            }
            if stdout {
                config.sink.mirror_stdout = true;
            }
            cmd_run(config, replay).await
        }
        Commands::Check => cmd_check(config),
        Commands::GenConfig { output } => cmd_gen_config(output),
    }
}

async fn cmd_run(config: Config, replay: Option<PathBuf>) -> Result<()> {
    let engine = Engine::new(config)?;

    let (tx, rx) = mpsc::channel(1024);

    // Feed the engine from the replay file or stdin; dropping the sender
    // at end-of-stream is what lets the engine finish.
    let reader = tokio::spawn(async move {
        let result = match replay {
            Some(path) => source::stream_file(path, tx).await,
            None => source::stream_stdin(tx).await,
        };
        match result {
            Ok(forwarded) => info!("descriptor source finished after {} descriptors", forwarded),
            Err(e) => warn!("descriptor source failed: {:#}", e),
        }
    });

    let shutdown_signal = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C handler");
    };

    tokio::select! {
        result = engine.run(rx) => {
            result?;
        }
        _ = shutdown_signal => {
            info!("interrupt received, shutting down");
            engine.log_summary();
        }
    }

    reader.abort();
    Ok(())
}

fn cmd_check(config: Config) -> Result<()> {
    config.validate()?;
    println!("configuration OK");
    println!("  tenant:    {}", config.tenant_id);
    println!("  sink:      {}", config.sink.endpoint);
    println!(
        "  detection: {} packets, {} ports per {}ms window",
        config.detection.dos_threshold,
        config.detection.port_scan_threshold,
        config.detection.window_ms
    );
    Ok(())
}

fn cmd_gen_config(output: Option<PathBuf>) -> Result<()> {
    let config = Config::default();
    let content = toml::to_string_pretty(&config).context("Failed to serialize config")?;

    match output {
        Some(path) => {
            std::fs::write(&path, content)
                .with_context(|| format!("Failed to write config to {}", path.display()))?;
            println!("Wrote default configuration to {}", path.display());
        }
        None => print!("{}", content),
    }

    Ok(())
}
