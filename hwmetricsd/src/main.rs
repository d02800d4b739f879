//! hwmetrics daemon
//!
//! Resolves the exporter configuration at startup and keeps it current.
//! SIGHUP re-reads the settings file; Ctrl+C or SIGTERM stops the daemon.
//!
//! The settings file is chosen in this order: `--config`, the
//! `HWMETRICS_CONFIG` environment variable, then the default location
//! (`~/.config/hwmetrics/config.toml`).

mod config;

use anyhow::{Context, Result};
use clap::Parser;
use config::RuntimeConfig;
use hwmetrics_core::{default_config_path, BackendConfig, GlobalTrustPolicy, ResolvedConfig};
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info};

/// Hardware sensor metrics exporter
#[derive(Parser, Debug)]
#[command(name = "hwmetricsd")]
#[command(version, about = "Hardware sensor metrics exporter", long_about = None)]
struct Args {
    /// Path to the settings file (TOML, or YAML with a .yaml/.yml extension)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Resolve the configuration, print it as JSON and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing(args.verbose);

    info!("hwmetrics starting...");

    let config_path = args.config.unwrap_or_else(|| {
        std::env::var("HWMETRICS_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_config_path())
    });
    info!("Configuration file: {}", config_path.display());

    let runtime_config = RuntimeConfig::load(&config_path)
        .await
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;
    let config = runtime_config.current().await;
    log_config(&config);

    if args.check {
        let json = serde_json::to_string_pretty(config.as_ref())?;
        println!("{}", json);
        return Ok(());
    }

    info!("Ready. Send SIGHUP to reload the configuration.");
    wait_for_signals(&runtime_config).await?;

    info!("Shutdown complete");
    Ok(())
}

/// Handle reload and shutdown signals until asked to stop.
#[cfg(unix)]
async fn wait_for_signals(runtime_config: &RuntimeConfig) -> Result<()> {
    use signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup()).context("failed to install SIGHUP handler")?;
    let mut terminate =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;

    loop {
        tokio::select! {
            _ = hangup.recv() => {
                info!("Received SIGHUP, reloading {}", runtime_config.path().display());
                match runtime_config.reload().await {
                    Ok(config) => log_config(&config),
                    Err(e) => error!("Reload failed, keeping previous configuration: {}", e),
                }
            }
            _ = terminate.recv() => {
                info!("Received SIGTERM, shutting down gracefully...");
                return Ok(());
            }
            result = signal::ctrl_c() => {
                result.context("failed to listen for Ctrl+C")?;
                info!("Received Ctrl+C, shutting down gracefully...");
                return Ok(());
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signals(_runtime_config: &RuntimeConfig) -> Result<()> {
    signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;
    info!("Received Ctrl+C, shutting down gracefully...");
    Ok(())
}

/// Log the resolved configuration, leaving out credentials
fn log_config(config: &ResolvedConfig) {
    match config.backend() {
        BackendConfig::Graphite(graphite) => info!(
            "  Backend: graphite {}:{} (tags: {})",
            graphite.host, graphite.port, graphite.tags
        ),
        BackendConfig::Influx(influx) => {
            info!("  Backend: influx {} db={}", influx.address, influx.db)
        }
        BackendConfig::Prometheus(prometheus) => info!(
            "  Backend: prometheus listening on {}:{}",
            prometheus.host, prometheus.port
        ),
        BackendConfig::Timescale(timescale) => info!(
            "  Backend: timescale (setup table: {})",
            timescale.setup_table
        ),
    }
    info!("  Interval: {}s", config.interval().as_secs());
    info!("  Host name: {}", config.lookup_name());
    info!(
        "  Hidden sensor rules: {}, aliases: {}",
        config.hidden_sensors().len(),
        config.aliases().len()
    );
    info!(
        "  Certificate verification: {}",
        GlobalTrustPolicy::current().describe()
    );
}

/// Initialize tracing subscriber for logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
