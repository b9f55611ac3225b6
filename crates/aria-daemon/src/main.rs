//! Aria Daemon - Main entry point
//!
//! Runs LAN discovery and serves the control API and web UI.

mod api;
mod config;
mod server;
mod sse;
mod state;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "aria")]
#[command(about = "LAN audio peripheral discovery and control daemon")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "aria.toml")]
    config: PathBuf,

    /// Bind address for web server
    #[arg(short, long)]
    bind: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Run a single discovery sweep and exit
    #[arg(long)]
    scan_once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Aria v{}", env!("CARGO_PKG_VERSION"));

    let mut config = config::load_config(&args.config)?;

    if let Some(bind) = args.bind {
        config.daemon.bind = bind;
    }

    info!(
        service_port = config.discovery.service_port,
        interval = config.discovery.scan_interval_secs,
        "Configuration loaded"
    );

    let state = state::AppState::new(config.clone());

    if args.scan_once {
        info!("Running single discovery sweep");
        state.engine.scan_once().await;
        let devices = state.engine.list_devices().await;
        println!("Discovered {} devices:", devices.len());
        for device in devices {
            println!(
                "  - {} ({:?}) at {}:{} {}",
                device.name,
                device.kind,
                device.addr,
                device.port,
                if device.online { "online" } else { "offline" }
            );
        }
    } else {
        server::run(state, &config.daemon.bind, &config.daemon.web_root).await?;
    }

    Ok(())
}
