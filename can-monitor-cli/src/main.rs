//! CAN Monitor CLI Application
//!
//! Live view of the frames seen by a CAN capture device. It uses the
//! can-monitor-core library and adds:
//! - The WebSocket frame stream receiver (with reconnect)
//! - A client for the device filter API
//! - The interactive console (table, hold/resume, filter commands)

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::sync::mpsc;

mod commands;
mod config;
mod console;
mod receiver;
mod remote;
mod table;

use config::{AppConfig, Overrides, Settings};
use console::Console;
use receiver::StreamReceiver;
use remote::DeviceClient;

/// CAN Monitor - Live table of the frames on a CAN capture device
#[derive(Parser, Debug)]
#[command(name = "can-monitor")]
#[command(about = "Live CAN frame monitor and filter console", long_about = None)]
#[command(version)]
struct Args {
    /// Device address as host:port (default: 127.0.0.1:18327)
    #[arg(long, value_name = "HOST:PORT")]
    host: Option<String>,

    /// Full WebSocket URL of the frame stream
    #[arg(long, value_name = "URL")]
    url: Option<String>,

    /// Base URL of the filter API
    #[arg(long, value_name = "URL")]
    api: Option<String>,

    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Table refresh interval in milliseconds
    #[arg(long, value_name = "MS")]
    refresh_ms: Option<u64>,

    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    log::info!("CAN Monitor CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using monitor library v{}", can_monitor_core::VERSION);

    let config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };

    let overrides = Overrides {
        host: args.host,
        stream_url: args.url,
        api_url: args.api,
        refresh_ms: args.refresh_ms,
    };
    let settings = Settings::resolve(&config, &overrides)?;
    log::debug!("Resolved settings: {:?}", settings);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;
    runtime.block_on(run(settings))
}

async fn run(settings: Settings) -> Result<()> {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (reply_tx, reply_rx) = mpsc::unbounded_channel();

    log::info!("Frame stream: {}", settings.stream_url);
    log::info!("Filter API:   {}", settings.api_base);

    let receiver = StreamReceiver::new(
        settings.stream_url.as_str(),
        settings.reconnect.clone(),
        event_tx,
    )
    .spawn();

    let client = DeviceClient::new(settings.api_base.clone(), settings.request_timeout)
        .context("Failed to create the device API client")?;
    let console = Console::new(client, reply_tx, settings.refresh, settings.show_status);

    let result = console.run(event_rx, reply_rx).await;
    receiver.abort();
    result
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
