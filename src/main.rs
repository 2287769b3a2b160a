use std::io;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use log::{error, info};
use tokio::sync::broadcast;

mod config;
mod dashboard;
mod frame;
mod listener;
mod messages;
mod simulator;
mod sink;

use config::{AppConfig, OutputFormat};
use dashboard::{JsonSink, TextSink};
use listener::TelemetryListener;
use sink::PresentationSink;

const DEFAULT_CONFIG_PATH: &str = "tds-monitor.toml";

/// Live dashboard for the TDS sensor's UDP telemetry.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Receive telemetry and show it (default)
    Listen(ListenArgs),
    /// Pretend to be the sensor and send frames
    Simulate(SimulateArgs),
}

#[derive(Args, Debug, Default)]
struct ListenArgs {
    /// Config file; defaults to ./tds-monitor.toml if present
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long)]
    bind: Option<IpAddr>,

    #[arg(short, long)]
    port: Option<u16>,

    /// Largest datagram accepted, in bytes
    #[arg(long)]
    buffer_size: Option<usize>,

    #[arg(long, value_enum)]
    format: Option<OutputFormat>,
}

#[derive(Args, Debug)]
struct SimulateArgs {
    #[arg(long, default_value = "127.0.0.1:3333")]
    target: SocketAddr,

    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    match cli.command {
        Some(Command::Simulate(args)) => simulate(args).await,
        Some(Command::Listen(args)) => listen(args).await,
        None => listen(ListenArgs::default()).await,
    }
}

fn init_logger(verbose: bool) {
    let filters = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| if verbose { "debug" } else { "info" }.to_string());
    pretty_env_logger::formatted_builder()
        .parse_filters(&filters)
        .init();
}

fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::load_or_default(Path::new(DEFAULT_CONFIG_PATH))?,
    };
    Ok(config)
}

async fn listen(args: ListenArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;

    let mut settings = config.listener_settings()?;
    if let Some(ip) = args.bind {
        settings.bind_addr.set_ip(ip);
    }
    if let Some(port) = args.port {
        settings.bind_addr.set_port(port);
    }
    if let Some(buffer_size) = args.buffer_size {
        settings.buffer_size = buffer_size;
    }
    settings.validate()?;

    let listener = TelemetryListener::bind(&settings)
        .await
        .context("cannot start telemetry listener")?;
    let shutdown = shutdown_on_ctrl_c();

    match args.format.unwrap_or(config.output_format()) {
        OutputFormat::Text => {
            serve(listener, TextSink::new(io::stdout()), settings.channel_capacity, shutdown).await
        }
        OutputFormat::Json => {
            serve(listener, JsonSink::new(io::stdout()), settings.channel_capacity, shutdown).await
        }
    }
}

async fn serve<S: PresentationSink>(
    listener: TelemetryListener,
    sink: S,
    channel_capacity: usize,
    shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let (tx, rx) = sink::delivery_channel(channel_capacity);
    let presenter = sink::spawn_presenter(sink, rx);

    // The listener owns the only sender; once it stops the presenter drains and exits
    let listening = tokio::spawn(listener.run(tx, shutdown));
    let stats = listening.await?;

    if let Err(err) = presenter.await {
        error!("Presenter task failed: {:?}", err);
    }

    let stats = stats?;
    info!(
        "Listener stopped: {} received, {} decoded, {} rejected, {} dropped",
        stats.received, stats.decoded, stats.rejected, stats.dropped
    );
    Ok(())
}

async fn simulate(args: SimulateArgs) -> anyhow::Result<()> {
    let sim = simulator::Simulator::new(args.target)
        .await
        .context("cannot open simulator socket")?;
    let shutdown = shutdown_on_ctrl_c();
    sim.run(Duration::from_millis(args.interval_ms.max(1)), shutdown)
        .await;
    Ok(())
}

fn shutdown_on_ctrl_c() -> broadcast::Receiver<()> {
    let (tx, rx) = broadcast::channel(1);
    tokio::task::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl-C, shutting down");
                let _ = tx.send(());
            }
            Err(err) => {
                error!("Cannot listen for Ctrl-C: {:?}", err);
                // Dropping the sender would read as a shutdown request
                std::future::pending::<()>().await;
            }
        }
    });
    rx
}
