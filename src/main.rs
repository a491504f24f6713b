//! Stick Relay
//!
//! Serves a virtual analog-stick surface and streams the stick values to a
//! remote peer socket.

use anyhow::{Context, Result};
use clap::Parser;
use parking_lot::RwLock;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use stick_relay::config::AppConfig;
use stick_relay::controller::Controller;
use stick_relay::peer::PeerSocket;
use stick_relay::surface::{self, SurfaceState};
use stick_relay::transmit::{ControllerSnapshot, Emitter, LogEmitter};

/// Stick Relay - virtual analog sticks streamed to a remote peer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (defaults are used if it does not exist)
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Surface server port (overrides config)
    #[arg(short, long, env = "STICK_RELAY_PORT")]
    port: Option<u16>,

    /// Peer WebSocket URL (overrides config)
    #[arg(long, env = "STICK_RELAY_PEER")]
    peer: Option<String>,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut config = AppConfig::load_or_default(&args.config).await?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(peer) = args.peer {
        config.peer.url = Some(peer);
    }
    config.validate()?;

    if args.print_config {
        print!("{}", config.to_yaml()?);
        return Ok(());
    }

    let _log_guard = init_logging(&args.log_level, &config)?;

    info!("Starting Stick Relay v{}...", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    run_app(config).await?;

    info!("Stick Relay shutdown complete");
    Ok(())
}

async fn run_app(config: AppConfig) -> Result<()> {
    let emitter: Arc<dyn Emitter> = match &config.peer.url {
        Some(url) => {
            info!("Streaming to peer {} ({:?} framing)", url, config.peer.framing);
            Arc::new(PeerSocket::spawn(url, &config.peer))
        }
        None => {
            warn!("No peer configured, snapshots will only be logged");
            Arc::new(LogEmitter)
        }
    };

    let (update_tx, _) = broadcast::channel(256);
    let (input_tx, input_rx) = mpsc::channel(1024);
    let latest = Arc::new(RwLock::new(ControllerSnapshot::default()));

    let controller = Controller::new(&config, emitter, update_tx.clone(), latest.clone())?;

    let state = Arc::new(SurfaceState::new(input_tx, update_tx, latest, controller.layout()));

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port)
        .parse()
        .with_context(|| format!("Invalid server address {}:{}", config.server.bind, config.server.port))?;

    let (stop_tx, mut stop_rx) = tokio::sync::watch::channel(false);
    let mut server = tokio::spawn(surface::start_server(state, addr, async move {
        let _ = stop_rx.changed().await;
    }));

    let run = controller.run(input_rx, shutdown_signal());
    tokio::pin!(run);

    // The server only finishes first if it failed to start or crashed
    let early_exit = tokio::select! {
        _ = &mut run => None,
        result = &mut server => Some(result),
    };

    let result = match early_exit {
        Some(result) => result,
        None => {
            let _ = stop_tx.send(true);
            server.await
        }
    };

    match result {
        Ok(result) => result?,
        Err(e) => error!("Surface server task failed: {}", e),
    }

    Ok(())
}

fn init_logging(level: &str, config: &AppConfig) -> Result<Option<WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stdout = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    let (file, guard) = match &config.logging.dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "stick-relay.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout)
        .with(file)
        .init();

    Ok(guard)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for CTRL+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
