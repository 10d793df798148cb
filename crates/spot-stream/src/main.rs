use std::sync::Arc;
use std::time::Duration;

use spot_stream::config::{load_config, load_default_config};
use spot_stream::{
    ConnectionConfig, ConnectionRegistry, LoggingHandler, RestClient, StreamConnection,
    StreamError, TerminateCause,
};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How long to wait for connections to close after Ctrl-C
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

fn print_help() {
    eprintln!(
        r#"Spot Stream - resilient Binance Spot WebSocket client

USAGE:
    spot-stream [OPTIONS]

OPTIONS:
    --config <PATH>     Load configuration from JSON file
    --help              Print this help message

ENVIRONMENT VARIABLES:
    BINANCE_API_KEY     API key for user_data connections without one in config
    BINANCE_API_SECRET  Secret key for user_data connections without one in config
    RUST_LOG            Log level filter

EXAMPLES:
    # Run the embedded default (public depth and trade streams)
    spot-stream

    # Run with config file
    spot-stream --config streams.json
"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "spot_stream=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();
    let mut config_path: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--config" | "-c" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
                config_path = Some(args[i].clone());
            }
            arg => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let file = match config_path {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path);
            load_config(&path)?
        }
        None => {
            tracing::info!("Using default configuration");
            load_default_config()?
        }
    };
    file.validate()?;

    let rest = Arc::new(RestClient::new(file.rest_url.clone()));
    let registry = ConnectionRegistry::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let restart_delay = file.global.restart_delay();

    let mut supervisors = JoinSet::new();
    for entry in file.enabled_connections() {
        let credentials = entry.credentials()?;
        let config = entry.to_connection_config(credentials);
        tracing::info!(connection = %config.name, mode = ?config.mode, "starting");
        supervisors.spawn(supervise(
            config,
            Arc::clone(&rest),
            registry.clone(),
            restart_delay,
            shutdown_rx.clone(),
        ));
    }

    let finished = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!("failed to listen for Ctrl-C: {}", e);
            }
            false
        }
        _ = drain(&mut supervisors) => true,
    };

    if finished {
        tracing::info!("all connections ended");
    } else {
        tracing::info!(connections = registry.len(), "shutting down");
        let _ = shutdown_tx.send(true);
        registry.close_all().await;
        if tokio::time::timeout(SHUTDOWN_GRACE, drain(&mut supervisors))
            .await
            .is_err()
        {
            tracing::warn!("connections did not close in time");
        }
    }

    Ok(())
}

async fn drain(supervisors: &mut JoinSet<()>) {
    while let Some(result) = supervisors.join_next().await {
        if let Err(e) = result {
            tracing::error!("supervisor task failed: {}", e);
        }
    }
}

/// Run one connection, restarting it after abnormal closes until shutdown
async fn supervise(
    config: ConnectionConfig,
    rest: Arc<RestClient>,
    registry: ConnectionRegistry,
    restart_delay: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            break;
        }

        match StreamConnection::start(config.clone(), LoggingHandler, Arc::clone(&rest)).await {
            Ok(handle) => {
                registry.insert(handle.sender());
                // shutdown may have raced the handshake
                if *shutdown.borrow() {
                    handle.close().await;
                }

                let cause = handle.wait().await;
                registry.remove(&config.name);
                if cause == TerminateCause::NormalClose {
                    tracing::info!(connection = %config.name, "closed");
                    break;
                }
                tracing::warn!(
                    connection = %config.name,
                    delay_ms = restart_delay.as_millis() as u64,
                    "closed abnormally, restarting"
                );
            }
            Err(StreamError::Config(msg)) => {
                tracing::error!(connection = %config.name, "invalid configuration: {}", msg);
                break;
            }
            Err(e) => {
                tracing::warn!(
                    connection = %config.name,
                    delay_ms = restart_delay.as_millis() as u64,
                    "start failed, retrying: {}",
                    e
                );
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(restart_delay) => {}
            _ = shutdown.changed() => break,
        }
    }
}
