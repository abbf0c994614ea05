//! isprinklr - Irrigation zone bridge
//!
//! Serves the serial link protocol to a host controller and an HTTP control
//! API, both driving the same zone actuator.

use isprinklr_core::SimulatedController;
use isprinklr_server::http::run_http_server;
use isprinklr_server::{
    ApiState, CommandHandler, Config, LinkDriver, LinkStatus, LoggingObserver, Metrics,
    NetworkMonitor, SerialConfig, Transport,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

/// Delay between attempts to reopen the link transport.
const REOPEN_DELAY: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration (from file if ISPRINKLR_CONFIG is set, then env overrides)
    let config_path = std::env::var("ISPRINKLR_CONFIG").ok();
    let config = match Config::load() {
        Ok(c) => {
            if let Some(ref path) = config_path {
                tracing::info!("Loaded config from {}", path);
            }
            c
        }
        Err(e) => {
            // If a config file was explicitly specified, fail on error
            if config_path.is_some() {
                tracing::error!("Failed to load config: {}", e);
                return Err(e.into());
            }
            tracing::info!("Using default configuration");
            Config::from_env()
        }
    };

    if let Err(e) = config.validate() {
        tracing::error!("Configuration error: {}", e);
        return Err(e.into());
    }

    tracing::info!("Starting isprinklr");
    if config.serial.enabled {
        tracing::info!(
            "  Serial link: {} (echo={}, zones 1-{}, minutes 1-{})",
            config.serial.endpoint(),
            config.serial.checksum_echo,
            config.serial.max_zone,
            config.serial.max_minutes
        );
    } else {
        tracing::info!("  Serial link: disabled");
    }
    if config.http.enabled {
        tracing::info!("  HTTP API: {}", config.http.bind_addr);
    } else {
        tracing::info!("  HTTP API: disabled");
    }
    tracing::info!("  Network: {}", config.network.mode.label());
    tracing::debug!("Network config: {:?}", config.network);

    let actuator = Arc::new(SimulatedController::new(config.controller.max_zone)?);
    let metrics = Arc::new(Metrics::new()?);
    let link_status = Arc::new(LinkStatus::default());

    // Network monitor
    let network = Arc::new(NetworkMonitor::new(config.network.clone())?);
    network.add_observer(Arc::new(LoggingObserver));
    let network_handle = {
        let nm = network.clone();
        tokio::spawn(async move {
            nm.run().await;
        })
    };

    // Serial link driver (blocking I/O on its own thread)
    let link_shutdown = Arc::new(AtomicBool::new(false));
    let link_handle = if config.serial.enabled {
        let handler = Arc::new(
            CommandHandler::new(actuator.clone())
                .with_limits(config.serial.limits())
                .with_metrics(metrics.clone()),
        );
        let serial = config.serial.clone();
        let status = link_status.clone();
        let metrics = metrics.clone();
        let shutdown = link_shutdown.clone();
        Some(tokio::task::spawn_blocking(move || {
            run_link(&serial, handler, status, metrics, &shutdown)
        }))
    } else {
        None
    };

    // HTTP API
    let (shutdown_tx, _) = broadcast::channel(1);
    let http_handle = if config.http.enabled {
        let state = Arc::new(
            ApiState::new(actuator.clone(), config.http.limits())
                .with_metrics(metrics.clone())
                .with_network(network.clone())
                .with_link(link_status.clone()),
        );
        let addr = config.http.bind_addr;
        let shutdown_rx = shutdown_tx.subscribe();
        Some(tokio::spawn(async move {
            if let Err(e) = run_http_server(addr, state, shutdown_rx).await {
                tracing::error!("HTTP API failed: {}", e);
            }
        }))
    } else {
        None
    };

    tokio::signal::ctrl_c().await?;
    tracing::info!("Received shutdown signal, stopping...");
    link_shutdown.store(true, Ordering::SeqCst);
    network.shutdown();
    let _ = shutdown_tx.send(());

    if let Some(handle) = http_handle {
        let _ = handle.await;
    }
    if let Some(handle) = link_handle {
        let _ = handle.await;
    }
    let _ = network_handle.await;

    tracing::info!("isprinklr stopped");
    Ok(())
}

/// Keeps a link driver running over the configured transport, reopening it
/// whenever it fails or closes, until shutdown.
fn run_link(
    serial: &SerialConfig,
    handler: Arc<CommandHandler>,
    status: Arc<LinkStatus>,
    metrics: Arc<Metrics>,
    shutdown: &AtomicBool,
) {
    while !shutdown.load(Ordering::SeqCst) {
        match Transport::open(serial) {
            Ok(transport) => {
                let mut driver = LinkDriver::new(transport, handler.clone(), serial.checksum_echo)
                    .with_status(status.clone())
                    .with_metrics(metrics.clone());
                if let Err(e) = driver.run(shutdown) {
                    tracing::warn!("Link lost: {}", e);
                }
            }
            Err(e) => {
                tracing::warn!("Cannot open {}: {}", serial.endpoint(), e);
            }
        }

        // Sleep in short steps so shutdown stays responsive
        let mut waited = Duration::ZERO;
        while waited < REOPEN_DELAY && !shutdown.load(Ordering::SeqCst) {
            std::thread::sleep(serial.read_timeout());
            waited += serial.read_timeout();
        }
    }
}
