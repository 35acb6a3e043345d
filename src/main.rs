//! dyson-exporter binary: wires config, poller and HTTP server together

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dyson_exporter::api::{self, ExporterState};
use dyson_exporter::cli::Args;
use dyson_exporter::device::{DeviceClient, HttpDeviceClient};
use dyson_exporter::metrics::{dyson, MetricsRegistry};
use dyson_exporter::poller::StatePoller;
use dyson_exporter::{shutdown, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("dyson_exporter={},tower_http=info", args.log_level).into()
            }),
        )
        .init();

    tracing::info!("Starting dyson-exporter {}...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = Config::load(&args.config)
        .with_context(|| format!("could not load {}", args.config.display()))?;
    config.apply_args(&args);
    tracing::info!("Configuration loaded");

    let client: Arc<dyn DeviceClient> = Arc::new(
        HttpDeviceClient::new(&config.device).context("could not create device client")?,
    );
    tracing::info!("Device gateway: {}", config.device.base_url()?);

    let registry = Arc::new(MetricsRegistry::with_catalogue(dyson::CATALOGUE));

    // Bind before starting the poller so a taken port fails fast
    let addr = config.exporter.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("could not bind {}", addr))?;
    tracing::info!("Listening on {}", addr);

    // Start the state poller
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poller = Arc::new(StatePoller::new(
        client,
        registry.clone(),
        config.device.poll_interval(),
        config.exporter.only_active_devices,
    ));
    let poller_handle = tokio::spawn(poller.start(shutdown_rx));

    let app = api::app(ExporterState::new(registry));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown::shutdown_signal())
        .await?;

    shutdown::stop_poller(shutdown_tx, poller_handle, shutdown::POLLER_GRACE).await;
    tracing::info!("Shutdown complete");

    Ok(())
}
