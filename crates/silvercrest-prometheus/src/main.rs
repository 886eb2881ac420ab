//! Prometheus metrics exporter for Silvercrest Wi-Fi smart plugs.
//!
//! This exporter periodically discovers (or polls a fixed list of) plugs on
//! the local network and exposes their relay state and scrape health.

use std::{
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
    time::Duration,
};

use axum::{Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use clap::Parser;
use prometheus_client::{encoding::text::encode, registry::Registry};
use silvercrest_core::{
    DEFAULT_PORT, DeviceConfig, DiscoveryConfig, DiscoveryMarker, Transport, TransportExt,
    UdpTransport,
    discover_with,
};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

mod metrics;

use metrics::{DeviceMetrics, PlugLabels};

/// Prometheus metrics exporter for Silvercrest Wi-Fi smart plugs.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// HTTP listen address
    #[arg(long, default_value = "0.0.0.0:9102")]
    listen: SocketAddr,

    /// Device polling interval in seconds
    #[arg(long, default_value = "15", value_parser = clap::value_parser!(u64).range(1..))]
    scrape_interval: u64,

    /// Discovery window in milliseconds
    #[arg(long, default_value = "3000")]
    discovery_timeout: u64,

    /// Per-plug reply timeout in milliseconds
    #[arg(long, default_value = "500")]
    command_timeout: u64,

    /// Local port to query plugs from (0 = ephemeral).
    /// Some firmware only answers requests sent from port 8530.
    #[arg(long, default_value_t = 0)]
    local_port: u16,

    /// Broadcast the alternate search command (0x25) during discovery
    #[arg(long)]
    search_alt: bool,

    /// Target specific plug addresses instead of using discovery.
    /// Can be specified multiple times.
    #[arg(long = "target", value_name = "HOST")]
    targets: Vec<String>,
}

/// Shared application state
struct AppState {
    registry: RwLock<Registry>,
    metrics: DeviceMetrics,
}

/// How plugs are found on each poll cycle.
enum PollMode {
    Discovery(DiscoveryConfig),
    Targeted(Vec<String>),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .init();
    }

    // Create metrics registry
    let mut registry = Registry::default();
    let metrics = DeviceMetrics::new(&mut registry);

    let state = Arc::new(AppState {
        registry: RwLock::new(registry),
        metrics,
    });

    let template = DeviceConfig::new(Ipv4Addr::UNSPECIFIED.to_string())
        .with_port(DEFAULT_PORT)
        .with_timeout(Duration::from_millis(cli.command_timeout))
        .with_local_port(cli.local_port);
    let mode = if cli.targets.is_empty() {
        info!("Mode: discovery (will find plugs automatically)");
        let marker = if cli.search_alt {
            DiscoveryMarker::SearchAlt
        } else {
            DiscoveryMarker::Search
        };
        PollMode::Discovery(
            DiscoveryConfig::new()
                .with_timeout(Duration::from_millis(cli.discovery_timeout))
                .with_marker(marker),
        )
    } else {
        info!("Mode: targeted ({} plugs)", cli.targets.len());
        for target in &cli.targets {
            info!("  - {}", target);
        }
        PollMode::Targeted(cli.targets.clone())
    };

    // Start background polling task
    let poll_state = Arc::clone(&state);
    let scrape_interval = Duration::from_secs(cli.scrape_interval);
    tokio::spawn(async move {
        poll_devices(poll_state, scrape_interval, template, mode).await;
    });

    // Build HTTP router
    let app = Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state);

    info!("Starting silvercrest-exporter on {}", cli.listen);
    info!("Polling interval: {}s", cli.scrape_interval);

    let listener = match tokio::net::TcpListener::bind(cli.listen).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", cli.listen, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        error!("HTTP server failed: {}", e);
        std::process::exit(1);
    }
}

/// Background task that polls plugs at regular intervals
async fn poll_devices(
    state: Arc<AppState>,
    interval: Duration,
    template: DeviceConfig,
    mode: PollMode,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        debug!("Starting poll cycle");

        let start = std::time::Instant::now();

        match &mode {
            PollMode::Discovery(config) => match discover_with(config).await {
                Ok(devices) => {
                    info!("Discovered {} plugs", devices.len());
                    state.metrics.set_devices_discovered(devices.len());

                    for device in &devices {
                        state.metrics.set_device_info(device);
                        let config = template.for_host(device.ip.to_string());
                        poll_plug(&state, config, PlugLabels::from(device)).await;
                    }
                }
                Err(e) => {
                    error!("Discovery failed: {}", e);
                    state.metrics.set_devices_discovered(0);
                }
            },
            PollMode::Targeted(targets) => {
                state.metrics.set_devices_discovered(targets.len());
                for target in targets {
                    let config = template.for_host(target.as_str());
                    poll_plug(&state, config, PlugLabels::new(target.as_str())).await;
                }
            }
        }

        let duration = start.elapsed();
        state.metrics.set_scrape_duration(duration);
        debug!("Poll cycle completed in {:?}", duration);
    }
}

/// Query one plug and record the result.
///
/// Plugs are polled one at a time, so a fixed local port never has two
/// sockets bound to it.
async fn poll_plug(state: &AppState, config: DeviceConfig, labels: PlugLabels) {
    let transport = UdpTransport::new(config);

    let relay = transport.query_state().await;
    if relay.is_known() {
        debug!("Polled {}: {}", transport.host(), relay);
    } else {
        warn!("Failed to poll {}", transport.host());
    }
    state.metrics.record_state(&labels, relay);
}

/// Index page handler
async fn index_handler() -> impl IntoResponse {
    let html = r#"<!DOCTYPE html>
<html>
<head>
    <title>Silvercrest Exporter</title>
</head>
<body>
    <h1>Silvercrest Exporter</h1>
    <p>Prometheus metrics exporter for Silvercrest Wi-Fi smart plugs.</p>
    <ul>
        <li><a href="/metrics">Metrics</a></li>
        <li><a href="/health">Health</a></li>
    </ul>
</body>
</html>"#;

    (StatusCode::OK, [("content-type", "text/html")], html)
}

/// Health check handler
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Metrics handler, returns Prometheus exposition format
async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let registry = state.registry.read().await;
    let mut buffer = String::new();

    match encode(&mut buffer, &registry) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Error encoding metrics: {}", e),
        ),
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_zero_scrape_interval_rejected() {
        assert!(Cli::try_parse_from(["silvercrest-exporter", "--scrape-interval", "0"]).is_err());
        let cli = Cli::try_parse_from(["silvercrest-exporter", "--scrape-interval", "1"]).unwrap();
        assert_eq!(cli.scrape_interval, 1);
    }

    #[test]
    fn test_local_port_option() {
        let cli = Cli::try_parse_from(["silvercrest-exporter", "--local-port", "8530"]).unwrap();
        assert_eq!(cli.local_port, 8530);
        let cli = Cli::try_parse_from(["silvercrest-exporter"]).unwrap();
        assert_eq!(cli.local_port, 0);
    }
}
