//! Kiosk device agent
//!
//! Background process next to the kiosk UI. Watches the RFID card reader on a
//! serial port, polls the receipt printer through its vendor driver, and keeps
//! the backend informed with heartbeats and printer status reports.
//!
//! Module structure:
//! - `domain/` - Card frames, link state machine, status hysteresis, ports
//! - `io/` - Serial, printer driver, HTTP telemetry, UI host pipe
//! - `services/` - Link manager, status monitor, telemetry reporter
//! - `infra/` - Config, metrics, shutdown
//!
//! stdout carries the UI host protocol, so all logging goes to stderr.

use clap::Parser;
use kiosk_agent::infra::{Config, Metrics};
use kiosk_agent::io::host_pipe::run_host_pipe;
use kiosk_agent::io::{create_ui_channel, driver_from_config, HttpTransport, SessionFlag, TokioSerialConnector};
use kiosk_agent::services::{DeviceStatusMonitor, LinkSinks, SerialLinkManager, TelemetryReporter};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Kiosk device agent - card reader, printer status and heartbeat
#[derive(Parser, Debug)]
#[command(name = "kiosk-agent", version, about)]
struct Args {
    /// Path to TOML configuration file (falls back to CONFIG_FILE, then config/kiosk.toml)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // RUST_LOG overrides the default INFO level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "kiosk-agent starting");

    let args = Args::parse();
    let config_path = Config::resolve_config_path(args.config);
    let config = Config::load_from_path(&config_path);

    info!(
        config_file = %config.config_file(),
        kiosk_id = %config.kiosk_id(),
        mode = %config.mode().as_str(),
        serial_device = %config.serial_device(),
        serial_baud = %config.serial_baud(),
        printer_poll_ms = %config.printer_poll_interval().as_millis(),
        heartbeat_ms = %config.heartbeat_interval().as_millis(),
        telemetry_url = %config.telemetry_update_url(),
        login_url = %config.login_url(),
        prometheus_port = %config.prometheus_port(),
        "config_loaded"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let metrics = Arc::new(Metrics::new());

    // UI host bridge over stdio
    let (ui_bridge, ui_rx) = create_ui_channel(64);
    let (session_flag, session_tx) = SessionFlag::new();
    let pipe_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        run_host_pipe(tokio::io::stdin(), tokio::io::stdout(), ui_rx, session_tx, pipe_shutdown).await;
    });

    // Telemetry: one reporter shared by the heartbeat and the printer monitor
    let transport = HttpTransport::new(&config)?;
    let reporter = Arc::new(TelemetryReporter::new(
        config.kiosk_id(),
        transport,
        config.heartbeat_interval(),
        metrics.clone(),
    ));

    let heartbeat = reporter.clone();
    let heartbeat_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        heartbeat.run_heartbeat(heartbeat_shutdown).await;
    });

    // Printer monitor (skipped when no driver is available in this build)
    match driver_from_config(&config) {
        Ok(driver) => {
            let monitor = DeviceStatusMonitor::new(
                driver,
                config.printer_open_params(),
                config.printer_poll_interval(),
                reporter.clone(),
                metrics.clone(),
            );
            let monitor_shutdown = shutdown_rx.clone();
            tokio::spawn(async move {
                monitor.run(monitor_shutdown).await;
            });
        }
        Err(e) => {
            warn!(error = %e, driver = ?config.printer_driver(), "printer_monitor_disabled");
        }
    }

    // Prometheus metrics HTTP server (if port > 0)
    let prometheus_port = config.prometheus_port();
    if prometheus_port > 0 {
        let prom_metrics = metrics.clone();
        let prom_kiosk = config.kiosk_id().to_string();
        let prom_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            if let Err(e) = kiosk_agent::io::prometheus::start_metrics_server(
                prometheus_port,
                prom_metrics,
                prom_kiosk,
                prom_shutdown,
            )
            .await
            {
                error!(error = %e, "prometheus_metrics_server_error");
            }
        });
    }

    // Periodic metrics summary
    let metrics_reporter = metrics.clone();
    let metrics_interval = config.metrics_interval_secs().max(1);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(metrics_interval));
        // First tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            metrics_reporter.report().log();
        }
    });

    // Handle shutdown on Ctrl+C
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_tx.send(true);
    });

    // Card reader link runs on the main task until shutdown
    let ui_bridge = Arc::new(ui_bridge);
    let sinks = LinkSinks {
        alerts: ui_bridge.clone(),
        session: Arc::new(session_flag),
        navigation: ui_bridge,
    };
    let connector = TokioSerialConnector::new(&config);
    let link = SerialLinkManager::new(&config, connector, sinks, metrics.clone());
    let final_state = link.run(shutdown_rx).await;

    metrics.report().log();
    info!(link_phase = final_state.phase().as_str(), "kiosk-agent shutdown complete");
    Ok(())
}
