//! Prometheus metrics HTTP endpoint
//!
//! Serves the agent counters in Prometheus text format at `/metrics` and a
//! liveness check at `/health`. Uses hyper for the HTTP server.

use crate::domain::link::LinkPhase;
use crate::infra::metrics::{Metrics, MetricsSummary};
use crate::infra::shutdown::wait_for_shutdown;
use bytes::Bytes;
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::fmt::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

fn write_metric(output: &mut String, name: &str, help: &str, kind: &str, kiosk: &str, val: i64) {
    let _ = writeln!(output, "# HELP {} {}", name, help);
    let _ = writeln!(output, "# TYPE {} {}", name, kind);
    let _ = writeln!(output, "{}{{kiosk=\"{}\"}} {}", name, kiosk, val);
}

fn format_prometheus_metrics(summary: &MetricsSummary, kiosk: &str) -> String {
    let mut output = String::with_capacity(2048);

    let counters: [(&str, &str, u64); 11] = [
        ("kiosk_card_swipes_decoded_total", "Card frames decoded to an identifier", summary.swipes_decoded),
        ("kiosk_card_swipes_emitted_total", "Card swipes forwarded to the UI", summary.swipes_emitted),
        ("kiosk_card_swipes_suppressed_total", "Repeat swipes suppressed during a session", summary.swipes_suppressed),
        ("kiosk_card_frames_missed_total", "12-byte windows without a usable frame", summary.frames_missed),
        ("kiosk_serial_open_failures_total", "Failed card reader open attempts", summary.serial_open_failures),
        ("kiosk_serial_link_lost_total", "Card reader link losses", summary.serial_link_lost),
        ("kiosk_printer_polls_total", "Successful printer status polls", summary.printer_polls),
        ("kiosk_printer_driver_failures_total", "Failed printer driver calls", summary.driver_failures),
        ("kiosk_printer_status_reports_total", "Printer status reports sent", summary.status_reports),
        ("kiosk_heartbeats_sent_total", "Heartbeats accepted by the backend", summary.heartbeats_sent),
        ("kiosk_telemetry_failures_total", "Telemetry sends that failed", summary.telemetry_failures),
    ];

    for (name, help, val) in counters {
        write_metric(&mut output, name, help, "counter", kiosk, val as i64);
    }

    write_metric(
        &mut output,
        "kiosk_serial_link_phase",
        "Card reader link phase (0=closed 1=opening 2=open 3=retrying 4=failed)",
        "gauge",
        kiosk,
        summary.link_phase as i64,
    );
    write_metric(
        &mut output,
        "kiosk_printer_last_status",
        "Last status code returned by the printer driver",
        "gauge",
        kiosk,
        summary.last_printer_status as i64,
    );

    output
}

/// Handle HTTP requests
async fn handle_request(
    req: Request<hyper::body::Incoming>,
    metrics: Arc<Metrics>,
    kiosk_id: Arc<String>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let response = match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => {
            let body = format_prometheus_metrics(&metrics.report(), &kiosk_id);
            Response::builder()
                .status(StatusCode::OK)
                .header("Content-Type", "text/plain; version=0.0.4; charset=utf-8")
                .body(Full::new(Bytes::from(body)))
        }
        (&Method::GET, "/health") => {
            // Degraded once the card reader gave up for good
            let status = if metrics.link_phase_gauge() == LinkPhase::Failed.as_gauge() {
                StatusCode::SERVICE_UNAVAILABLE
            } else {
                StatusCode::OK
            };
            Response::builder().status(status).body(Full::new(Bytes::from(
                if status.is_success() { "ok" } else { "card_reader_failed" },
            )))
        }
        _ => Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from("Not Found"))),
    };

    Ok(response.unwrap_or_else(|_| Response::new(Full::new(Bytes::new()))))
}

/// Start the Prometheus metrics HTTP server
pub async fn start_metrics_server(
    port: u16,
    metrics: Arc<Metrics>,
    kiosk_id: String,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    let kiosk_id = Arc::new(kiosk_id);

    info!(port = %port, kiosk = %kiosk_id, "prometheus_metrics_server_started");

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        let io = TokioIo::new(stream);
                        let metrics = metrics.clone();
                        let kiosk_id = kiosk_id.clone();

                        tokio::spawn(async move {
                            let service = service_fn(move |req| {
                                let metrics = metrics.clone();
                                let kiosk_id = kiosk_id.clone();
                                async move { handle_request(req, metrics, kiosk_id).await }
                            });

                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                error!(error = %e, "prometheus_http_error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "prometheus_accept_error");
                    }
                }
            }
            _ = wait_for_shutdown(&mut shutdown) => {
                info!("prometheus_metrics_server_shutdown");
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_prometheus_metrics() {
        let metrics = Metrics::new();
        metrics.record_swipe_decoded();
        metrics.record_printer_poll(-101);
        metrics.set_link_phase(LinkPhase::Retrying);

        let output = format_prometheus_metrics(&metrics.report(), "lobby-1");

        assert!(output.contains("kiosk_card_swipes_decoded_total{kiosk=\"lobby-1\"} 1"));
        assert!(output.contains("kiosk_printer_last_status{kiosk=\"lobby-1\"} -101"));
        assert!(output.contains("kiosk_serial_link_phase{kiosk=\"lobby-1\"} 3"));
        assert!(output.contains("# TYPE kiosk_heartbeats_sent_total counter"));
    }
}
