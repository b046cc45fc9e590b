//! Mock kiosk backend
//!
//! Accepts `POST /kiosk/update/time` and logs each heartbeat or printer
//! status report, so the agent can be run against a local endpoint.
//!
//! Usage:
//!   cargo run --bin mock-backend -- --port 8088 --reject-every 0
//!
//! Then point the agent at it with `[telemetry] base_url = "http://127.0.0.1:8088"`.

use bytes::Bytes;
use clap::Parser;
use http_body_util::{BodyExt, Full};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mock-backend")]
#[command(about = "Mock kiosk backend for local runs of the agent")]
struct Args {
    /// HTTP port to listen on
    #[arg(short, long, default_value = "8088")]
    port: u16,

    /// Answer every Nth update with 503 (0 = never)
    #[arg(long, default_value = "0")]
    reject_every: u64,
}

#[derive(Default)]
struct Counters {
    updates: AtomicU64,
    heartbeats: AtomicU64,
    status_reports: AtomicU64,
}

fn respond(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    counters: Arc<Counters>,
    reject_every: u64,
) -> Result<Response<Full<Bytes>>, Infallible> {
    if req.method() != Method::POST || req.uri().path() != "/kiosk/update/time" {
        return Ok(respond(StatusCode::NOT_FOUND, "Not Found"));
    }

    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(error = %e, "body_read_failed");
            return Ok(respond(StatusCode::BAD_REQUEST, "unreadable body"));
        }
    };

    let update: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "invalid_update_json");
            return Ok(respond(StatusCode::BAD_REQUEST, "invalid json"));
        }
    };

    let n = counters.updates.fetch_add(1, Ordering::Relaxed) + 1;
    if reject_every > 0 && n % reject_every == 0 {
        warn!(update_no = %n, "update_rejected");
        return Ok(respond(StatusCode::SERVICE_UNAVAILABLE, "rejected"));
    }

    let kiosk_id = update.get("kioskId").and_then(|v| v.as_str()).unwrap_or("?");
    match update.get("printerStatus").and_then(|v| v.as_i64()) {
        Some(printer_status) => {
            let reports = counters.status_reports.fetch_add(1, Ordering::Relaxed) + 1;
            info!(kiosk = %kiosk_id, printer_status = %printer_status, reports = %reports, "printer_status");
        }
        None => {
            let heartbeats = counters.heartbeats.fetch_add(1, Ordering::Relaxed) + 1;
            info!(kiosk = %kiosk_id, heartbeats = %heartbeats, "heartbeat");
        }
    }

    Ok(respond(StatusCode::OK, "ok"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    let args = Args::parse();
    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));
    let listener = TcpListener::bind(addr).await?;
    let counters = Arc::new(Counters::default());
    let reject_every = args.reject_every;

    info!(addr = %addr, reject_every = %reject_every, "mock_backend_listening");

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, _peer) = match result {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        error!(error = %e, "accept_error");
                        continue;
                    }
                };
                let io = TokioIo::new(stream);
                let counters = counters.clone();

                tokio::spawn(async move {
                    let service = service_fn(move |req| {
                        let counters = counters.clone();
                        async move { handle_request(req, counters, reject_every).await }
                    });

                    if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                        error!(error = %e, "http_connection_error");
                    }
                });
            }
            _ = tokio::signal::ctrl_c() => {
                info!(
                    updates = %counters.updates.load(Ordering::Relaxed),
                    heartbeats = %counters.heartbeats.load(Ordering::Relaxed),
                    status_reports = %counters.status_reports.load(Ordering::Relaxed),
                    "mock_backend_shutdown"
                );
                return Ok(());
            }
        }
    }
}
