//! Telemetry reporter - heartbeats and printer status reports
//!
//! Every send is a single attempt. Failures are logged and counted but never
//! retried and never stop the caller; the next heartbeat tick or status
//! change produces a fresh update anyway.

use crate::domain::telemetry::KioskUpdate;
use crate::infra::metrics::Metrics;
use crate::infra::shutdown::sleep_or_shutdown;
use crate::io::telemetry_http::TelemetryTransport;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

pub struct TelemetryReporter<T> {
    kiosk_id: String,
    transport: T,
    heartbeat_interval: Duration,
    metrics: Arc<Metrics>,
}

impl<T: TelemetryTransport> TelemetryReporter<T> {
    pub fn new(
        kiosk_id: impl Into<String>,
        transport: T,
        heartbeat_interval: Duration,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self { kiosk_id: kiosk_id.into(), transport, heartbeat_interval, metrics }
    }

    /// Send one heartbeat. Returns whether the backend accepted it.
    pub async fn send_heartbeat(&self) -> bool {
        let delivered = self.send(KioskUpdate::heartbeat(&self.kiosk_id)).await;
        if delivered {
            self.metrics.record_heartbeat_sent();
        }
        delivered
    }

    /// Send one printer status report. Returns whether the backend accepted it.
    pub async fn report_printer_status(&self, code: i32) -> bool {
        let delivered = self.send(KioskUpdate::printer_status(&self.kiosk_id, code)).await;
        if delivered {
            self.metrics.record_status_report();
            info!(kiosk = %self.kiosk_id, printer_status = %code, "printer_status_reported");
        }
        delivered
    }

    async fn send(&self, update: KioskUpdate) -> bool {
        match self.transport.post_update(&update).await {
            Ok(()) => {
                debug!(kiosk = %self.kiosk_id, kind = update.kind(), "telemetry_sent");
                true
            }
            Err(e) => {
                self.metrics.record_telemetry_failure();
                warn!(
                    kiosk = %self.kiosk_id,
                    kind = update.kind(),
                    error = %e,
                    "telemetry_send_failed"
                );
                false
            }
        }
    }

    /// Send a heartbeat immediately, then once per interval until shutdown.
    ///
    /// Each send finishes before the next interval starts, so a slow backend
    /// stretches the cadence instead of piling up requests.
    pub async fn run_heartbeat(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            kiosk = %self.kiosk_id,
            interval_ms = %self.heartbeat_interval.as_millis(),
            "heartbeat_started"
        );

        loop {
            self.send_heartbeat().await;
            if sleep_or_shutdown(self.heartbeat_interval, &mut shutdown).await {
                break;
            }
        }

        info!(kiosk = %self.kiosk_id, "heartbeat_stopped");
    }
}
