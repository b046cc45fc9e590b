//! Printer status monitor
//!
//! Polls the printer driver on a fixed interval, runs every sample through
//! the [`StatusClassifier`] hysteresis and forwards reportable codes to the
//! [`TelemetryReporter`].
//!
//! Each cycle does close → open → query → close so a printer that was power
//! cycled or re-plugged is picked up on the next poll. The driver calls block,
//! so the cycle runs on the blocking pool with the driver behind a mutex.
//! The loop is self-pacing: the next cycle is scheduled only after the
//! previous one, including its report, has finished.

use crate::domain::errors::DriverError;
use crate::domain::ports::{OpenParams, PrinterDriver};
use crate::domain::status::{StatusClassifier, StatusSample};
use crate::infra::metrics::Metrics;
use crate::infra::shutdown::sleep_or_shutdown;
use crate::io::telemetry_http::TelemetryTransport;
use crate::services::telemetry::TelemetryReporter;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

pub struct DeviceStatusMonitor<D, T> {
    driver: Arc<Mutex<D>>,
    open_params: OpenParams,
    poll_interval: Duration,
    classifier: StatusClassifier,
    reporter: Arc<TelemetryReporter<T>>,
    metrics: Arc<Metrics>,
}

impl<D, T> DeviceStatusMonitor<D, T>
where
    D: PrinterDriver + 'static,
    T: TelemetryTransport,
{
    pub fn new(
        driver: D,
        open_params: OpenParams,
        poll_interval: Duration,
        reporter: Arc<TelemetryReporter<T>>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            driver: Arc::new(Mutex::new(driver)),
            open_params,
            poll_interval,
            classifier: StatusClassifier::new(),
            reporter,
            metrics,
        }
    }

    pub fn classifier(&self) -> &StatusClassifier {
        &self.classifier
    }

    /// Run one close/open/query/close cycle against the driver
    pub async fn poll_once(&self) -> Result<StatusSample, DriverError> {
        let driver = self.driver.clone();
        let params = self.open_params.clone();

        let code = tokio::task::spawn_blocking(move || {
            let mut driver = driver.lock();
            query_fresh(&mut *driver, &params)
        })
        .await
        .map_err(|e| DriverError::Aborted(e.to_string()))??;

        Ok(StatusSample::new(code))
    }

    /// Poll, classify and report at most once. Returns the sample if the
    /// driver produced one.
    pub async fn run_cycle(&mut self) -> Option<StatusSample> {
        let sample = match self.poll_once().await {
            Ok(sample) => sample,
            Err(e) => {
                // Counters are left as they were; the next cycle tries again
                self.metrics.record_driver_failure();
                warn!(error = %e, "printer_poll_failed");
                return None;
            }
        };

        self.metrics.record_printer_poll(sample.code);
        let report = self.classifier.observe(sample.code);

        debug!(
            printer_status = %sample.code,
            report = %report,
            consecutive_errors = %self.classifier.consecutive_error_count(),
            consecutive_zeros = %self.classifier.consecutive_zero_count(),
            "printer_status_polled"
        );

        if report {
            self.reporter.report_printer_status(sample.code).await;
        }

        Some(sample)
    }

    /// Poll until shutdown
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            poll_interval_ms = %self.poll_interval.as_millis(),
            device_index = %self.open_params.device_index,
            "printer_monitor_started"
        );

        loop {
            self.run_cycle().await;
            if sleep_or_shutdown(self.poll_interval, &mut shutdown).await {
                break;
            }
        }

        // Leave the device released on the way out
        let driver = self.driver.clone();
        let closed = tokio::task::spawn_blocking(move || {
            let mut driver = driver.lock();
            driver.close()
        })
        .await;
        if let Ok(Err(e)) = closed {
            debug!(error = %e, "printer_close_on_shutdown_failed");
        }

        info!("printer_monitor_stopped");
    }
}

/// Close any stale handle, open, query, then close again
fn query_fresh<D: PrinterDriver + ?Sized>(
    driver: &mut D,
    params: &OpenParams,
) -> Result<i32, DriverError> {
    // Nothing may be open yet
    if let Err(e) = driver.close() {
        debug!(error = %e, "printer_close_before_open_failed");
    }

    let open_code = driver.open(params)?;
    debug!(open_code = %open_code, "printer_opened");

    let status = driver.query_status();

    if let Err(e) = driver.close() {
        debug!(error = %e, "printer_close_after_query_failed");
    }

    status
}
