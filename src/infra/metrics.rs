//! Lock-free metrics collection and periodic reporting
//!
//! Counters are monotonic; the periodic summary reports totals plus the
//! delta since the previous report.
//!
//! NOTE: All atomics use Relaxed ordering intentionally. These are statistical
//! counters only and must not drive control flow.

use crate::domain::link::LinkPhase;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Lock-free metrics collector shared by the agent tasks
pub struct Metrics {
    swipes_decoded: AtomicU64,
    swipes_emitted: AtomicU64,
    swipes_suppressed: AtomicU64,
    frames_missed: AtomicU64,
    serial_open_failures: AtomicU64,
    serial_link_lost: AtomicU64,
    link_phase: AtomicU64,
    printer_polls: AtomicU64,
    driver_failures: AtomicU64,
    last_printer_status: AtomicU64,
    status_reports: AtomicU64,
    heartbeats_sent: AtomicU64,
    telemetry_failures: AtomicU64,
    /// Polls at last report, for the rate calculation
    polls_at_last_report: AtomicU64,
    started_at: Instant,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            swipes_decoded: AtomicU64::new(0),
            swipes_emitted: AtomicU64::new(0),
            swipes_suppressed: AtomicU64::new(0),
            frames_missed: AtomicU64::new(0),
            serial_open_failures: AtomicU64::new(0),
            serial_link_lost: AtomicU64::new(0),
            link_phase: AtomicU64::new(LinkPhase::Closed.as_gauge()),
            printer_polls: AtomicU64::new(0),
            driver_failures: AtomicU64::new(0),
            last_printer_status: AtomicU64::new(0),
            status_reports: AtomicU64::new(0),
            heartbeats_sent: AtomicU64::new(0),
            telemetry_failures: AtomicU64::new(0),
            polls_at_last_report: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    #[inline]
    pub fn record_swipe_decoded(&self) {
        self.swipes_decoded.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_swipe_emitted(&self) {
        self.swipes_emitted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_swipe_suppressed(&self) {
        self.swipes_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_frame_missed(&self) {
        self.frames_missed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_serial_open_failure(&self) {
        self.serial_open_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_serial_link_lost(&self) {
        self.serial_link_lost.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_link_phase(&self, phase: LinkPhase) {
        self.link_phase.store(phase.as_gauge(), Ordering::Relaxed);
    }

    /// Record a successful printer poll with the observed code
    pub fn record_printer_poll(&self, code: i32) {
        self.printer_polls.fetch_add(1, Ordering::Relaxed);
        // Stored as the raw bit pattern so negative codes survive the round trip
        self.last_printer_status.store(code as u32 as u64, Ordering::Relaxed);
    }

    pub fn record_driver_failure(&self) {
        self.driver_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_status_report(&self) {
        self.status_reports.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_heartbeat_sent(&self) {
        self.heartbeats_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_telemetry_failure(&self) {
        self.telemetry_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn link_phase_gauge(&self) -> u64 {
        self.link_phase.load(Ordering::Relaxed)
    }

    pub fn last_printer_status(&self) -> i32 {
        self.last_printer_status.load(Ordering::Relaxed) as u32 as i32
    }

    /// Snapshot all counters
    pub fn report(&self) -> MetricsSummary {
        let printer_polls = self.printer_polls.load(Ordering::Relaxed);
        let polls_since_report =
            printer_polls.saturating_sub(self.polls_at_last_report.swap(printer_polls, Ordering::Relaxed));

        MetricsSummary {
            uptime_secs: self.started_at.elapsed().as_secs(),
            swipes_decoded: self.swipes_decoded.load(Ordering::Relaxed),
            swipes_emitted: self.swipes_emitted.load(Ordering::Relaxed),
            swipes_suppressed: self.swipes_suppressed.load(Ordering::Relaxed),
            frames_missed: self.frames_missed.load(Ordering::Relaxed),
            serial_open_failures: self.serial_open_failures.load(Ordering::Relaxed),
            serial_link_lost: self.serial_link_lost.load(Ordering::Relaxed),
            link_phase: self.link_phase_gauge(),
            printer_polls,
            polls_since_report,
            driver_failures: self.driver_failures.load(Ordering::Relaxed),
            last_printer_status: self.last_printer_status(),
            status_reports: self.status_reports.load(Ordering::Relaxed),
            heartbeats_sent: self.heartbeats_sent.load(Ordering::Relaxed),
            telemetry_failures: self.telemetry_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of the agent counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSummary {
    pub uptime_secs: u64,
    pub swipes_decoded: u64,
    pub swipes_emitted: u64,
    pub swipes_suppressed: u64,
    pub frames_missed: u64,
    pub serial_open_failures: u64,
    pub serial_link_lost: u64,
    pub link_phase: u64,
    pub printer_polls: u64,
    pub polls_since_report: u64,
    pub driver_failures: u64,
    pub last_printer_status: i32,
    pub status_reports: u64,
    pub heartbeats_sent: u64,
    pub telemetry_failures: u64,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            uptime_secs = %self.uptime_secs,
            swipes_decoded = %self.swipes_decoded,
            swipes_emitted = %self.swipes_emitted,
            swipes_suppressed = %self.swipes_suppressed,
            frames_missed = %self.frames_missed,
            serial_open_failures = %self.serial_open_failures,
            serial_link_lost = %self.serial_link_lost,
            link_phase = %self.link_phase,
            printer_polls = %self.printer_polls,
            polls_since_report = %self.polls_since_report,
            driver_failures = %self.driver_failures,
            last_printer_status = %self.last_printer_status,
            status_reports = %self.status_reports,
            heartbeats_sent = %self.heartbeats_sent,
            telemetry_failures = %self.telemetry_failures,
            "metrics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_and_summary() {
        let metrics = Metrics::new();
        metrics.record_swipe_decoded();
        metrics.record_swipe_emitted();
        metrics.record_frame_missed();
        metrics.record_heartbeat_sent();
        metrics.record_telemetry_failure();
        metrics.set_link_phase(LinkPhase::Open);

        let summary = metrics.report();
        assert_eq!(summary.swipes_decoded, 1);
        assert_eq!(summary.swipes_emitted, 1);
        assert_eq!(summary.frames_missed, 1);
        assert_eq!(summary.heartbeats_sent, 1);
        assert_eq!(summary.telemetry_failures, 1);
        assert_eq!(summary.link_phase, LinkPhase::Open.as_gauge());
    }

    #[test]
    fn test_negative_printer_status_preserved() {
        let metrics = Metrics::new();
        metrics.record_printer_poll(-101);
        assert_eq!(metrics.last_printer_status(), -101);
        metrics.record_printer_poll(5);
        assert_eq!(metrics.last_printer_status(), 5);
    }

    #[test]
    fn test_polls_since_report_resets() {
        let metrics = Metrics::new();
        metrics.record_printer_poll(0);
        metrics.record_printer_poll(0);
        assert_eq!(metrics.report().polls_since_report, 2);
        metrics.record_printer_poll(0);
        let summary = metrics.report();
        assert_eq!(summary.polls_since_report, 1);
        assert_eq!(summary.printer_polls, 3);
    }
}
