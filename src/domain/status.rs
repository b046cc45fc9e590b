//! Printer status samples and hysteresis classification

use chrono::{DateTime, Utc};

/// Driver status code for a hard printer error
pub const SENTINEL_ERROR: i32 = -101;

/// Driver status code for an idle printer
pub const STATUS_IDLE: i32 = 0;

/// Consecutive sentinel errors required before a report
const ERROR_REPORT_THRESHOLD: u32 = 5;

/// Number of consecutive idle samples that are each reported
const ZERO_REPORT_LIMIT: u32 = 5;

/// One poll result from the printer driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusSample {
    pub code: i32,
    pub observed_at: DateTime<Utc>,
}

impl StatusSample {
    pub fn new(code: i32) -> Self {
        Self { code, observed_at: Utc::now() }
    }
}

/// Hysteresis counters over consecutive printer status samples.
///
/// Owned by a single monitor; never shared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusClassifier {
    consecutive_error_count: u32,
    consecutive_zero_count: u32,
    last_reported_status: Option<i32>,
}

impl StatusClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sample and return whether it should be reported.
    pub fn observe(&mut self, code: i32) -> bool {
        let report = match code {
            SENTINEL_ERROR => {
                self.consecutive_error_count += 1;
                self.consecutive_zero_count = 0;
                if self.consecutive_error_count >= ERROR_REPORT_THRESHOLD {
                    self.consecutive_error_count = 0;
                    true
                } else {
                    false
                }
            }
            STATUS_IDLE => {
                self.consecutive_zero_count = self.consecutive_zero_count.saturating_add(1);
                self.consecutive_error_count = 0;
                self.consecutive_zero_count <= ZERO_REPORT_LIMIT
            }
            other => {
                self.consecutive_error_count = 0;
                self.consecutive_zero_count = 0;
                self.last_reported_status != Some(other)
            }
        };

        // Tracks the last observed code, reported or not
        self.last_reported_status = Some(code);
        report
    }

    pub fn consecutive_error_count(&self) -> u32 {
        self.consecutive_error_count
    }

    pub fn consecutive_zero_count(&self) -> u32 {
        self.consecutive_zero_count
    }

    pub fn last_reported_status(&self) -> Option<i32> {
        self.last_reported_status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reports(classifier: &mut StatusClassifier, codes: &[i32]) -> Vec<bool> {
        codes.iter().map(|&c| classifier.observe(c)).collect()
    }

    #[test]
    fn test_sentinel_reported_on_fifth_sample() {
        let mut c = StatusClassifier::new();
        let out = reports(&mut c, &[SENTINEL_ERROR; 5]);
        assert_eq!(out, vec![false, false, false, false, true]);
        assert_eq!(c.consecutive_error_count(), 0);
        assert_eq!(c.consecutive_zero_count(), 0);
    }

    #[test]
    fn test_sentinel_streak_reports_every_fifth() {
        let mut c = StatusClassifier::new();
        let out = reports(&mut c, &[SENTINEL_ERROR; 10]);
        assert_eq!(out.iter().filter(|r| **r).count(), 2);
        assert!(out[4] && out[9]);
    }

    #[test]
    fn test_sentinel_glitch_suppressed() {
        let mut c = StatusClassifier::new();
        let out = reports(&mut c, &[SENTINEL_ERROR, SENTINEL_ERROR, 0, SENTINEL_ERROR]);
        assert_eq!(out, vec![false, false, true, false]);
        assert_eq!(c.consecutive_error_count(), 1);
    }

    #[test]
    fn test_idle_reported_first_five_times() {
        let mut c = StatusClassifier::new();
        c.observe(7);
        let out = reports(&mut c, &[STATUS_IDLE; 7]);
        assert_eq!(out, vec![true, true, true, true, true, false, false]);
        assert_eq!(c.consecutive_zero_count(), 7);
    }

    #[test]
    fn test_idle_streak_restarts_after_change() {
        let mut c = StatusClassifier::new();
        reports(&mut c, &[STATUS_IDLE; 6]);
        assert!(c.observe(3));
        assert!(c.observe(STATUS_IDLE));
        assert_eq!(c.consecutive_zero_count(), 1);
    }

    #[test]
    fn test_vendor_code_reported_on_change_only() {
        let mut c = StatusClassifier::new();
        c.observe(STATUS_IDLE);
        assert!(c.observe(5));
        assert!(!c.observe(5));
        assert!(c.observe(6));
        assert_eq!(c.last_reported_status(), Some(6));
    }

    #[test]
    fn test_last_status_tracks_unreported_samples() {
        let mut c = StatusClassifier::new();
        assert!(!c.observe(SENTINEL_ERROR));
        assert_eq!(c.last_reported_status(), Some(SENTINEL_ERROR));
        // First vendor code after an unreported sentinel still differs
        assert!(c.observe(4));
    }
}
