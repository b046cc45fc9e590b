//! Card reader link state machine
//!
//! `LinkState` is mutated only through [`LinkState::apply`], which consumes one
//! [`LinkEvent`] at a time and returns the side effects the caller must carry
//! out. Keeping the transitions free of I/O lets the retry policy be tested
//! without a serial port.
//!
//! ```text
//! Closed --Start--> Opening --OpenSucceeded--> Open
//!                      |                         |
//!                 OpenFailed                 LinkLost
//!                      v                         v
//!                   Retrying <-------------------+
//!                      |  \--(retry_count >= max)--> Failed (terminal)
//!                 RetryElapsed
//!                      v
//!                   Opening
//! ```

use smallvec::{smallvec, SmallVec};
use std::time::Duration;

/// Consecutive failures after which the link gives up for the process lifetime
pub const MAX_RETRY: u32 = 500;

/// Fixed delay between a failure and the next open attempt
pub const RETRY_DELAY: Duration = Duration::from_millis(5000);

/// Lifecycle phase of the card reader link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkPhase {
    Closed,
    Opening,
    Open,
    Retrying,
    Failed,
}

impl LinkPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkPhase::Closed => "closed",
            LinkPhase::Opening => "opening",
            LinkPhase::Open => "open",
            LinkPhase::Retrying => "retrying",
            LinkPhase::Failed => "failed",
        }
    }

    /// Numeric value for the metrics gauge
    pub fn as_gauge(&self) -> u64 {
        match self {
            LinkPhase::Closed => 0,
            LinkPhase::Opening => 1,
            LinkPhase::Open => 2,
            LinkPhase::Retrying => 3,
            LinkPhase::Failed => 4,
        }
    }
}

/// Inputs to the link state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// Agent start
    Start,
    /// The scheduled retry delay has passed
    RetryElapsed,
    OpenSucceeded,
    OpenFailed,
    /// The open link reported close or error
    LinkLost,
    /// The alert banner could not be delivered to the UI
    AlertUndelivered,
}

/// Side effects requested by a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkAction {
    /// Attempt to open the device now
    Open,
    /// Show the connection-failure alert
    ShowAlert,
    ClearAlert,
    /// Feed `RetryElapsed` back after the delay
    ScheduleRetry(Duration),
    /// Retries are exhausted; nothing more will be scheduled
    GiveUp,
}

pub type LinkActions = SmallVec<[LinkAction; 2]>;

/// Retry limits for the link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub delay: Duration,
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { delay: RETRY_DELAY, max_retries: MAX_RETRY }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkState {
    phase: LinkPhase,
    retry_count: u32,
    /// At most one alert is shown per failure episode
    alert_active: bool,
    policy: RetryPolicy,
}

impl Default for LinkState {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl LinkState {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { phase: LinkPhase::Closed, retry_count: 0, alert_active: false, policy }
    }

    pub fn phase(&self) -> LinkPhase {
        self.phase
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn alert_active(&self) -> bool {
        self.alert_active
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn is_failed(&self) -> bool {
        self.phase == LinkPhase::Failed
    }

    /// Apply one event and return the actions to perform.
    ///
    /// Events that do not apply to the current phase are ignored and yield no
    /// actions. `Failed` ignores everything except alert bookkeeping.
    pub fn apply(&mut self, event: LinkEvent) -> LinkActions {
        match (self.phase, event) {
            // The next failure in this episode shows the banner again
            (_, LinkEvent::AlertUndelivered) => {
                self.alert_active = false;
                SmallVec::new()
            }
            (LinkPhase::Closed, LinkEvent::Start)
            | (LinkPhase::Retrying, LinkEvent::RetryElapsed) => {
                self.phase = LinkPhase::Opening;
                smallvec![LinkAction::Open]
            }
            (LinkPhase::Opening, LinkEvent::OpenSucceeded) => {
                self.phase = LinkPhase::Open;
                self.retry_count = 0;
                if self.alert_active {
                    self.alert_active = false;
                    smallvec![LinkAction::ClearAlert]
                } else {
                    SmallVec::new()
                }
            }
            (LinkPhase::Opening, LinkEvent::OpenFailed) | (LinkPhase::Open, LinkEvent::LinkLost) => {
                self.fail()
            }
            _ => SmallVec::new(),
        }
    }

    fn fail(&mut self) -> LinkActions {
        let mut actions = LinkActions::new();

        if !self.alert_active {
            self.alert_active = true;
            actions.push(LinkAction::ShowAlert);
        }

        self.retry_count = self.retry_count.saturating_add(1);

        if self.retry_count >= self.policy.max_retries {
            self.phase = LinkPhase::Failed;
            actions.push(LinkAction::GiveUp);
        } else {
            self.phase = LinkPhase::Retrying;
            actions.push(LinkAction::ScheduleRetry(self.policy.delay));
        }

        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opened() -> LinkState {
        let mut state = LinkState::default();
        state.apply(LinkEvent::Start);
        state.apply(LinkEvent::OpenSucceeded);
        state
    }

    #[test]
    fn test_start_then_open() {
        let mut state = LinkState::default();
        assert_eq!(state.phase(), LinkPhase::Closed);

        assert_eq!(state.apply(LinkEvent::Start).as_slice(), &[LinkAction::Open]);
        assert_eq!(state.phase(), LinkPhase::Opening);

        assert!(state.apply(LinkEvent::OpenSucceeded).is_empty());
        assert_eq!(state.phase(), LinkPhase::Open);
        assert_eq!(state.retry_count(), 0);
    }

    #[test]
    fn test_open_failure_raises_alert_once() {
        let mut state = LinkState::default();
        state.apply(LinkEvent::Start);

        let actions = state.apply(LinkEvent::OpenFailed);
        assert_eq!(
            actions.as_slice(),
            &[LinkAction::ShowAlert, LinkAction::ScheduleRetry(RETRY_DELAY)]
        );
        assert_eq!(state.phase(), LinkPhase::Retrying);
        assert_eq!(state.retry_count(), 1);
        assert!(state.alert_active());

        assert_eq!(state.apply(LinkEvent::RetryElapsed).as_slice(), &[LinkAction::Open]);
        let actions = state.apply(LinkEvent::OpenFailed);
        assert_eq!(actions.as_slice(), &[LinkAction::ScheduleRetry(RETRY_DELAY)]);
        assert_eq!(state.retry_count(), 2);
    }

    #[test]
    fn test_undelivered_alert_is_shown_on_next_failure() {
        let mut state = LinkState::default();
        state.apply(LinkEvent::Start);
        state.apply(LinkEvent::OpenFailed);
        assert!(state.alert_active());

        assert!(state.apply(LinkEvent::AlertUndelivered).is_empty());
        assert!(!state.alert_active());
        assert_eq!(state.phase(), LinkPhase::Retrying);
        assert_eq!(state.retry_count(), 1);

        state.apply(LinkEvent::RetryElapsed);
        let actions = state.apply(LinkEvent::OpenFailed);
        assert_eq!(
            actions.as_slice(),
            &[LinkAction::ShowAlert, LinkAction::ScheduleRetry(RETRY_DELAY)]
        );
        assert!(state.alert_active());

        // Nothing to clear on reconnect once delivery failed for good
        state.apply(LinkEvent::AlertUndelivered);
        state.apply(LinkEvent::RetryElapsed);
        assert!(state.apply(LinkEvent::OpenSucceeded).is_empty());
    }

    #[test]
    fn test_successful_open_resets_count_and_clears_alert() {
        let mut state = LinkState::default();
        state.apply(LinkEvent::Start);
        for _ in 0..3 {
            state.apply(LinkEvent::OpenFailed);
            state.apply(LinkEvent::RetryElapsed);
        }
        assert_eq!(state.retry_count(), 3);

        let actions = state.apply(LinkEvent::OpenSucceeded);
        assert_eq!(actions.as_slice(), &[LinkAction::ClearAlert]);
        assert_eq!(state.retry_count(), 0);
        assert!(!state.alert_active());
    }

    #[test]
    fn test_link_lost_uses_retry_path() {
        let mut state = opened();

        let actions = state.apply(LinkEvent::LinkLost);
        assert_eq!(
            actions.as_slice(),
            &[LinkAction::ShowAlert, LinkAction::ScheduleRetry(RETRY_DELAY)]
        );
        assert_eq!(state.phase(), LinkPhase::Retrying);
        assert_eq!(state.retry_count(), 1);
    }

    #[test]
    fn test_fails_on_500th_consecutive_failure() {
        let mut state = LinkState::default();
        state.apply(LinkEvent::Start);

        let mut alerts = 0;
        for attempt in 1..MAX_RETRY {
            let actions = state.apply(LinkEvent::OpenFailed);
            alerts += actions.iter().filter(|a| **a == LinkAction::ShowAlert).count();
            assert_eq!(state.retry_count(), attempt);
            assert_eq!(state.phase(), LinkPhase::Retrying);
            state.apply(LinkEvent::RetryElapsed);
        }

        let actions = state.apply(LinkEvent::OpenFailed);
        assert_eq!(actions.as_slice(), &[LinkAction::GiveUp]);
        assert_eq!(state.phase(), LinkPhase::Failed);
        assert_eq!(state.retry_count(), MAX_RETRY);
        assert_eq!(alerts, 1);
    }

    #[test]
    fn test_failed_is_terminal() {
        let mut state = LinkState::new(RetryPolicy { delay: RETRY_DELAY, max_retries: 1 });
        state.apply(LinkEvent::Start);
        state.apply(LinkEvent::OpenFailed);
        assert!(state.is_failed());

        for event in [
            LinkEvent::Start,
            LinkEvent::RetryElapsed,
            LinkEvent::OpenSucceeded,
            LinkEvent::OpenFailed,
            LinkEvent::LinkLost,
        ] {
            assert!(state.apply(event).is_empty());
            assert!(state.is_failed());
        }
    }

    #[test]
    fn test_out_of_phase_events_ignored() {
        let mut state = LinkState::default();
        assert!(state.apply(LinkEvent::OpenSucceeded).is_empty());
        assert!(state.apply(LinkEvent::LinkLost).is_empty());
        assert_eq!(state.phase(), LinkPhase::Closed);

        let mut state = opened();
        assert!(state.apply(LinkEvent::Start).is_empty());
        assert_eq!(state.phase(), LinkPhase::Open);
    }
}
