//! Card reader link manager
//!
//! Owns the serial link lifecycle and the swipe pipeline:
//!
//! ```text
//! connector.open() ──► read loop ──► FrameAccumulator ──► duplicate filter ──► NavigationSink
//!        │                 │
//!        └── failure ──────┴── close/error ──► LinkState ──► alert + retry timer
//! ```
//!
//! All transitions go through [`LinkState`]; this module only performs the
//! actions it returns. Alerts are raised once per failure episode and cleared
//! on the next successful open. After the retry budget is spent the manager
//! stays idle until shutdown.

use crate::domain::card::{CardIdentifier, CardSwipeEvent};
use crate::domain::link::{LinkAction, LinkActions, LinkEvent, LinkState};
use crate::domain::ports::{AlertSink, NavigationSink, SerialConnector, SessionOracle};
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::infra::shutdown::{sleep_or_shutdown, wait_for_shutdown};
use crate::io::card_frame::FrameAccumulator;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Read size per chunk from the card reader
const READ_CHUNK: usize = 255;

/// UI collaborators of the link manager
#[derive(Clone)]
pub struct LinkSinks {
    pub alerts: Arc<dyn AlertSink>,
    pub session: Arc<dyn SessionOracle>,
    pub navigation: Arc<dyn NavigationSink>,
}

pub struct SerialLinkManager<C> {
    connector: C,
    state: LinkState,
    accumulator: FrameAccumulator,
    /// Last identifier forwarded to the UI
    last_emitted: Option<CardIdentifier>,
    kiosk_id: String,
    login_url: String,
    sinks: LinkSinks,
    metrics: Arc<Metrics>,
}

impl<C: SerialConnector> SerialLinkManager<C> {
    pub fn new(config: &Config, connector: C, sinks: LinkSinks, metrics: Arc<Metrics>) -> Self {
        Self {
            connector,
            state: LinkState::new(config.retry_policy()),
            accumulator: FrameAccumulator::new(),
            last_emitted: None,
            kiosk_id: config.kiosk_id().to_string(),
            login_url: config.login_url().to_string(),
            sinks,
            metrics,
        }
    }

    /// Drive the link until shutdown and return the final state
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> LinkState {
        info!(device = %self.connector.device(), kiosk = %self.kiosk_id, "card_reader_started");

        let mut event = LinkEvent::Start;
        loop {
            let mut next = None;
            for action in self.apply(event) {
                match action {
                    LinkAction::Open => next = self.open_and_serve(&mut shutdown).await,
                    LinkAction::ScheduleRetry(delay) => {
                        next = self.wait_retry(delay, &mut shutdown).await
                    }
                    other => self.perform(other),
                }
            }

            match next {
                Some(e) => event = e,
                None => break,
            }
        }

        if self.state.is_failed() {
            // The operator has to restart the agent once the budget is spent
            wait_for_shutdown(&mut shutdown).await;
        }

        info!(
            device = %self.connector.device(),
            phase = self.state.phase().as_str(),
            "card_reader_stopped"
        );
        self.state
    }

    fn apply(&mut self, event: LinkEvent) -> LinkActions {
        let actions = self.state.apply(event);
        self.metrics.set_link_phase(self.state.phase());
        actions
    }

    /// Perform the actions that need no I/O wait
    fn perform(&mut self, action: LinkAction) {
        match action {
            LinkAction::ShowAlert => {
                if self.sinks.alerts.show_alert(&self.alert_text()) {
                    warn!(device = %self.connector.device(), "card_reader_alert_shown");
                } else {
                    warn!(device = %self.connector.device(), "card_reader_alert_undelivered");
                    self.apply(LinkEvent::AlertUndelivered);
                }
            }
            LinkAction::ClearAlert => {
                info!(device = %self.connector.device(), "card_reader_alert_cleared");
                self.sinks.alerts.clear_alert();
            }
            LinkAction::GiveUp => {
                error!(
                    device = %self.connector.device(),
                    attempts = %self.state.retry_count(),
                    "card_reader_retries_exhausted"
                );
            }
            LinkAction::Open | LinkAction::ScheduleRetry(_) => {}
        }
    }

    fn alert_text(&self) -> String {
        format!(
            "포트 오류: {}에 연결할 수 없습니다. USB 케이블 및 포트 연결을 확인해 주세요.",
            self.connector.device()
        )
    }

    /// Returns `None` on shutdown
    async fn wait_retry(
        &mut self,
        delay: Duration,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Option<LinkEvent> {
        info!(
            device = %self.connector.device(),
            attempt = %self.state.retry_count(),
            max_retries = %self.state.policy().max_retries,
            delay_ms = %delay.as_millis(),
            "card_reader_retry_scheduled"
        );

        if sleep_or_shutdown(delay, shutdown).await {
            None
        } else {
            Some(LinkEvent::RetryElapsed)
        }
    }

    /// Open the device and read from it until it closes. Returns the event
    /// that ended the attempt, or `None` on shutdown.
    async fn open_and_serve(&mut self, shutdown: &mut watch::Receiver<bool>) -> Option<LinkEvent> {
        let opened = tokio::select! {
            _ = wait_for_shutdown(shutdown) => return None,
            result = self.connector.open() => result,
        };

        let mut port = match opened {
            Ok(port) => port,
            Err(e) => {
                self.metrics.record_serial_open_failure();
                error!(
                    device = %self.connector.device(),
                    error = %e,
                    attempt = %(self.state.retry_count() + 1),
                    "card_reader_open_failed"
                );
                return Some(LinkEvent::OpenFailed);
            }
        };

        info!(device = %self.connector.device(), "card_reader_opened");
        for action in self.apply(LinkEvent::OpenSucceeded) {
            self.perform(action);
        }

        let mut chunk = [0u8; READ_CHUNK];
        loop {
            let read = tokio::select! {
                _ = wait_for_shutdown(shutdown) => return None,
                read = port.read(&mut chunk) => read,
            };

            match read {
                Ok(0) => {
                    warn!(device = %self.connector.device(), "card_reader_closed");
                    break;
                }
                Ok(n) => self.handle_bytes(&chunk[..n]).await,
                Err(e) => {
                    error!(device = %self.connector.device(), error = %e, "card_reader_error");
                    break;
                }
            }
        }

        self.metrics.record_serial_link_lost();
        // A partial window from a dead link never completes a frame
        self.accumulator.reset();
        Some(LinkEvent::LinkLost)
    }

    async fn handle_bytes(&mut self, bytes: &[u8]) {
        for outcome in self.accumulator.push(bytes) {
            match outcome {
                Some(card_id) => self.handle_swipe(card_id).await,
                None => self.metrics.record_frame_missed(),
            }
        }
    }

    /// Forward a decoded identifier unless it repeats the last one during an
    /// active session
    async fn handle_swipe(&mut self, card_id: CardIdentifier) {
        self.metrics.record_swipe_decoded();

        let session_active = self.sinks.session.has_active_session().await;
        let repeated = self.last_emitted.as_ref() == Some(&card_id);

        if repeated && session_active {
            self.metrics.record_swipe_suppressed();
            debug!(card_id = %card_id, "card_swipe_suppressed");
            return;
        }

        let swipe = CardSwipeEvent::new(card_id, self.kiosk_id.as_str());
        match swipe.login_url(&self.login_url) {
            Ok(url) => {
                self.sinks.navigation.navigate(url.as_str());
                self.metrics.record_swipe_emitted();
                info!(card_id = %swipe.card_id, kiosk = %swipe.kiosk_id, "card_swipe");
                self.last_emitted = Some(swipe.card_id);
            }
            Err(e) => {
                error!(login_url = %self.login_url, error = %e, "card_swipe_invalid_login_url");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::LinkError;
    use crate::domain::link::{LinkPhase, MAX_RETRY};
    use crate::io::ui_bridge::{create_ui_channel, SessionFlag, UiCommand};
    use crate::services::testing::ScriptedConnector;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{duplex, AsyncWriteExt, DuplexStream};
    use tokio::sync::mpsc;
    use tokio::task::JoinHandle;

    const SAMPLE: [u8; 12] = [0x02, 0xFF, 0x52, 0x31, 0x32, 0x33, 0x34, 0x35, 0x36, 0x37, 0x38, 0x03];
    const OTHER: [u8; 12] = [0x02, 0xFF, 0x52, 0x41, 0x42, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48, 0x03];

    struct Running {
        task: JoinHandle<LinkState>,
        ui_rx: mpsc::Receiver<UiCommand>,
        session_tx: watch::Sender<bool>,
        shutdown_tx: watch::Sender<bool>,
        metrics: Arc<Metrics>,
    }

    impl Running {
        async fn stop(self) -> LinkState {
            self.shutdown_tx.send(true).unwrap();
            self.task.await.unwrap()
        }

        fn drain(&mut self) -> Vec<UiCommand> {
            let mut commands = Vec::new();
            while let Ok(command) = self.ui_rx.try_recv() {
                commands.push(command);
            }
            commands
        }
    }

    /// Alert sink that drops the first `undelivered` banners
    #[derive(Default)]
    struct FlakyAlerts {
        undelivered: AtomicUsize,
        shown: AtomicUsize,
        cleared: AtomicUsize,
        attempts: AtomicUsize,
    }

    impl AlertSink for FlakyAlerts {
        fn show_alert(&self, _text: &str) -> bool {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let dropped = self
                .undelivered
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if !dropped {
                self.shown.fetch_add(1, Ordering::SeqCst);
            }
            !dropped
        }

        fn clear_alert(&self) {
            self.cleared.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn start(connector: ScriptedConnector) -> Running {
        start_with_alerts(connector, None)
    }

    fn start_with_alerts(connector: ScriptedConnector, alerts: Option<Arc<dyn AlertSink>>) -> Running {
        let config = Config::from_toml_str(
            "[kiosk]\nid = \"K9\"\n[ui]\nlogin_url = \"https://kiosk.example/login\"\n",
            "inline",
        )
        .unwrap();
        let (bridge, ui_rx) = create_ui_channel(2048);
        let (session, session_tx) = SessionFlag::new();
        let bridge = Arc::new(bridge);
        let alerts = alerts.unwrap_or_else(|| bridge.clone() as Arc<dyn AlertSink>);
        let sinks = LinkSinks { alerts, session: Arc::new(session), navigation: bridge };
        let metrics = Arc::new(Metrics::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let manager = SerialLinkManager::new(&config, connector, sinks, metrics.clone());
        let task = tokio::spawn(manager.run(shutdown_rx));

        Running { task, ui_rx, session_tx, shutdown_tx, metrics }
    }

    fn navigate(card: &str) -> UiCommand {
        UiCommand::Navigate { url: format!("https://kiosk.example/login?rfCardNo={}&kioskId=K9", card) }
    }

    async fn swipe(device: &mut DuplexStream, frame: &[u8]) {
        device.write_all(frame).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_swipe_navigates_to_login() {
        let (port, mut device) = duplex(256);
        let (connector, _) = ScriptedConnector::new(vec![Ok(port)]);
        let mut running = start(connector);

        // Split across reads
        swipe(&mut device, &SAMPLE[..5]).await;
        swipe(&mut device, &SAMPLE[5..]).await;

        assert_eq!(running.drain(), vec![navigate("12345678")]);
        assert_eq!(running.metrics.report().swipes_emitted, 1);

        let state = running.stop().await;
        assert_eq!(state.phase(), LinkPhase::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeat_swipe_suppressed_during_session() {
        let (port, mut device) = duplex(256);
        let (connector, _) = ScriptedConnector::new(vec![Ok(port)]);
        let mut running = start(connector);

        swipe(&mut device, &SAMPLE).await;
        running.session_tx.send(true).unwrap();
        swipe(&mut device, &SAMPLE).await;
        assert_eq!(running.drain(), vec![navigate("12345678")]);
        assert_eq!(running.metrics.report().swipes_suppressed, 1);

        // A different card always goes through
        swipe(&mut device, &OTHER).await;
        assert_eq!(running.drain(), vec![navigate("ABCDEFGH")]);

        running.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeat_swipe_emitted_without_session() {
        let (port, mut device) = duplex(256);
        let (connector, _) = ScriptedConnector::new(vec![Ok(port)]);
        let mut running = start(connector);

        swipe(&mut device, &SAMPLE).await;
        swipe(&mut device, &SAMPLE).await;
        assert_eq!(running.drain(), vec![navigate("12345678"), navigate("12345678")]);

        running.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_identifier_navigates() {
        let (port, mut device) = duplex(256);
        let (connector, _) = ScriptedConnector::new(vec![Ok(port)]);
        let mut running = start(connector);

        // Payload is all filler
        let frame = [0x02, 0xFF, 0x52, 0x5F, 0x52, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        swipe(&mut device, &frame).await;

        assert_eq!(
            running.drain(),
            vec![UiCommand::Navigate { url: "https://kiosk.example/login?rfCardNo=&kioskId=K9".into() }]
        );
        assert_eq!(running.metrics.report().frames_missed, 0);

        running.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_undelivered_alert_shown_on_next_failure() {
        let (port, _device) = duplex(256);
        let (connector, attempts) = ScriptedConnector::new(vec![
            Err(LinkError::open("COM5", "busy")),
            Err(LinkError::open("COM5", "busy")),
            Err(LinkError::open("COM5", "busy")),
            Ok(port),
        ]);
        let alerts = Arc::new(FlakyAlerts { undelivered: AtomicUsize::new(1), ..Default::default() });
        let running = start_with_alerts(connector, Some(alerts.clone() as Arc<dyn AlertSink>));

        tokio::time::sleep(Duration::from_secs(16)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 4);

        // Dropped on the first failure, delivered on the second, then held
        assert_eq!(alerts.attempts.load(Ordering::SeqCst), 2);
        assert_eq!(alerts.shown.load(Ordering::SeqCst), 1);
        assert_eq!(alerts.cleared.load(Ordering::SeqCst), 1);

        let state = running.stop().await;
        assert!(!state.alert_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_misaligned_window_is_dropped() {
        let (port, mut device) = duplex(256);
        let (connector, _) = ScriptedConnector::new(vec![Ok(port)]);
        let mut running = start(connector);

        // One stray byte shifts the next frame across two windows
        swipe(&mut device, &[0x00]).await;
        swipe(&mut device, &SAMPLE).await;
        assert!(running.drain().is_empty());
        assert_eq!(running.metrics.report().frames_missed, 1);

        running.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_alert_shown_once_and_cleared_on_reconnect() {
        let (port, mut device) = duplex(256);
        let (connector, attempts) = ScriptedConnector::new(vec![
            Err(LinkError::open("COM5", "busy")),
            Err(LinkError::open("COM5", "busy")),
            Ok(port),
        ]);
        let started = tokio::time::Instant::now();
        let mut running = start(connector);

        let first = running.ui_rx.recv().await.unwrap();
        assert!(matches!(first, UiCommand::ShowAlert { ref text } if text.contains("COM5")));
        assert_eq!(running.ui_rx.recv().await, Some(UiCommand::ClearAlert));

        // Two retry delays of 5s before the third attempt
        assert!(started.elapsed() >= Duration::from_secs(10));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);

        swipe(&mut device, &SAMPLE).await;
        assert_eq!(running.drain(), vec![navigate("12345678")]);

        let state = running.stop().await;
        assert_eq!(state.retry_count(), 0);
        assert!(!state.alert_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_link_loss_reopens() {
        let (port, device) = duplex(256);
        let (port2, mut device2) = duplex(256);
        let (connector, attempts) = ScriptedConnector::new(vec![Ok(port), Ok(port2)]);
        let mut running = start(connector);

        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(device);

        assert!(matches!(running.ui_rx.recv().await, Some(UiCommand::ShowAlert { .. })));
        assert_eq!(running.ui_rx.recv().await, Some(UiCommand::ClearAlert));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(running.metrics.report().serial_link_lost, 1);

        swipe(&mut device2, &SAMPLE).await;
        assert_eq!(running.drain(), vec![navigate("12345678")]);

        running.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_retries() {
        let (connector, attempts) = ScriptedConnector::new(Vec::new());
        let mut running = start(connector);

        tokio::time::sleep(Duration::from_secs(5 * MAX_RETRY as u64 + 60)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), MAX_RETRY as usize);

        // Idle in Failed: no further attempts
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), MAX_RETRY as usize);

        let commands = running.drain();
        assert_eq!(commands.len(), 1);
        assert!(matches!(commands[0], UiCommand::ShowAlert { .. }));
        assert_eq!(running.metrics.link_phase_gauge(), LinkPhase::Failed.as_gauge());

        let state = running.stop().await;
        assert!(state.is_failed());
        assert_eq!(state.retry_count(), MAX_RETRY);
    }
}
