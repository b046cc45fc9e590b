//! Test doubles shared by the service tests

use crate::domain::errors::{LinkError, TelemetryError};
use crate::domain::ports::SerialConnector;
use crate::domain::telemetry::KioskUpdate;
use crate::io::telemetry_http::TelemetryTransport;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::DuplexStream;

/// Transport that records every update and optionally fails them all
#[derive(Debug, Default, Clone)]
pub struct RecordingTransport {
    sent: Arc<Mutex<Vec<KioskUpdate>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<KioskUpdate> {
        self.sent.lock().clone()
    }

    pub fn heartbeats(&self) -> usize {
        self.sent.lock().iter().filter(|u| u.printer_status.is_none()).count()
    }

    pub fn status_reports(&self) -> Vec<i32> {
        self.sent.lock().iter().filter_map(|u| u.printer_status).collect()
    }
}

#[async_trait]
impl TelemetryTransport for RecordingTransport {
    async fn post_update(&self, update: &KioskUpdate) -> Result<(), TelemetryError> {
        self.sent.lock().push(update.clone());
        if self.failing.load(Ordering::SeqCst) {
            Err(TelemetryError::Transport("backend unreachable".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Connector that hands out scripted ports, failing once the script runs dry
pub struct ScriptedConnector {
    script: VecDeque<Result<DuplexStream, LinkError>>,
    attempts: Arc<AtomicUsize>,
}

impl ScriptedConnector {
    pub fn new(script: Vec<Result<DuplexStream, LinkError>>) -> (Self, Arc<AtomicUsize>) {
        let attempts = Arc::new(AtomicUsize::new(0));
        (Self { script: script.into(), attempts: attempts.clone() }, attempts)
    }
}

#[async_trait]
impl SerialConnector for ScriptedConnector {
    type Port = DuplexStream;

    fn device(&self) -> &str {
        "COM5"
    }

    async fn open(&mut self) -> Result<DuplexStream, LinkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.script
            .pop_front()
            .unwrap_or_else(|| Err(LinkError::open("COM5", "The system cannot find the file specified.")))
    }
}
