//! Scripted printer driver for tests and bench setups without a printer.
//!
//! The driver and its handle share one script: queued status results are
//! returned in order by `query_status`, after which the fallback code repeats.

use crate::domain::errors::DriverError;
use crate::domain::ports::{OpenParams, PrinterDriver};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Driver entry point invoked on the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    Open(OpenParams),
    QueryStatus,
    Close,
}

#[derive(Debug)]
struct Script {
    statuses: VecDeque<Result<i32, DriverError>>,
    fallback: i32,
    calls: Vec<DriverCall>,
}

/// Mock printer driver
#[derive(Debug, Clone)]
pub struct MockPrinterDriver {
    script: Arc<Mutex<Script>>,
}

/// Control side of a [`MockPrinterDriver`]
#[derive(Debug, Clone)]
pub struct MockPrinterHandle {
    script: Arc<Mutex<Script>>,
}

impl MockPrinterDriver {
    /// Create a mock that reports `fallback` once the script is exhausted
    pub fn new(fallback: i32) -> (Self, MockPrinterHandle) {
        let script =
            Arc::new(Mutex::new(Script { statuses: VecDeque::new(), fallback, calls: Vec::new() }));
        (Self { script: script.clone() }, MockPrinterHandle { script })
    }
}

impl Default for MockPrinterDriver {
    fn default() -> Self {
        Self::new(0).0
    }
}

impl MockPrinterHandle {
    pub fn push_status(&self, code: i32) {
        self.script.lock().statuses.push_back(Ok(code));
    }

    pub fn push_statuses(&self, codes: &[i32]) {
        let mut script = self.script.lock();
        script.statuses.extend(codes.iter().map(|&c| Ok(c)));
    }

    pub fn push_failure(&self, message: &str) {
        self.script
            .lock()
            .statuses
            .push_back(Err(DriverError::Call { op: "query_status", message: message.to_string() }));
    }

    pub fn set_fallback(&self, code: i32) {
        self.script.lock().fallback = code;
    }

    pub fn calls(&self) -> Vec<DriverCall> {
        self.script.lock().calls.clone()
    }

    pub fn query_count(&self) -> usize {
        self.script.lock().calls.iter().filter(|c| **c == DriverCall::QueryStatus).count()
    }
}

impl PrinterDriver for MockPrinterDriver {
    fn open(&mut self, params: &OpenParams) -> Result<i32, DriverError> {
        self.script.lock().calls.push(DriverCall::Open(params.clone()));
        Ok(0)
    }

    fn query_status(&mut self) -> Result<i32, DriverError> {
        let mut script = self.script.lock();
        script.calls.push(DriverCall::QueryStatus);
        let fallback = script.fallback;
        script.statuses.pop_front().unwrap_or(Ok(fallback))
    }

    fn close(&mut self) -> Result<i32, DriverError> {
        self.script.lock().calls.push(DriverCall::Close);
        Ok(0)
    }
}
