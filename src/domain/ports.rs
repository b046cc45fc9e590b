//! Boundaries to collaborators the agent does not implement itself
//!
//! - `PrinterDriver` - vendor printer driver (blocking foreign calls)
//! - `SerialConnector` - opens the card reader link
//! - `AlertSink` - on-screen alert banner
//! - `SessionOracle` - whether the UI has an active session
//! - `NavigationSink` - load a URL in the kiosk UI

use crate::domain::errors::{DriverError, LinkError};
use async_trait::async_trait;
use tokio::io::AsyncRead;

/// Arguments passed to the driver's open entry point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenParams {
    pub device_index: i32,
    pub comm_mode: String,
    pub params: [i32; 5],
}

impl Default for OpenParams {
    fn default() -> Self {
        Self { device_index: 2, comm_mode: String::new(), params: [0; 5] }
    }
}

/// Native printer control.
///
/// Calls block the calling thread for their whole duration; callers run them
/// off the async executor.
pub trait PrinterDriver: Send {
    fn open(&mut self, params: &OpenParams) -> Result<i32, DriverError>;

    fn query_status(&mut self) -> Result<i32, DriverError>;

    fn close(&mut self) -> Result<i32, DriverError>;
}

impl<D: PrinterDriver + ?Sized> PrinterDriver for Box<D> {
    fn open(&mut self, params: &OpenParams) -> Result<i32, DriverError> {
        (**self).open(params)
    }

    fn query_status(&mut self) -> Result<i32, DriverError> {
        (**self).query_status()
    }

    fn close(&mut self) -> Result<i32, DriverError> {
        (**self).close()
    }
}

/// Opens the card reader byte stream
#[async_trait]
pub trait SerialConnector: Send {
    type Port: AsyncRead + Unpin + Send;

    /// Device name used in logs and alerts
    fn device(&self) -> &str;

    async fn open(&mut self) -> Result<Self::Port, LinkError>;
}

/// On-screen alert banner. The caller guarantees at most one active alert.
pub trait AlertSink: Send + Sync {
    /// Returns `false` if the banner could not be delivered
    fn show_alert(&self, text: &str) -> bool;

    fn clear_alert(&self);
}

#[async_trait]
pub trait SessionOracle: Send + Sync {
    async fn has_active_session(&self) -> bool;
}

pub trait NavigationSink: Send + Sync {
    fn navigate(&self, url: &str);
}
