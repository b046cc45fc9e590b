//! Error types for the device agent
//!
//! None of these abort the process: link errors feed the retry path,
//! driver and telemetry errors are logged and the owning loop carries on.

/// Serial link failures (open failures and runtime close/error conditions)
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// The card reader port could not be opened
    #[error("failed to open {device}: {message}")]
    Open { device: String, message: String },

    /// The open link reported an error or was closed by the device
    #[error("serial link lost: {0}")]
    Io(#[from] std::io::Error),
}

impl LinkError {
    pub fn open(device: impl Into<String>, message: impl ToString) -> Self {
        Self::Open { device: device.into(), message: message.to_string() }
    }
}

/// Failures reported by the printer driver capability
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DriverError {
    /// A driver entry point failed
    #[error("printer driver {op} failed: {message}")]
    Call { op: &'static str, message: String },

    /// The driver call panicked or its worker thread was lost
    #[error("printer driver call aborted: {0}")]
    Aborted(String),

    /// No driver adapter is available in this build
    #[error("printer driver unavailable: {0}")]
    Unavailable(String),
}

/// Telemetry send failures
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("telemetry request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("telemetry backend rejected update with status {0}")]
    Rejected(u16),

    #[error("telemetry transport error: {0}")]
    Transport(String),
}
