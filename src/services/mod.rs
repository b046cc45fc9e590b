//! Services - the agent's long-running tasks
//!
//! - `link_manager` - Card reader link lifecycle and swipe pipeline
//! - `status_monitor` - Printer status polling with report hysteresis
//! - `telemetry` - Heartbeats and status reports to the backend

pub mod link_manager;
pub mod status_monitor;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use link_manager::{LinkSinks, SerialLinkManager};
pub use status_monitor::DeviceStatusMonitor;
pub use telemetry::TelemetryReporter;
