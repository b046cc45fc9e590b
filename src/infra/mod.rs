//! Infrastructure - configuration, metrics and shutdown signalling
//!
//! - `config` - Application configuration (TOML loading, defaults, env overrides)
//! - `metrics` - Lock-free counters and periodic summary
//! - `shutdown` - Shutdown-aware waits for the long-running tasks

pub mod config;
pub mod metrics;
pub mod shutdown;

// Re-export commonly used types
pub use config::{Config, DeploymentMode, PrinterDriverKind};
pub use metrics::Metrics;
pub use shutdown::{sleep_or_shutdown, wait_for_shutdown};
